//! Shell-style brace expansion for prefix patterns.
//!
//! Supported forms:
//! - alternatives: `logs/{a,b,c}` expands to `logs/a`, `logs/b`, `logs/c`;
//!   an empty alternative is allowed (`x{a,}` gives `xa`, `x`)
//! - numeric ranges with optional step and zero padding: `{1..3}`,
//!   `{10..0..5}`, `{01..10}`
//! - single-character ranges: `{a..e}`, `{Z..A..2}`
//! - nesting: `{{0..9},{a..z},{A..Z}}` gives 62 one-character prefixes
//!
//! A group that is neither a list nor a range (`{abc}`, `{}`) is kept
//! literally. Unbalanced braces are rejected.

use crate::types::error::S3purgeError;

/// Upper bound on the number of prefixes one pattern may produce.
pub const MAX_EXPANDED_PREFIXES: usize = 10_000;

/// Expand `pattern` into the list of concrete strings it denotes, in order.
///
/// An empty pattern yields a single empty string.
pub fn expand_braces(pattern: &str) -> Result<Vec<String>, S3purgeError> {
    check_balanced(pattern)?;
    expand(pattern, pattern)
}

fn check_balanced(pattern: &str) -> Result<(), S3purgeError> {
    let mut depth = 0usize;
    for c in pattern.chars() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    S3purgeError::InvalidPrefixPattern(format!("unmatched '}}' in {pattern}"))
                })?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(S3purgeError::InvalidPrefixPattern(format!(
            "unmatched '{{' in {pattern}"
        )));
    }
    Ok(())
}

fn expand(pattern: &str, whole: &str) -> Result<Vec<String>, S3purgeError> {
    let Some((open, close)) = find_first_group(pattern) else {
        return Ok(vec![pattern.to_string()]);
    };

    let preamble = &pattern[..open];
    let alternatives = expand_group(&pattern[open + 1..close], whole)?;
    let tails = expand(&pattern[close + 1..], whole)?;

    let total = alternatives.len().saturating_mul(tails.len());
    if total > MAX_EXPANDED_PREFIXES {
        return Err(too_many(whole));
    }

    let mut expanded = Vec::with_capacity(total);
    for alternative in &alternatives {
        for tail in &tails {
            expanded.push(format!("{preamble}{alternative}{tail}"));
        }
    }
    Ok(expanded)
}

/// Byte offsets of the first top-level `{` and its matching `}`.
fn find_first_group(pattern: &str) -> Option<(usize, usize)> {
    let open = pattern.find('{')?;
    let mut depth = 0usize;
    for (offset, c) in pattern[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some((open, open + offset));
                }
            }
            _ => {}
        }
    }
    None
}

fn expand_group(body: &str, whole: &str) -> Result<Vec<String>, S3purgeError> {
    let parts = split_top_level_commas(body);
    if parts.len() > 1 {
        let mut alternatives = Vec::new();
        for part in parts {
            alternatives.extend(expand(part, whole)?);
            if alternatives.len() > MAX_EXPANDED_PREFIXES {
                return Err(too_many(whole));
            }
        }
        return Ok(alternatives);
    }

    if let Some(sequence) = parse_sequence(body, whole)? {
        return Ok(sequence);
    }

    // Not a list or a range: keep the braces.
    Ok(expand(body, whole)?
        .into_iter()
        .map(|inner| format!("{{{inner}}}"))
        .collect())
}

fn split_top_level_commas(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (offset, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..offset]);
                start = offset + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn parse_sequence(body: &str, whole: &str) -> Result<Option<Vec<String>>, S3purgeError> {
    let fields: Vec<&str> = body.split("..").collect();
    let (start, end, step) = match fields.as_slice() {
        [start, end] => (*start, *end, 1),
        [start, end, step] => match step.parse::<i64>() {
            Ok(step) => (*start, *end, step.unsigned_abs().max(1)),
            Err(_) => return Ok(None),
        },
        _ => return Ok(None),
    };

    if let (Ok(first), Ok(last)) = (start.parse::<i64>(), end.parse::<i64>()) {
        let width = if is_zero_padded(start) || is_zero_padded(end) {
            start.len().max(end.len())
        } else {
            0
        };
        let values = stepped(first, last, step, whole)?;
        return Ok(Some(
            values.into_iter().map(|n| pad_number(n, width)).collect(),
        ));
    }

    if let (Some(first), Some(last)) = (single_ascii_letter(start), single_ascii_letter(end)) {
        let values = stepped(first as i64, last as i64, step, whole)?;
        return Ok(Some(
            values
                .into_iter()
                .map(|n| char::from(n as u8).to_string())
                .collect(),
        ));
    }

    Ok(None)
}

fn stepped(first: i64, last: i64, step: u64, whole: &str) -> Result<Vec<i64>, S3purgeError> {
    let span = first.abs_diff(last) / step;
    if span >= MAX_EXPANDED_PREFIXES as u64 {
        return Err(too_many(whole));
    }

    // Every value lies between the bounds, but the step alone may not fit in i64.
    let direction: i128 = if first <= last { 1 } else { -1 };
    let (origin, step) = (i128::from(first), i128::from(step));
    (0..=i128::from(span))
        .map(|i| {
            i64::try_from(origin + direction * i * step).map_err(|_| {
                S3purgeError::InvalidPrefixPattern(format!("range out of bounds in {whole}"))
            })
        })
        .collect()
}

fn is_zero_padded(number: &str) -> bool {
    let digits = number.strip_prefix('-').unwrap_or(number);
    digits.len() > 1 && digits.starts_with('0')
}

fn pad_number(n: i64, width: usize) -> String {
    if n < 0 {
        format!("-{:0w$}", n.unsigned_abs(), w = width.saturating_sub(1))
    } else {
        format!("{n:0width$}")
    }
}

fn single_ascii_letter(s: &str) -> Option<u8> {
    match s.as_bytes() {
        [c] if c.is_ascii_alphabetic() => Some(*c),
        _ => None,
    }
}

fn too_many(whole: &str) -> S3purgeError {
    S3purgeError::InvalidPrefixPattern(format!(
        "{whole} expands to more than {MAX_EXPANDED_PREFIXES} prefixes"
    ))
}
