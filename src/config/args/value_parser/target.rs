use crate::scope::parse_locator;

/// Clap value_parser that validates a target locator without consuming it.
pub fn check_target(target: &str) -> Result<String, String> {
    parse_locator(target).map_err(|e| e.to_string())?;
    Ok(target.to_string())
}
