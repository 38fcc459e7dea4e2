// Progress reporting for the CLI.
//
// Samples the shared purge counters once per second for the live progress
// line and logs a full snapshot every `stats_interval`.

use std::io;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use s3purge_rs::{PurgeCounters, PurgeStats};
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Moving average window in refresh periods.
const MOVING_AVERAGE_PERIOD_SECS: usize = 10;

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Spawn the reporter. It runs until `stop_token` is cancelled and returns
/// the final snapshot.
pub fn show_indicator(
    counters: Arc<PurgeCounters>,
    stop_token: CancellationToken,
    stats_interval: Duration,
    show_progress: bool,
    show_result: bool,
) -> JoinHandle<PurgeStats> {
    let progress_text = ProgressBar::new(0);
    progress_text.set_style(template_style("{wide_msg}"));

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_deleted_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut last_deleted: u64 = 0;

        let mut refresh = tokio::time::interval(REFRESH_INTERVAL);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut stats_log = tokio::time::interval_at(start_time + stats_interval, stats_interval);
        stats_log.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            select! {
                _ = stop_token.cancelled() => break,
                _ = stats_log.tick() => {
                    log_stats("purge progress.", &counters.snapshot());
                }
                _ = refresh.tick() => {
                    let stats = counters.snapshot();
                    ma_deleted_count.add_sample(stats.deleted.saturating_sub(last_deleted));
                    last_deleted = stats.deleted;

                    if show_progress {
                        progress_text.set_message(progress_message(
                            &stats,
                            ma_deleted_count.get_average(),
                        ));
                    }
                }
            }
        }

        let stats = counters.snapshot();
        let elapsed = start_time.elapsed();
        log_stats("purge summary.", &stats);

        if show_result {
            progress_text.set_style(template_style("{msg}"));
            progress_text.finish_with_message(format!(
                "{},  duration {}",
                progress_message(&stats, objects_per_sec(stats.deleted, elapsed)),
                HumanDuration(elapsed),
            ));

            println!();
            let _ = io::stdout().flush();
        } else {
            progress_text.finish_and_clear();
        }

        stats
    })
}

fn template_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn log_stats(message: &str, stats: &PurgeStats) {
    info!(
        deleted = stats.deleted,
        deletes_pending = stats.deletes_pending,
        listed = stats.listed,
        queued = stats.queued,
        requests = stats.requests,
        "{message} {stats}"
    );
}

fn progress_message(stats: &PurgeStats, objects_per_sec: u64) -> String {
    format!(
        "deleted {:>3} objects | {:>3} objects/sec,  listed {} objects,  queued {},  deletes pending {},  requests {}",
        stats.deleted,
        HumanCount(objects_per_sec),
        stats.listed,
        stats.queued,
        stats.deletes_pending,
        stats.requests,
    )
}

fn objects_per_sec(deleted: u64, elapsed: Duration) -> u64 {
    let elapsed_secs = elapsed.as_secs_f64();
    if elapsed_secs < REFRESH_INTERVAL.as_secs_f64() {
        return deleted;
    }
    (deleted as f64 / elapsed_secs) as u64
}
