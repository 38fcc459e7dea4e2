use s3purge_rs::PipelineCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

/// Cancel the pipeline on Ctrl-C. Ends quietly if the pipeline is cancelled
/// for another reason first.
pub fn spawn_ctrl_c_handler(cancellation_token: PipelineCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("cancellation_token canceled.")
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received, stopping purge. Buckets will not be deleted.");
                cancellation_token.cancel();
            }
        }
    })
}
