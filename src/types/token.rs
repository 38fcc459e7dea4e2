/// A cancellation token shared by every task of a purge run.
///
/// Alias for [`tokio_util::sync::CancellationToken`]. The pipeline cancels it
/// on the first fatal error; callers may cancel it to abort a run (e.g. from
/// a Ctrl+C handler).
pub type PipelineCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`PipelineCancellationToken`].
///
/// # Example
///
/// ```
/// use s3purge_rs::create_pipeline_cancellation_token;
///
/// let token = create_pipeline_cancellation_token();
/// let child = token.child_token();
///
/// token.cancel();
/// assert!(child.is_cancelled());
/// ```
pub fn create_pipeline_cancellation_token() -> PipelineCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
