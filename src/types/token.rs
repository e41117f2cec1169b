/// A cancellation token used to stop the producer and idle workers.
///
/// Alias for [`tokio_util::sync::CancellationToken`]. Cancelling it stops
/// partition enumeration and closes the job queue; transfers that are already
/// running are awaited to completion.
pub type PipelineCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`PipelineCancellationToken`].
///
/// # Example
///
/// ```
/// use blobmig_rs::create_pipeline_cancellation_token;
///
/// let token = create_pipeline_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_pipeline_cancellation_token() -> PipelineCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
