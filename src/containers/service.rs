use async_trait::async_trait;
use std::fmt;
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use super::error::Result;
use super::request::ContainerLaunchRequest;

/// The two operations the run flow needs from a backend.
///
/// Backends are handed to the flow as `&dyn ContainerService`, so a local
/// engine, a cloud service or a test double can be swapped without touching
/// the controller.
#[async_trait]
pub trait ContainerService: Send + Sync {
    /// Create and start the container, returning its identifier.
    ///
    /// Called at most once per invocation; callers never retry.
    async fn submit(&self, request: ContainerLaunchRequest) -> Result<String>;

    /// Relay the container's output into `request.writer` until the log
    /// source closes.
    ///
    /// Must return [`super::error::RunError::Cancelled`] promptly once
    /// `cancel` fires.
    async fn stream_logs(&self, request: LogsRequest<'_>, cancel: &CancellationToken) -> Result<()>;
}

/// Parameters for one log stream. Only built on the attached path.
pub struct LogsRequest<'a> {
    pub container: String,
    pub follow: bool,
    /// Terminal width in columns, when the sink is a terminal
    pub width: Option<u16>,
    pub writer: &'a mut (dyn AsyncWrite + Send + Unpin),
}

impl fmt::Debug for LogsRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogsRequest")
            .field("container", &self.container)
            .field("follow", &self.follow)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}
