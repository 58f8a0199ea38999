//! Orchestration of a single `run`: submit, then either report the
//! identifier or attach to the container's output.
//!
//! ```text
//! Submitting ──detach──▶ DetachedDone
//!     │
//!     └──attach──▶ Attaching ──▶ Streaming ──▶ Closed
//!
//! any state ──error──▶ Failed
//! ```

use std::fmt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::error::{Result, RunError};
use super::request::ContainerLaunchRequest;
use super::service::{ContainerService, LogsRequest};
use super::terminal::Terminal;
use crate::utils::progress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Submitting,
    DetachedDone,
    Attaching,
    Streaming,
    Closed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitting => "submitting",
            Self::DetachedDone => "detached",
            Self::Attaching => "attaching",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The identifier was printed and no stream was opened.
    Detached { id: String },
    /// The log stream was followed until it closed.
    Attached { id: String, width: Option<u16> },
}

/// Everything one run needs besides the launch request.
pub struct AttachController<'a> {
    service: &'a dyn ContainerService,
    terminal: &'a dyn Terminal,
    cancel: CancellationToken,
}

impl<'a> AttachController<'a> {
    pub fn new(service: &'a dyn ContainerService, terminal: &'a dyn Terminal, cancel: CancellationToken) -> Self {
        Self {
            service,
            terminal,
            cancel,
        }
    }

    /// Submit `request` and, unless `detach` is set, stream its logs into
    /// `out` until the stream closes.
    ///
    /// Errors are returned unchanged, except that an interrupt after the
    /// container started becomes [`RunError::Interrupted`] carrying its
    /// identifier. A stream failure leaves the container running.
    pub async fn run(
        &self,
        request: ContainerLaunchRequest,
        detach: bool,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<RunOutcome> {
        let result = self.drive(request, detach, out).await;
        if let Err(e) = &result {
            tracing::debug!(phase = %Phase::Failed, error = %e, "run failed");
        }
        result
    }

    async fn drive(
        &self,
        request: ContainerLaunchRequest,
        detach: bool,
        out: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<RunOutcome> {
        tracing::debug!(phase = %Phase::Submitting, name = %request.id, image = %request.image);
        // Abandoning the submission on interrupt leaves no identifier to report
        let submission = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(RunError::Cancelled),
                submitted = self.service.submit(request) => submitted,
            }
        };
        let id = progress::run("Starting container", submission).await?;

        if detach {
            out.write_all(format!("{}\n", id).as_bytes()).await?;
            out.flush().await?;
            tracing::debug!(phase = %Phase::DetachedDone, %id);
            return Ok(RunOutcome::Detached { id });
        }

        tracing::debug!(phase = %Phase::Attaching, %id);
        let width = self.negotiate_width();

        tracing::debug!(phase = %Phase::Streaming, %id, ?width);
        let logs = LogsRequest {
            container: id.clone(),
            follow: true,
            width,
            writer: out,
        };
        match self.service.stream_logs(logs, &self.cancel).await {
            Ok(()) => {}
            Err(RunError::Cancelled) => return Err(RunError::Interrupted { id }),
            Err(e) => return Err(e),
        }

        tracing::debug!(phase = %Phase::Closed, %id);
        Ok(RunOutcome::Attached { id, width })
    }

    /// Redirected output gets no width; that only degrades formatting.
    fn negotiate_width(&self) -> Option<u16> {
        if !self.terminal.is_terminal() {
            tracing::debug!("output is not a terminal, streaming without width");
            return None;
        }
        match self.terminal.size() {
            Some(size) => {
                tracing::debug!(columns = size.columns, rows = size.rows, "terminal size");
                Some(size.columns)
            }
            None => {
                tracing::warn!("could not read terminal size, streaming without width");
                None
            }
        }
    }
}
