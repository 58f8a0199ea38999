//! Backend-independent log relaying: cancellation, width wrapping, writes.

use futures::{Stream, StreamExt};
use std::fmt::Display;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use super::error::{Result, RunError};

/// Copy every chunk of `stream` into `writer` until the stream ends.
///
/// Returns [`RunError::Cancelled`] as soon as `cancel` fires, even while a
/// read or write is pending. Stream and write failures become
/// [`RunError::Stream`]. There is no reconnect.
pub async fn pump_logs<S, B, E>(
    stream: S,
    writer: &mut (dyn AsyncWrite + Send + Unpin),
    width: Option<u16>,
    cancel: &CancellationToken,
) -> Result<()>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut wrapper = width.and_then(LineWrapper::new);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            next = stream.next() => next,
        };

        let chunk = match next {
            None => break,
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(RunError::Stream(e.to_string())),
        };

        let bytes = match wrapper.as_mut() {
            Some(wrapper) => wrapper.wrap(chunk.as_ref()),
            None => chunk.as_ref().to_vec(),
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
            written = write_chunk(writer, &bytes) => written?,
        }
    }

    writer.flush().await?;
    Ok(())
}

async fn write_chunk(writer: &mut (dyn AsyncWrite + Send + Unpin), bytes: &[u8]) -> Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Escape {
    None,
    Started,
    Csi,
}

/// Hard-wraps output at a fixed column count across chunk boundaries.
///
/// Columns are counted per UTF-8 character; ANSI CSI sequences take no
/// columns.
#[derive(Debug)]
pub struct LineWrapper {
    width: usize,
    column: usize,
    escape: Escape,
}

impl LineWrapper {
    /// `None` for a zero width.
    pub fn new(width: u16) -> Option<Self> {
        (width > 0).then(|| Self {
            width: width as usize,
            column: 0,
            escape: Escape::None,
        })
    }

    pub fn wrap(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len() + chunk.len() / self.width + 1);
        for &byte in chunk {
            match self.escape {
                Escape::Started => {
                    self.escape = if byte == b'[' { Escape::Csi } else { Escape::None };
                }
                Escape::Csi => {
                    if (0x40..=0x7e).contains(&byte) {
                        self.escape = Escape::None;
                    }
                }
                Escape::None => match byte {
                    0x1b => self.escape = Escape::Started,
                    b'\n' | b'\r' => self.column = 0,
                    // UTF-8 continuation bytes belong to the previous column
                    b if b & 0xc0 == 0x80 => {}
                    _ => {
                        if self.column == self.width {
                            out.push(b'\n');
                            self.column = 0;
                        }
                        self.column += 1;
                    }
                },
            }
            out.push(byte);
        }
        out
    }
}
