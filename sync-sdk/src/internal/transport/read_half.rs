//! Read half for subprocess output streams.
//!
//! Wraps stdout or stderr of the sync service and turns it into a channel of
//! lines. A background task reads until EOF, so the channel closes exactly
//! when the stream does.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

/// Which output stream a [`ReadHalf`] wraps. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Read half for a subprocess output stream.
pub struct ReadHalf<R: AsyncRead + Unpin + Send> {
    reader: BufReader<R>,
    stream: OutputStream,
}

impl<R: AsyncRead + Unpin + Send + 'static> ReadHalf<R> {
    /// Create a new read half from an AsyncRead.
    pub fn new(reader: R, stream: OutputStream) -> Self {
        Self {
            reader: BufReader::new(reader),
            stream,
        }
    }

    /// Consume self and return a channel that yields output lines.
    ///
    /// Trailing `\r\n` / `\n` are stripped and invalid UTF-8 is replaced, so
    /// a stray byte in the service log never ends the relay. The task runs
    /// until EOF or until the receiver is dropped.
    pub fn read_lines(self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(100);
        let mut reader = self.reader;
        let stream = self.stream;

        tokio::spawn(async move {
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf)
                            .trim_end_matches(['\r', '\n'])
                            .to_string();
                        tracing::trace!(?stream, "{}", line);
                        if tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(?stream, "Failed to read process output: {}", e);
                        break;
                    }
                }
            }
            tracing::debug!(?stream, "Stream ended");
        });

        rx
    }
}
