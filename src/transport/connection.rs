//! Line-oriented connection
//!
//! `LineConnection` turns any duplex byte stream into newline-delimited text.
//! Reading happens on the owning task. Writing happens on a dedicated send
//! loop fed by an unbounded channel, so other tasks (the registry's fan-out)
//! can queue lines without touching the socket.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadHalf,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// How long `close` waits for queued output to reach a peer that is not
/// reading before the send loop is aborted.
pub const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Instruction for a connection's send loop.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// Write the line followed by `\n`.
    Line(Arc<str>),
    /// Flush, shut down the write side and stop.
    Close,
}

pub struct LineConnection<S> {
    reader: BufReader<ReadHalf<S>>,
    // Bytes of the line being read; survives a cancelled `read_line`.
    pending: Vec<u8>,
    outbound: UnboundedSender<Outbound>,
    writer: JoinHandle<()>,
    peer: String,
}

impl<S> LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Split `stream` and spawn its send loop.
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        let peer = peer.into();
        let (reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel::<Outbound>();

        let writer = tokio::spawn(send_loop(BufWriter::new(writer), rx, peer.clone()));

        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            outbound: tx,
            writer,
            peer,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Next line without its `\n` or `\r\n` terminator; `None` at
    /// end-of-stream. Invalid UTF-8 is replaced, not rejected.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let read = self.reader.read_until(b'\n', &mut self.pending).await?;
        if read == 0 && self.pending.is_empty() {
            return Ok(None);
        }

        let mut bytes = self.pending.as_slice();
        if let Some(rest) = bytes.strip_suffix(b"\n") {
            bytes = rest.strip_suffix(b"\r").unwrap_or(rest);
        }
        let line = String::from_utf8_lossy(bytes).into_owned();
        self.pending.clear();
        Ok(Some(line))
    }

    /// Queue a line. Returns false if the send loop has already stopped.
    pub fn send_line(&self, line: impl Into<Arc<str>>) -> bool {
        self.outbound.send(Outbound::Line(line.into())).is_ok()
    }

    /// Another sender feeding this connection's send loop.
    pub fn outbound(&self) -> UnboundedSender<Outbound> {
        self.outbound.clone()
    }

    /// Write out everything queued so far, then close both directions.
    ///
    /// If the peer stops reading, output still queued after `CLOSE_TIMEOUT`
    /// is dropped and the stream is released anyway.
    pub async fn close(self) {
        let _ = self.outbound.send(Outbound::Close);
        drop(self.reader);

        let mut writer = self.writer;
        match timeout(CLOSE_TIMEOUT, &mut writer).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(peer = %self.peer, "Send loop ended abnormally: {e}"),
            Err(_) => {
                warn!(peer = %self.peer, "Peer not reading; discarding unsent output");
                writer.abort();
            }
        }
    }
}

async fn send_loop<W>(mut writer: W, mut rx: UnboundedReceiver<Outbound>, peer: String)
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Line(line) => {
                if let Err(e) = write_line(&mut writer, &line).await {
                    debug!(peer = %peer, "Failed to send message: {e}");
                    break;
                }
            }
            Outbound::Close => break,
        }
    }

    let _ = writer.shutdown().await;
    debug!(peer = %peer, "Send loop closed");
}

async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}
