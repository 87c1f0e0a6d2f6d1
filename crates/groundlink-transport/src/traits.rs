use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::net::TcpStream;
use tokio_serial::SerialStream;
use tracing::debug;

/// An open link byte stream implementing `AsyncRead + AsyncWrite`.
///
/// This is the fundamental I/O type returned by transport operations.
/// Exactly one kind is active per stream: a serial device, a TCP socket, or
/// an in-memory duplex pipe used by tests and simulators.
pub struct LinkStream {
    inner: LinkStreamInner,
}

enum LinkStreamInner {
    Tcp(TcpStream),
    Serial(SerialStream),
    Memory(DuplexStream),
}

impl LinkStream {
    pub(crate) fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: LinkStreamInner::Tcp(stream),
        }
    }

    pub(crate) fn from_serial(stream: SerialStream) -> Self {
        Self {
            inner: LinkStreamInner::Serial(stream),
        }
    }

    /// Wrap one end of an in-memory duplex pipe.
    pub fn from_duplex(stream: DuplexStream) -> Self {
        Self {
            inner: LinkStreamInner::Memory(stream),
        }
    }

    /// Transport kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            LinkStreamInner::Tcp(_) => "tcp",
            LinkStreamInner::Serial(_) => "serial",
            LinkStreamInner::Memory(_) => "memory",
        }
    }

    /// Close the write side of the stream.
    ///
    /// Errors are logged and swallowed; a link being torn down is never
    /// worth failing the caller over.
    pub async fn close(&mut self) {
        if let Err(err) = self.shutdown().await {
            debug!(kind = self.kind(), %err, "error while closing link stream");
        }
    }
}

impl AsyncRead for LinkStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_read(cx, buf),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for LinkStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_write(cx, buf),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_flush(cx),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut self.get_mut().inner {
            LinkStreamInner::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            LinkStreamInner::Serial(stream) => Pin::new(stream).poll_shutdown(cx),
            LinkStreamInner::Memory(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for LinkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkStream")
            .field("type", &self.kind())
            .finish()
    }
}
