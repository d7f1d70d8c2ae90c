//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Receive half of a serial link
#[async_trait]
pub trait SerialRx: Send {
    /// Wait for bytes and copy up to `buf.len()` of them
    ///
    /// Returns the number of bytes read; `Ok(0)` means the port is closed.
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Transmit half of a serial link
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SerialTx: Send {
    /// Write some of `data`, returning how many bytes were accepted
    async fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;
}

/// Adapter from any tokio reader (serial stream half, duplex pipe, ...)
pub struct TokioSerialRx<R> {
    inner: R,
}

impl<R> TokioSerialRx<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R> SerialRx for TokioSerialRx<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf).await
    }
}

/// Adapter from any tokio writer
pub struct TokioSerialTx<W> {
    inner: W,
}

impl<W> TokioSerialTx<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<W> SerialTx for TokioSerialTx<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.inner.write(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().await
    }
}
