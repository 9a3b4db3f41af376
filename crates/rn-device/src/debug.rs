//! Traffic logging transport wrapper

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use rn_protocol::hex::bytes_to_hex;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

/// Wraps a stream and logs every read and write at debug level
///
/// With `assume_text` the traffic is logged as (escaped) text, otherwise
/// as hex.
pub struct DebugSerial<T> {
    inner: T,
    label: String,
    assume_text: bool,
}

impl<T> DebugSerial<T> {
    pub fn new(inner: T, label: impl Into<String>, assume_text: bool) -> Self {
        Self {
            inner,
            label: label.into(),
            assume_text,
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn render(&self, data: &[u8]) -> String {
        if self.assume_text {
            String::from_utf8_lossy(data).escape_debug().to_string()
        } else {
            bytes_to_hex(data)
        }
    }
}

impl<T: AsyncRead + Unpin> AsyncRead for DebugSerial<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let result = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            let data = &buf.filled()[before..];
            if data.is_empty() {
                debug!("[{}] read: EOF", self.label);
            } else {
                debug!("[{}] read {} bytes: {}", self.label, data.len(), self.render(data));
            }
        }
        result
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for DebugSerial<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let result = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(written)) = &result {
            debug!(
                "[{}] wrote {} bytes: {}",
                self.label,
                written,
                self.render(&buf[..*written])
            );
        }
        result
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        debug!("[{}] shutdown", self.label);
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
