//! Adapter wrapping a plain [`AsyncRead`] so it can satisfy the
//! [`AsyncReadSeek`](super::AsyncReadSeek) bound `Put` readers need
//! (spec.md §4.2), for sources that don't actually support random
//! access (an HTTP response body, piped stdin). Every seek fails,
//! which is exactly the signal the filesystem backend's resume-from-
//! partial logic uses to fall back to starting the write over.

use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

pub struct Unseekable<R> {
    inner: R,
}

impl<R> Unseekable<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Unseekable<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<R: Unpin> AsyncSeek for Unseekable<R> {
    fn start_seek(self: Pin<&mut Self>, _position: SeekFrom) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "stream does not support seeking"))
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::Unsupported, "stream does not support seeking")))
    }
}
