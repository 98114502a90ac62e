//! The progress-bar reader (spec.md §4.8): wraps a byte stream and taps
//! an [`Accounter`] after every read, plus a `Seek` passthrough that
//! advances the accounter to the new absolute position. Used directly
//! by `cat`/`pipe`, which read from a backend without going through
//! `Backend::put` (whose own `ProgressTap` parameter covers the
//! transfer-engine copy path).

use haul_storage::ProgressTap;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

pin_project! {
    pub struct ProgressReader<R> {
        #[pin]
        inner: R,
        tap: ProgressTap,
    }
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, tap: ProgressTap) -> Self {
        Self { inner, tap }
    }
}

impl<R: AsyncRead> AsyncRead for ProgressReader<R> {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let this = self.project();
        let before = buf.filled().len();
        let result = this.inner.poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &result {
            let read = buf.filled().len() - before;
            if read > 0 {
                this.tap.add(read as u64);
            }
        }
        result
    }
}

impl<R: AsyncSeek> AsyncSeek for ProgressReader<R> {
    fn start_seek(self: Pin<&mut Self>, position: std::io::SeekFrom) -> std::io::Result<()> {
        self.project().inner.start_seek(position)
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<u64>> {
        let this = self.project();
        let result = this.inner.poll_complete(cx);
        if let Poll::Ready(Ok(position)) = &result {
            this.tap.add(*position);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::io::AsyncReadExt;

    struct CountingSink(AtomicU64);
    impl haul_storage::ProgressSink for CountingSink {
        fn add(&self, n: u64) {
            self.0.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[tokio::test]
    async fn read_reports_bytes_to_tap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        tokio::fs::write(&path, b"hello world").await.unwrap();
        let file = tokio::fs::File::open(&path).await.unwrap();

        let sink = Arc::new(CountingSink(AtomicU64::new(0)));
        let mut reader = ProgressReader::new(file, sink.clone() as ProgressTap);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello world");
        assert_eq!(sink.0.load(Ordering::Relaxed), 11);
    }
}
