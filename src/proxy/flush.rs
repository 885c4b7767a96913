//! Latency-bounded flushing.
//!
//! # Responsibilities
//! - Buffer response writes instead of forwarding each one
//! - Flush the buffer from a background timer at most once per interval
//! - Stop the timer task when the writer goes away, on every exit path
//!
//! # Design Decisions
//! - One timer task per response stream, owned through the writer
//! - Writes and flushes share one mutex; neither holds it across an await
//! - A full buffer parks the writer until the next flush (backpressure)
//! - Dropping the writer is the stop signal; the task flushes what is left
//!   before it exits

use bytes::{Bytes, BytesMut};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};

/// Bytes buffered before writes start waiting for a flush.
pub const HIGH_WATER_MARK: usize = 64 * 1024;

#[derive(Debug, Default)]
struct Pending {
    buf: BytesMut,
    closed: bool,
    writer: Option<Waker>,
}

#[derive(Debug, Default)]
struct Shared(Mutex<Pending>);

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writer whose output reaches the client at most once per `latency`.
#[derive(Debug)]
pub struct MaxLatencyWriter {
    shared: Arc<Shared>,
    stop: Option<oneshot::Sender<()>>,
}

impl MaxLatencyWriter {
    /// Start the flush loop for one response stream.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(dst: mpsc::Sender<Bytes>, latency: Duration) -> Self {
        let shared = Arc::new(Shared::default());
        let (stop_tx, stop_rx) = oneshot::channel();

        tokio::spawn(flush_loop(shared.clone(), dst, latency, stop_rx));

        Self {
            shared,
            stop: Some(stop_tx),
        }
    }
}

impl Drop for MaxLatencyWriter {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl AsyncWrite for MaxLatencyWriter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let mut pending = self.shared.lock();
        if pending.closed {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "client body closed")));
        }
        if pending.buf.len() >= HIGH_WATER_MARK {
            pending.writer = Some(cx.waker().clone());
            return Poll::Pending;
        }

        let accepted = buf.len().min(HIGH_WATER_MARK - pending.buf.len());
        pending.buf.extend_from_slice(&buf[..accepted]);
        Poll::Ready(Ok(accepted))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Flushing is the timer's job.
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

async fn flush_loop(shared: Arc<Shared>, dst: mpsc::Sender<Bytes>, latency: Duration, mut stop: oneshot::Receiver<()>) {
    let mut ticker = time::interval_at(Instant::now() + latency, latency);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut stop => {
                flush(&shared, &dst).await;
                break;
            }
            _ = ticker.tick() => {
                if !flush(&shared, &dst).await {
                    break;
                }
            }
        }
    }

    tracing::trace!("Flush loop stopped");
}

/// Move the buffer to the client. Returns false once the client is gone.
async fn flush(shared: &Shared, dst: &mpsc::Sender<Bytes>) -> bool {
    let chunk = {
        let mut pending = shared.lock();
        if pending.buf.is_empty() {
            return !pending.closed;
        }
        pending.buf.split().freeze()
    };

    let delivered = dst.send(chunk).await.is_ok();

    let mut pending = shared.lock();
    if !delivered {
        pending.closed = true;
    }
    if let Some(writer) = pending.writer.take() {
        writer.wake();
    }
    delivered
}
