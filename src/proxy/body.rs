//! Client-facing response body.
//!
//! The response head is returned to the server as soon as the harness has
//! picked a status; the body is produced by a separate task writing into a
//! bounded channel. [`ResponseBody`] is the receiving end handed to hyper,
//! [`ChannelWriter`] the `AsyncWrite` end handed to harnesses.

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

/// Chunks buffered between the transfer task and the connection.
pub const CHANNEL_CAPACITY: usize = 16;

/// Create a body channel.
pub fn channel() -> (mpsc::Sender<Bytes>, ResponseBody) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (tx, ResponseBody::new(rx))
}

/// Streams chunks from the transfer task to the client.
///
/// Never reports an exact size, so a `Content-Length` copied from the origin
/// stays authoritative: ending early aborts the connection instead of
/// silently fixing up the framing.
#[derive(Debug)]
pub struct ResponseBody {
    rx: mpsc::Receiver<Bytes>,
    yielded_before_end: bool,
}

impl ResponseBody {
    fn new(rx: mpsc::Receiver<Bytes>) -> Self {
        Self {
            rx,
            yielded_before_end: false,
        }
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        let this = self.get_mut();
        match ready!(this.rx.poll_recv(cx)) {
            Some(chunk) => Poll::Ready(Some(Ok(Frame::data(chunk)))),
            // Give the connection one turn to flush what it has buffered
            // before it sees the end. A body shorter than its Content-Length
            // aborts the connection, and anything still buffered goes with it.
            None if !this.yielded_before_end => {
                this.yielded_before_end = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            None => Poll::Ready(None),
        }
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::default()
    }
}

/// Sends every write to the client as its own chunk.
#[derive(Debug)]
pub struct ChannelWriter {
    tx: PollSender<Bytes>,
}

impl ChannelWriter {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx: PollSender::new(tx) }
    }
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client body closed")
}

impl AsyncWrite for ChannelWriter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let this = self.get_mut();
        ready!(this.tx.poll_reserve(cx)).map_err(|_| broken_pipe())?;
        this.tx.send_item(Bytes::copy_from_slice(buf)).map_err(|_| broken_pipe())?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().tx.close();
        Poll::Ready(Ok(()))
    }
}
