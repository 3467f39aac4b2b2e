//! Per-connection identity and timeouts.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Bound the time spent receiving each request head
//! - Fail a connection that makes no read or write progress for too long,
//!   including keep-alive waits between requests

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use hyper::body::{Body, Frame, SizeHint};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection view of request starts and completions.
///
/// Shared between the IO wrapper and the service: the service holds an
/// [`InFlight`] guard from the moment hyper hands it a request until the
/// response body is dropped.
#[derive(Debug, Clone, Default)]
pub struct RequestTracker(Arc<TrackerState>);

#[derive(Debug, Default)]
struct TrackerState {
    started: AtomicU64,
    in_flight: AtomicUsize,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request as started.
    pub fn begin(&self) -> InFlight {
        self.0.in_flight.fetch_add(1, Ordering::AcqRel);
        self.0.started.fetch_add(1, Ordering::AcqRel);
        InFlight(Arc::clone(&self.0))
    }

    /// Number of requests started on this connection.
    pub fn started(&self) -> u64 {
        self.0.started.load(Ordering::Acquire)
    }

    /// Whether any request on this connection is still in flight.
    pub fn is_busy(&self) -> bool {
        self.0.in_flight.load(Ordering::Acquire) > 0
    }
}

/// Guard for one in-flight request; released on drop.
#[derive(Debug)]
pub struct InFlight(Arc<TrackerState>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Response body that releases its [`InFlight`] guard when hyper drops it,
/// which happens once the last frame has been written.
#[derive(Debug)]
pub struct TrackedBody<B> {
    inner: Pin<Box<B>>,
    _in_flight: InFlight,
}

impl<B> TrackedBody<B> {
    pub fn new(inner: B, in_flight: InFlight) -> Self {
        Self {
            inner: Box::pin(inner),
            _in_flight: in_flight,
        }
    }
}

impl<B: Body> Body for TrackedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        self.get_mut().inner.as_mut().poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Where a connection is between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Receiving a request head; bounded by the header-read timeout.
    Head,
    /// A request is in flight; bounded by the idle timeout.
    Busy,
    /// Keep-alive wait for the next request; bounded by the idle timeout.
    Idle,
}

/// Connection-level timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    /// Time allowed from the first byte of a request head to the request
    /// being handed to the service.
    pub header_read: Duration,
    /// Time allowed without read or write progress.
    pub idle: Duration,
}

/// IO wrapper enforcing the header-read and idle timeouts.
///
/// A new connection starts receiving its first request head. Once the
/// service picks the request up the connection is busy, and when the last
/// response is done it goes idle. The first byte read while idle starts the
/// next request head. While receiving a head the deadline is fixed; in the
/// other phases every successful read or write pushes it back.
///
/// The deadline is only checked while an operation is pending, so a
/// connection whose handler is busy but not touching the socket is left
/// alone until hyper polls it again.
#[derive(Debug)]
pub struct TimedStream<S> {
    inner: S,
    timeouts: ConnectionTimeouts,
    requests: RequestTracker,
    /// Request starts already accounted for.
    seen_started: u64,
    phase: Phase,
    deadline: Pin<Box<Sleep>>,
}

impl<S> TimedStream<S> {
    pub fn new(inner: S, timeouts: ConnectionTimeouts, requests: RequestTracker) -> Self {
        Self {
            inner,
            timeouts,
            seen_started: requests.started(),
            requests,
            phase: Phase::Head,
            deadline: Box::pin(tokio::time::sleep(timeouts.header_read)),
        }
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        let timeout = match phase {
            Phase::Head => self.timeouts.header_read,
            Phase::Busy | Phase::Idle => self.timeouts.idle,
        };
        self.deadline.as_mut().reset(Instant::now() + timeout);
    }

    /// Follow request starts and completions reported by the service.
    ///
    /// A new start ends the current head, even when the request already
    /// completed in between two polls.
    fn sync_phase(&mut self) {
        let started = self.requests.started();
        let busy = self.requests.is_busy();
        if started != self.seen_started {
            self.seen_started = started;
            self.enter(if busy { Phase::Busy } else { Phase::Idle });
        } else if self.phase == Phase::Busy && !busy {
            self.enter(Phase::Idle);
        }
    }

    fn on_progress(&mut self, read_bytes: bool) {
        match self.phase {
            Phase::Idle if read_bytes => self.enter(Phase::Head),
            Phase::Head => {}
            Phase::Busy | Phase::Idle => {
                let next = Instant::now() + self.timeouts.idle;
                self.deadline.as_mut().reset(next);
            }
        }
    }

    fn poll_deadline<T>(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<T>> {
        self.sync_phase();
        match self.deadline.as_mut().poll(cx) {
            Poll::Ready(()) => {
                let message = match self.phase {
                    Phase::Head => "request header read timeout",
                    Phase::Busy | Phase::Idle => "connection idle timeout",
                };
                Poll::Ready(Err(io::Error::new(io::ErrorKind::TimedOut, message)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TimedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        this.sync_phase();
        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                this.on_progress(buf.filled().len() > before);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => this.poll_deadline(cx),
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TimedStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.sync_phase();
        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(result) => {
                this.on_progress(false);
                Poll::Ready(result)
            }
            Poll::Pending => this.poll_deadline(cx),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.sync_phase();
        match Pin::new(&mut this.inner).poll_write_vectored(cx, bufs) {
            Poll::Ready(result) => {
                this.on_progress(false);
                Poll::Ready(result)
            }
            Poll::Pending => this.poll_deadline(cx),
        }
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
