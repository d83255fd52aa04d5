//! Response body that keeps a backend connection counted while it streams.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use http_body::{Frame, SizeHint};

use crate::load_balancer::backend::ConnectionGuard;
use crate::observability::metrics;

/// Wraps a backend response body and releases its [`ConnectionGuard`] once
/// the last frame has been relayed, an error ends the stream, or the client
/// goes away and the body is dropped.
#[derive(Debug)]
pub struct TrackedBody {
    inner: Body,
    guard: Option<ConnectionGuard>,
}

impl TrackedBody {
    pub fn new(inner: Body, guard: ConnectionGuard) -> Self {
        Self {
            inner,
            guard: Some(guard),
        }
    }

    fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            let backend = guard.backend().clone();
            drop(guard);
            metrics::record_active_connections(backend.address(), backend.connection_count());
        }
    }
}

impl http_body::Body for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let polled = Pin::new(&mut self.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) | Poll::Ready(Some(Err(_))) => self.release(),
            Poll::Ready(Some(Ok(_))) if self.inner.is_end_stream() => self.release(),
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.release();
    }
}
