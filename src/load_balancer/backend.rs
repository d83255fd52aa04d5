//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream server
//! - Track active connections (for Least Connections LB)
//! - Expose an injectable liveness flag
//! - Rewrite inbound URIs onto the backend and hand them to the transport

use std::future::Future;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, Uri};
use url::Url;

use crate::config::validation::ValidationError;
use crate::load_balancer::error::ForwardError;

/// Transport capable of relaying a request to a backend.
///
/// Implemented by [`crate::http::proxy::HyperForwarder`] in production.
pub trait Forward: Send + Sync {
    /// Send `request` to `backend` and return its response.
    fn forward(
        &self,
        backend: &Backend,
        request: Request<Body>,
    ) -> impl Future<Output = Result<Response<Body>, ForwardError>> + Send;
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// The address as configured.
    address: String,
    /// Parsed form of `address`.
    url: Url,
    /// Pre-calculated `host[:port]` for URI rewriting.
    authority: String,
    /// Liveness flag. Nothing in this crate probes backends, so it only
    /// changes through [`Backend::set_alive`].
    alive: AtomicBool,
    /// Number of currently active connections.
    active_connections: AtomicUsize,
}

impl Backend {
    /// Parse a backend from its URL form (e.g. `http://10.0.0.1:3000` or
    /// `https://www.example.com`).
    pub fn parse(address: &str) -> Result<Self, ValidationError> {
        let url = parse_address(address)?;
        let host = url.host_str().ok_or_else(|| ValidationError::MissingHost {
            address: address.to_string(),
        })?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            address: address.to_string(),
            url,
            authority,
            alive: AtomicBool::new(true),
            active_connections: AtomicUsize::new(0),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the backend alive or not. Dead backends are skipped by every strategy.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    /// Get the current number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Increment active connection count.
    pub fn increment_connections(&self) {
        let count = self.active_connections.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!(backend = %self.address, connections = count, "Incremented connections");
    }

    /// Decrement active connection count.
    ///
    /// Must follow a matching [`Backend::increment_connections`]. The count
    /// never goes below zero.
    pub fn decrement_connections(&self) {
        match self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(prev) => {
                tracing::trace!(backend = %self.address, connections = prev - 1, "Decremented connections");
            }
            Err(_) => {
                tracing::error!(backend = %self.address, "Connection count decremented below zero");
                debug_assert!(false, "unbalanced decrement on backend {}", self.address);
            }
        }
    }

    /// Map an inbound request URI onto this backend.
    ///
    /// The backend's base path is joined with the request path using a single
    /// slash, and both query strings are kept.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, ForwardError> {
        let path = join_paths(self.url.path(), inbound.path());
        let query = match (
            self.url.query().filter(|q| !q.is_empty()),
            inbound.query().filter(|q| !q.is_empty()),
        ) {
            (Some(base), Some(extra)) => Some(format!("{}&{}", base, extra)),
            (base, extra) => base.or(extra).map(str::to_string),
        };

        let mut target = format!("{}://{}{}", self.url.scheme(), self.authority, path);
        if let Some(query) = query {
            target.push('?');
            target.push_str(&query);
        }
        Ok(target.parse()?)
    }

    /// Relay `request` through `transport`. Invoked once per dispatched request.
    pub async fn forward<F: Forward>(
        &self,
        transport: &F,
        request: Request<Body>,
    ) -> Result<Response<Body>, ForwardError> {
        transport.forward(self, request).await
    }
}

/// Validate a backend address without building a [`Backend`].
pub fn parse_address(address: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(address).map_err(|source| ValidationError::InvalidAddress {
        address: address.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::UnsupportedScheme {
            address: address.to_string(),
            scheme: url.scheme().to_string(),
        });
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::MissingHost {
            address: address.to_string(),
        });
    }
    Ok(url)
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// A RAII guard that manages the active connection count.
///
/// Creating the guard increments the count; dropping it decrements, so the
/// decrement runs on success, error and cancellation alike. The guard owns
/// its backend and can travel with a streaming response body.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl ConnectionGuard {
    pub fn acquire(backend: Arc<Backend>) -> Self {
        backend.increment_connections();
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for ConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.backend.decrement_connections();
    }
}
