//! The load balancer proper.
//!
//! # Responsibilities
//! - Own the backend list, rotation cursor and active strategy
//! - Select a backend per request and forward to it
//! - Keep connection counts balanced on every exit path, counting a
//!   least-connections request until its response body has been relayed
//! - Make each forwarding decision attributable (logs + metrics)

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};

use crate::config::loader::ConfigError;
use crate::config::schema::BalancerConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::load_balancer::{
    backend::{Backend, Forward},
    body::TrackedBody,
    error::DispatchError,
    least_conn,
    round_robin::{self, RotationCursor},
    Strategy,
};
use crate::observability::metrics;

/// Dispatches requests over a fixed, non-empty set of backends.
#[derive(Debug)]
pub struct Dispatcher<F> {
    backends: Vec<Arc<Backend>>,
    cursor: RotationCursor,
    strategy: Strategy,
    transport: F,
}

impl<F: Forward> Dispatcher<F> {
    /// Create a dispatcher. An empty backend list is rejected.
    pub fn new(backends: Vec<Backend>, strategy: Strategy, transport: F) -> Result<Self, ConfigError> {
        if backends.is_empty() {
            return Err(ConfigError::Validation(vec![ValidationError::EmptyBackendList]));
        }

        tracing::info!(
            backends = backends.len(),
            strategy = %strategy,
            "Dispatcher initialized"
        );

        Ok(Self {
            backends: backends.into_iter().map(Arc::new).collect(),
            cursor: RotationCursor::new(),
            strategy,
            transport,
        })
    }

    /// Validate `config` and build a dispatcher from its backend list.
    pub fn from_config(config: &BalancerConfig, transport: F) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let backends = config
            .backends
            .iter()
            .map(|address| Backend::parse(address))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        Self::new(backends, config.strategy, transport)
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Current rotation position (total round-robin probes so far).
    pub fn cursor_position(&self) -> usize {
        self.cursor.position()
    }

    /// Select a backend, forward `request` to it and return its response unchanged.
    ///
    /// No retries: a forwarding failure is returned as-is.
    ///
    /// Under least connections the returned body carries the connection
    /// guard, so the backend stays counted until the body is fully relayed
    /// or dropped. Selection failures, forwarding errors and cancellation
    /// release it immediately.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response<Body>, DispatchError> {
        let started = Instant::now();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        match self.strategy {
            Strategy::RoundRobin => {
                let backend = round_robin::select(&self.backends, &self.cursor)
                    .inspect_err(|e| self.record_rejection(&request_id, e))?;
                self.forward_to(backend, request, &request_id, started).await
            }
            Strategy::LeastConnections => {
                let guard = least_conn::select(&self.backends)
                    .inspect_err(|e| self.record_rejection(&request_id, e))?;

                let result = self.forward_to(&guard, request, &request_id, started).await;
                match result {
                    Ok(response) => Ok(response.map(|body| Body::new(TrackedBody::new(body, guard)))),
                    Err(e) => {
                        let backend = guard.backend().clone();
                        drop(guard);
                        metrics::record_active_connections(backend.address(), backend.connection_count());
                        Err(e)
                    }
                }
            }
        }
    }

    async fn forward_to(
        &self,
        backend: &Backend,
        request: Request<Body>,
        request_id: &str,
        started: Instant,
    ) -> Result<Response<Body>, DispatchError> {
        tracing::info!(
            request_id = %request_id,
            backend = %backend.address(),
            strategy = %self.strategy,
            connections = backend.connection_count(),
            "Forwarding request"
        );
        metrics::record_active_connections(backend.address(), backend.connection_count());

        match backend.forward(&self.transport, request).await {
            Ok(response) => {
                metrics::record_request(backend.address(), response.status().as_u16(), started);
                Ok(response)
            }
            Err(source) => {
                tracing::error!(
                    request_id = %request_id,
                    backend = %backend.address(),
                    error = %source,
                    "Upstream error"
                );
                metrics::record_request(backend.address(), StatusCode::BAD_GATEWAY.as_u16(), started);
                Err(DispatchError::Forwarding {
                    backend: backend.address().to_string(),
                    source,
                })
            }
        }
    }

    fn record_rejection(&self, request_id: &str, error: &DispatchError) {
        tracing::warn!(
            request_id = %request_id,
            strategy = %self.strategy,
            error = %error,
            "No live backend available"
        );
        metrics::record_dispatch_failure(error.reason());
    }
}
