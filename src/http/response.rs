//! Response handling.
//!
//! # Responsibilities
//! - Hand the backend response back with hop-by-hop headers removed
//! - Map dispatch failures to HTTP status codes
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - No live backend results in 503 Service Unavailable
//! - Upstream failures result in 502 Bad Gateway

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;

use crate::http::request::strip_hop_by_hop;
use crate::load_balancer::DispatchError;

/// Convert a hyper client response into the response streamed to the client.
pub fn from_upstream(response: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

impl DispatchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::AllBackendsDown { .. } => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::Forwarding { .. } => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            DispatchError::AllBackendsDown { .. } => "No live backends available",
            DispatchError::Forwarding { .. } => "Upstream request failed",
        };
        (self.status_code(), message).into_response()
    }
}
