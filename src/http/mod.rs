//! HTTP transport adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, catch-all handler)
//!     → Dispatcher::dispatch (backend selection + bookkeeping)
//!     → proxy.rs (hyper client relays to the chosen backend)
//!         → request.rs (URI rewrite, hop-by-hop strip, X-Forwarded-For)
//!         → response.rs (hop-by-hop strip, error status mapping)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::HyperForwarder;
pub use server::HttpServer;
