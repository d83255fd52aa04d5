//! Single-process HTTP load balancer library.
//!
//! Requests enter through [`http::HttpServer`], are assigned a backend by
//! [`load_balancer::Dispatcher`] (round-robin or least-connections) and are
//! relayed by [`http::HyperForwarder`].

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::schema::BalancerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{Dispatcher, Strategy};
