//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → dispatcher.rs (owns backends, cursor and strategy)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - least_conn.rs (pick backend with fewest connections)
//!     → backend.rs (forward through the transport)
//!     → body.rs (least connections: hold the count until the body ends)
//!     → Return backend response or DispatchError
//! ```
//!
//! # Design Decisions
//! - Strategies are a closed enum, matched per request
//! - Rotation cursor lives in the dispatcher, not the strategy
//! - Connection counts are per-backend atomics; no cross-backend lock
//! - Dead backends are skipped, and a bounded scan reports AllBackendsDown

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod body;
pub mod dispatcher;
pub mod error;
pub mod least_conn;
pub mod round_robin;

pub use backend::{Backend, ConnectionGuard, Forward};
pub use body::TrackedBody;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, ForwardError};

/// Backend selection policy, chosen once at startup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Strict cyclic order over the backend list.
    RoundRobin,
    /// Fewest in-flight requests, first in list order on ties.
    #[default]
    LeastConnections,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::RoundRobin => "round-robin",
            Strategy::LeastConnections => "least-connections",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
