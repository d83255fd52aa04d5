//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::backend::{Backend, ConnectionGuard};
use crate::load_balancer::error::DispatchError;

/// Select the live backend with the minimum number of active connections.
///
/// In case of tie, the first one in list order is selected. The returned
/// guard already counts the new connection and releases it on drop.
pub fn select(backends: &[Arc<Backend>]) -> Result<ConnectionGuard, DispatchError> {
    let backend = backends
        .iter()
        .filter(|b| b.is_alive())
        .min_by_key(|b| b.connection_count())
        .ok_or(DispatchError::AllBackendsDown {
            probed: backends.len(),
        })?;

    Ok(ConnectionGuard::acquire(backend.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends_with_counts(counts: &[usize]) -> Vec<Arc<Backend>> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let b = Backend::parse(&format!("http://127.0.0.1:{}", 8080 + i)).unwrap();
                for _ in 0..count {
                    b.increment_connections();
                }
                Arc::new(b)
            })
            .collect()
    }

    #[test]
    fn test_least_conn() {
        let backends = backends_with_counts(&[3, 1, 2]);

        let guard = select(&backends).unwrap();
        assert_eq!(guard.address(), "http://127.0.0.1:8081");
        assert_eq!(backends[1].connection_count(), 2);

        drop(guard);
        assert_eq!(backends[1].connection_count(), 1);
    }

    #[test]
    fn test_tie_picks_first_in_list_order() {
        let backends = backends_with_counts(&[1, 1, 3]);

        let guard = select(&backends).unwrap();
        assert_eq!(guard.address(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_held_guards_spread_load() {
        let backends = backends_with_counts(&[0, 0]);

        let first = select(&backends).unwrap();
        let second = select(&backends).unwrap();
        assert_eq!(first.address(), "http://127.0.0.1:8080");
        assert_eq!(second.address(), "http://127.0.0.1:8081");
    }

    #[test]
    fn test_dead_backends_are_skipped() {
        let backends = backends_with_counts(&[0, 5]);
        backends[0].set_alive(false);

        let guard = select(&backends).unwrap();
        assert_eq!(guard.address(), "http://127.0.0.1:8081");
        drop(guard);

        backends[1].set_alive(false);
        assert!(matches!(
            select(&backends),
            Err(DispatchError::AllBackendsDown { probed: 2 })
        ));
    }
}
