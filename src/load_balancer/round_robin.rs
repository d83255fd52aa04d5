//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Backend;
use crate::load_balancer::error::DispatchError;

/// Shared rotation position.
///
/// Only ever moved forward through [`RotationCursor::advance`], which hands
/// each caller a distinct pre-advance value.
#[derive(Debug, Default)]
pub struct RotationCursor {
    next: AtomicUsize,
}

impl RotationCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the rotation at `position` instead of zero.
    pub fn starting_at(position: usize) -> Self {
        Self {
            next: AtomicUsize::new(position),
        }
    }

    /// Claim the current position and move past it.
    pub fn advance(&self) -> usize {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Number of advances so far (plus the starting offset).
    pub fn position(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

/// Pick the next live backend in list order.
///
/// Every probe consumes one cursor position, and the scan gives up after
/// `backends.len()` probes.
pub fn select<'a>(
    backends: &'a [Arc<Backend>],
    cursor: &RotationCursor,
) -> Result<&'a Arc<Backend>, DispatchError> {
    let len = backends.len();

    for _ in 0..len {
        let backend = &backends[cursor.advance() % len];
        if backend.is_alive() {
            return Ok(backend);
        }
        tracing::debug!(backend = %backend.address(), "Skipping backend that is not alive");
    }

    Err(DispatchError::AllBackendsDown { probed: len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn backends(n: usize) -> Vec<Arc<Backend>> {
        (0..n)
            .map(|i| Arc::new(Backend::parse(&format!("http://127.0.0.1:{}", 8080 + i)).unwrap()))
            .collect()
    }

    #[test]
    fn test_round_robin() {
        let cursor = RotationCursor::new();
        let backends = backends(3);

        let picked: Vec<&str> = (0..6)
            .map(|_| select(&backends, &cursor).unwrap().address())
            .collect();

        assert_eq!(
            picked,
            vec![
                "http://127.0.0.1:8080",
                "http://127.0.0.1:8081",
                "http://127.0.0.1:8082",
                "http://127.0.0.1:8080",
                "http://127.0.0.1:8081",
                "http://127.0.0.1:8082",
            ]
        );
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn test_single_live_backend_from_any_start() {
        let backends = backends(4);
        for b in &backends {
            b.set_alive(false);
        }
        backends[2].set_alive(true);

        for start in 0..8 {
            let cursor = RotationCursor::starting_at(start);
            for _ in 0..5 {
                let s = select(&backends, &cursor).unwrap();
                assert_eq!(s.address(), "http://127.0.0.1:8082");
            }
        }
    }

    #[test]
    fn test_all_down_is_bounded() {
        let backends = backends(3);
        for b in &backends {
            b.set_alive(false);
        }
        let cursor = RotationCursor::new();

        let err = select(&backends, &cursor).unwrap_err();
        assert!(matches!(err, DispatchError::AllBackendsDown { probed: 3 }));
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_skips_dead_backend() {
        let backends = backends(3);
        backends[1].set_alive(false);
        let cursor = RotationCursor::new();

        let picked: Vec<&str> = (0..4)
            .map(|_| select(&backends, &cursor).unwrap().address())
            .collect();
        assert_eq!(
            picked,
            vec![
                "http://127.0.0.1:8080",
                "http://127.0.0.1:8082",
                "http://127.0.0.1:8080",
                "http://127.0.0.1:8082",
            ]
        );
    }

    #[test]
    fn test_concurrent_advances_are_unique() {
        let cursor = RotationCursor::new();
        let seen = Mutex::new(Vec::new());
        let threads = 16;
        let per_thread = 500;

        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    let claimed: Vec<usize> = (0..per_thread).map(|_| cursor.advance()).collect();
                    seen.lock().unwrap().extend(claimed);
                });
            }
        });

        let seen = seen.into_inner().unwrap();
        let unique: HashSet<usize> = seen.iter().copied().collect();
        assert_eq!(seen.len(), threads * per_thread);
        assert_eq!(unique.len(), threads * per_thread);
        assert_eq!(cursor.position(), threads * per_thread);
    }
}
