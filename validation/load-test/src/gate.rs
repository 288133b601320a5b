//! Admission control for in-flight requests.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the number of simultaneously outstanding request attempts.
///
/// Cloning is cheap and every clone shares the same slots. A slot is held by a
/// [`GatePermit`] and returned when the permit is dropped, so it comes back on
/// every exit path of an attempt (success, failure, timeout or panic).
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    /// Create a gate with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait until a slot is free and take it.
    pub async fn acquire(&self) -> GatePermit {
        // The semaphore is never closed, so acquisition cannot fail
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("concurrency gate semaphore closed"),
        };
        GatePermit { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_release_on_drop() {
        let gate = ConcurrencyGate::new(2);
        let a = gate.acquire().await;
        let _b = gate.acquire().await;
        assert_eq!(gate.in_flight(), 2);

        drop(a);
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.capacity(), 1);
        let _p = gate.acquire().await;
        assert_eq!(gate.in_flight(), 1);
    }

    #[tokio::test]
    async fn test_released_when_holder_panics() {
        let gate = ConcurrencyGate::new(1);
        let g = gate.clone();
        let handle = tokio::spawn(async move {
            let _permit = g.acquire().await;
            panic!("attempt blew up");
        });
        assert!(handle.await.is_err());
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_exceeds_capacity() {
        for capacity in [1usize, 2, 4, 8] {
            let gate = ConcurrencyGate::new(capacity);
            let current = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let mut handles = Vec::new();
            for _ in 0..40 {
                let gate = gate.clone();
                let current = current.clone();
                let peak = peak.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = gate.acquire().await;
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }

            let peak = peak.load(Ordering::SeqCst);
            assert!(peak <= capacity, "peak {} > capacity {}", peak, capacity);
            assert_eq!(gate.in_flight(), 0);
        }
    }
}
