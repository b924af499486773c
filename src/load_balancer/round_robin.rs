//! Round-robin selection strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::load_balancer::{instance::ServiceInstance, SelectionStrategy};

/// Round-robin selector.
/// Stores an internal counter to rotate through candidates.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn select<'a>(&self, candidates: &[&'a ServiceInstance]) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }

        let position = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(candidates[position % candidates.len()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let b1 = ServiceInstance::new("web", "127.0.0.1", 8080);
        let b2 = ServiceInstance::new("web", "127.0.0.1", 8081);
        let candidates = vec![&b1, &b2];

        let s1 = lb.select(&candidates).unwrap();
        assert_eq!(s1.port, 8080);

        let s2 = lb.select(&candidates).unwrap();
        assert_eq!(s2.port, 8081);

        let s3 = lb.select(&candidates).unwrap();
        assert_eq!(s3.port, 8080);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(RoundRobin::new().select(&[]).is_none());
    }
}
