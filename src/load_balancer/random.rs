//! Uniform random selection strategy.

use rand::Rng;

use crate::load_balancer::{instance::ServiceInstance, SelectionStrategy};

/// Picks a candidate uniformly at random.
#[derive(Debug, Default)]
pub struct RandomChoice;

impl RandomChoice {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for RandomChoice {
    fn select<'a>(&self, candidates: &[&'a ServiceInstance]) -> Option<&'a ServiceInstance> {
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[index])
    }
}
