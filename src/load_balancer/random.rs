//! Uniform random load balancing strategy.

use crate::load_balancer::LoadBalancer;

/// Picks uniformly among the instances it is given.
#[derive(Debug, Default)]
pub struct RandomBalancer;

impl RandomBalancer {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for RandomBalancer {
    fn pick(&self, _service: &str, len: usize) -> usize {
        fastrand::usize(..len)
    }
}
