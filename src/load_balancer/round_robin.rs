//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::load_balancer::LoadBalancer;

/// Round-robin selector.
/// Keeps one rotating counter per service name.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counters: DashMap<String, AtomicUsize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn pick(&self, service: &str, len: usize) -> usize {
        // Fast path: counter already exists, shared read lock only.
        if let Some(counter) = self.counters.get(service) {
            return counter.fetch_add(1, Ordering::Relaxed) % len;
        }

        let counter = self
            .counters
            .entry(service.to_string())
            .or_insert_with(|| AtomicUsize::new(0));
        counter.fetch_add(1, Ordering::Relaxed) % len
    }
}
