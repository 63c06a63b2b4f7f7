//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Service resolved → healthy instances filtered by the proxy
//!     → select() (reject empty input first)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotating cursor per service)
//!         - random.rs (uniform choice)
//!     → Return selected instance or NoHealthyInstance
//! ```
//!
//! # Design Decisions
//! - Algorithms only compute an index for a non-empty slice
//! - Emptiness is checked once, before any algorithm runs
//! - Health filtering is the caller's job; the balancer never sees unhealthy instances

pub mod random;
pub mod round_robin;

use std::sync::Arc;

use thiserror::Error;

use crate::config::BalancingPolicy;
use crate::registry::ServiceInstance;

pub use random::RandomBalancer;
pub use round_robin::RoundRobin;

/// Raised when selection is attempted on an empty instance set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no healthy instance available for service '{service}'")]
pub struct NoHealthyInstance {
    pub service: String,
}

/// Instance selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Index of the instance to use. `len` is always at least 1.
    fn pick(&self, service: &str, len: usize) -> usize;

    /// Choose one instance out of `healthy`.
    fn select(
        &self,
        service: &str,
        healthy: &[Arc<ServiceInstance>],
    ) -> Result<Arc<ServiceInstance>, NoHealthyInstance> {
        if healthy.is_empty() {
            return Err(NoHealthyInstance {
                service: service.to_string(),
            });
        }

        let index = self.pick(service, healthy.len()) % healthy.len();
        Ok(healthy[index].clone())
    }
}

/// Build the balancer for the configured policy.
pub fn from_policy(policy: BalancingPolicy) -> Arc<dyn LoadBalancer> {
    match policy {
        BalancingPolicy::RoundRobin => Arc::new(RoundRobin::new()),
        BalancingPolicy::Random => Arc::new(RandomBalancer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_service() -> Vec<Arc<ServiceInstance>> {
        let healthy = Arc::new(ServiceInstance::new("order-service", "10.0.0.1", 8002, "/health"));
        let unhealthy = Arc::new(ServiceInstance::new("order-service", "10.0.0.2", 8002, "/health"));
        unhealthy.record_probe(false);
        vec![healthy, unhealthy]
    }

    fn healthy_subset(all: &[Arc<ServiceInstance>]) -> Vec<Arc<ServiceInstance>> {
        all.iter().filter(|i| i.is_healthy()).cloned().collect()
    }

    #[test]
    fn empty_input_is_rejected() {
        for policy in [BalancingPolicy::RoundRobin, BalancingPolicy::Random] {
            let lb = from_policy(policy);
            let err = lb.select("order-service", &[]).unwrap_err();
            assert_eq!(err.service, "order-service");
        }
    }

    #[test]
    fn never_selects_unhealthy_instance() {
        let all = order_service();
        let healthy = healthy_subset(&all);

        for policy in [BalancingPolicy::RoundRobin, BalancingPolicy::Random] {
            let lb = from_policy(policy);
            for _ in 0..100 {
                let chosen = lb.select("order-service", &healthy).unwrap();
                assert_eq!(chosen.host, "10.0.0.1");
            }
        }
    }

    #[test]
    fn selection_stays_within_healthy_subset() {
        let all: Vec<Arc<ServiceInstance>> = (1..=5)
            .map(|n| Arc::new(ServiceInstance::new("svc", format!("10.0.0.{}", n), 80, "/health")))
            .collect();
        all[1].record_probe(false);
        all[3].record_probe(false);
        let healthy = healthy_subset(&all);

        for policy in [BalancingPolicy::RoundRobin, BalancingPolicy::Random] {
            let lb = from_policy(policy);
            for _ in 0..50 {
                assert!(lb.select("svc", &healthy).unwrap().is_healthy());
            }
        }
    }
}
