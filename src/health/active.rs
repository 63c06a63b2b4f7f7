//! Active health checking.
//!
//! # Responsibilities
//! - Periodically refresh every service from discovery
//! - Probe every known instance and update its health
//! - Survive failures inside a cycle without stopping the loop
//!
//! A cycle runs inside the loop task itself, so aborting the loop also
//! cancels any probes still in flight.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures_util::future::join_all;
use futures_util::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::discovery::{self, DiscoveryBackend};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::proxy::transport::Transport;
use crate::registry::{ServiceInstance, ServiceRegistry};

const USER_AGENT: &str = "mesh-gateway-health-check";

/// Periodic prober of every registered instance.
#[derive(Clone)]
pub struct HealthChecker {
    registry: Arc<ServiceRegistry>,
    discovery: Arc<dyn DiscoveryBackend>,
    transport: Arc<dyn Transport>,
    config: HealthCheckConfig,
}

impl HealthChecker {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        discovery: Arc<dyn DiscoveryBackend>,
        transport: Arc<dyn Transport>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            discovery,
            transport,
            config,
        }
    }

    /// Start the loop in the background.
    pub fn spawn(self) -> HealthCheckHandle {
        let shutdown = Shutdown::new();
        let receiver = shutdown.subscribe();
        let join = tokio::spawn(self.run(receiver));
        HealthCheckHandle { shutdown, join }
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            "Health checker starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let backoff = Duration::from_secs(self.config.error_backoff_secs);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Health checker received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(panic) = AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                        tracing::error!(
                            error = %panic_message(panic.as_ref()),
                            backoff_secs = backoff.as_secs(),
                            "Health check cycle failed"
                        );
                        tokio::select! {
                            biased;
                            _ = shutdown.recv() => break,
                            _ = time::sleep(backoff) => {}
                        }
                    }
                }
            }
        }
    }

    /// One full pass: discovery refresh, then every instance probed concurrently.
    pub async fn run_cycle(&self) {
        self.refresh().await;

        let instances = self.registry.all_instances();
        join_all(instances.iter().map(|instance| self.check_instance(instance))).await;

        tracing::debug!(instances = instances.len(), "Health check cycle complete");
    }

    /// Re-query discovery for every service it or the registry knows about.
    /// Instances no longer discovered are dropped from the registry; a service
    /// whose lookup fails keeps its current bucket.
    pub async fn refresh(&self) {
        let kind = self.discovery.kind();
        let mut names = match self.discovery.fetch_services().await {
            Ok(names) => names,
            Err(e) => {
                discovery::report_failure(kind, None, &e);
                Vec::new()
            }
        };
        names.extend(self.registry.service_names());
        names.sort();
        names.dedup();

        for name in names {
            match self.discovery.fetch_instances(&name).await {
                Ok(discovered) => {
                    self.registry.sync(&name, discovered);
                }
                Err(e) => discovery::report_failure(kind, Some(&name), &e),
            }
        }
    }

    /// Probe one instance and record the result. Returns the new health flag.
    pub async fn check_instance(&self, instance: &ServiceInstance) -> bool {
        let url = instance.health_check_url();
        let request = match Request::get(url.as_str())
            .header(header::USER_AGENT, USER_AGENT)
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(instance = %instance, url = %url, error = %e, "Failed to build health check request");
                let was_healthy = instance.record_unreachable();
                self.report(instance, was_healthy, false);
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let (was_healthy, healthy) = match self.transport.send(request, timeout).await {
            Ok(response) => {
                let healthy = response.status() == StatusCode::OK;
                if !healthy {
                    tracing::warn!(
                        service = %instance.service_name,
                        instance = %instance.authority(),
                        status = %response.status(),
                        "Health check failed"
                    );
                }
                (instance.record_probe(healthy), healthy)
            }
            Err(e) => {
                tracing::warn!(
                    service = %instance.service_name,
                    instance = %instance.authority(),
                    error = %e,
                    "Health check failed"
                );
                (instance.record_unreachable(), false)
            }
        };

        self.report(instance, was_healthy, healthy);
        healthy
    }

    fn report(&self, instance: &ServiceInstance, was_healthy: bool, healthy: bool) {
        match (was_healthy, healthy) {
            (false, true) => tracing::info!(
                service = %instance.service_name,
                instance = %instance.authority(),
                "Instance recovered"
            ),
            (true, false) => tracing::warn!(
                service = %instance.service_name,
                instance = %instance.authority(),
                "Instance marked unhealthy"
            ),
            _ => {}
        }
        metrics::record_instance_health(&instance.service_name, &instance.authority(), healthy);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Handle to a running health checker.
pub struct HealthCheckHandle {
    shutdown: Shutdown,
    join: JoinHandle<()>,
}

impl HealthCheckHandle {
    /// Signal the loop and wait up to `grace` for it to finish; abort otherwise.
    pub async fn stop(self, grace: Duration) {
        self.shutdown.trigger();

        let mut join = self.join;
        match time::timeout(grace, &mut join).await {
            Ok(Ok(())) => tracing::info!("Health checker stopped"),
            Ok(Err(e)) => tracing::error!(error = %e, "Health checker task failed"),
            Err(_) => {
                tracing::warn!(grace_secs = grace.as_secs(), "Health checker did not stop in time, aborting");
                join.abort();
                // Wait for the cancelled task to drop its in-flight probes.
                let _ = join.await;
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryKind;
    use crate::discovery::DiscoveryError;
    use crate::proxy::transport::TransportError;
    use async_trait::async_trait;
    use axum::http::Response;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Instant;

    /// Answers probes per `host:port`; missing entries are unreachable.
    #[derive(Default)]
    struct ScriptedTransport {
        statuses: Mutex<HashMap<String, u16>>,
    }

    impl ScriptedTransport {
        fn set(&self, authority: &str, status: Option<u16>) {
            let mut statuses = self.statuses.lock().unwrap();
            match status {
                Some(code) => statuses.insert(authority.to_string(), code),
                None => statuses.remove(authority),
            };
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: Request<Body>,
            _timeout: Duration,
        ) -> Result<Response<Body>, TransportError> {
            let authority = request.uri().authority().unwrap().to_string();
            let status = self.statuses.lock().unwrap().get(&authority).copied();
            match status {
                Some(code) => Ok(Response::builder().status(code).body(Body::empty()).unwrap()),
                None => Err(TransportError::Connect("connection refused".into())),
            }
        }
    }

    #[derive(Default)]
    struct MutableDiscovery {
        endpoints: Mutex<Vec<(String, u16)>>,
        unreachable: AtomicBool,
        /// Panic on the next `fetch_services` call.
        explode: AtomicBool,
        listings: AtomicUsize,
    }

    #[async_trait]
    impl DiscoveryBackend for MutableDiscovery {
        fn kind(&self) -> DiscoveryKind {
            DiscoveryKind::Redis
        }

        async fn fetch_instances(&self, service: &str) -> Result<Vec<ServiceInstance>, DiscoveryError> {
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(DiscoveryError::Query("connection reset".into()));
            }
            if service != "order-service" {
                return Ok(Vec::new());
            }
            Ok(self
                .endpoints
                .lock()
                .unwrap()
                .iter()
                .map(|(host, port)| ServiceInstance::new(service, host.clone(), *port, "/health"))
                .collect())
        }

        async fn fetch_services(&self) -> Result<Vec<String>, DiscoveryError> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            if self.explode.swap(false, Ordering::SeqCst) {
                panic!("discovery listing blew up");
            }
            if self.unreachable.load(Ordering::SeqCst) {
                return Err(DiscoveryError::Query("connection reset".into()));
            }
            Ok(vec!["order-service".to_string()])
        }

        async fn shutdown(&self) {}
    }

    /// Never answers; flags when a pending probe is dropped.
    #[derive(Default)]
    struct HangingTransport {
        started: AtomicBool,
        dropped: Arc<AtomicBool>,
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for HangingTransport {
        async fn send(
            &self,
            _request: Request<Body>,
            _timeout: Duration,
        ) -> Result<Response<Body>, TransportError> {
            let _flag = DropFlag(self.dropped.clone());
            self.started.store(true, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    fn setup(
        endpoints: &[(&str, u16)],
    ) -> (HealthChecker, Arc<ServiceRegistry>, Arc<ScriptedTransport>, Arc<MutableDiscovery>) {
        let registry = Arc::new(ServiceRegistry::new());
        let transport = Arc::new(ScriptedTransport::default());
        let discovery = Arc::new(MutableDiscovery {
            endpoints: Mutex::new(endpoints.iter().map(|(h, p)| (h.to_string(), *p)).collect()),
            ..MutableDiscovery::default()
        });
        let checker = HealthChecker::new(
            registry.clone(),
            discovery.clone(),
            transport.clone(),
            HealthCheckConfig::default(),
        );
        (checker, registry, transport, discovery)
    }

    fn find(registry: &ServiceRegistry, authority: &str) -> Arc<ServiceInstance> {
        registry
            .instances("order-service")
            .iter()
            .find(|i| i.authority() == authority)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn only_200_is_healthy() {
        let (checker, registry, transport, _) =
            setup(&[("10.0.0.1", 80), ("10.0.0.2", 80), ("10.0.0.3", 80)]);
        transport.set("10.0.0.1:80", Some(200));
        transport.set("10.0.0.2:80", Some(204));

        checker.run_cycle().await;

        let ok = find(&registry, "10.0.0.1:80");
        let no_content = find(&registry, "10.0.0.2:80");
        let down = find(&registry, "10.0.0.3:80");
        assert!(ok.is_healthy());
        assert!(!no_content.is_healthy());
        assert!(!down.is_healthy());

        // An answered probe stamps the time, an unreachable one does not.
        assert!(ok.last_health_check() > 0.0);
        assert!(no_content.last_health_check() > 0.0);
        assert_eq!(down.last_health_check(), 0.0);
        assert_eq!(registry.instances("order-service").len(), 3);
    }

    #[tokio::test]
    async fn recovers_after_failed_probe() {
        let (checker, registry, transport, _) = setup(&[("10.0.0.1", 80)]);

        checker.run_cycle().await;
        assert!(!find(&registry, "10.0.0.1:80").is_healthy());

        transport.set("10.0.0.1:80", Some(200));
        checker.run_cycle().await;
        assert!(find(&registry, "10.0.0.1:80").is_healthy());
    }

    #[tokio::test]
    async fn repeated_cycles_are_idempotent_and_monotonic() {
        let (checker, registry, transport, _) = setup(&[("10.0.0.1", 80), ("10.0.0.2", 80)]);
        transport.set("10.0.0.1:80", Some(200));
        transport.set("10.0.0.2:80", Some(500));

        checker.run_cycle().await;
        let first: Vec<_> = registry.instances("order-service").iter().map(|i| i.health()).collect();

        checker.run_cycle().await;
        let second: Vec<_> = registry.instances("order-service").iter().map(|i| i.health()).collect();

        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.healthy, b.healthy);
            assert!(b.last_health_check >= a.last_health_check);
        }
    }

    #[tokio::test]
    async fn refresh_prunes_vanished_instances() {
        let (checker, registry, transport, discovery) = setup(&[("10.0.0.1", 80), ("10.0.0.2", 80)]);
        transport.set("10.0.0.1:80", Some(200));
        transport.set("10.0.0.2:80", Some(200));
        checker.run_cycle().await;
        assert_eq!(registry.instances("order-service").len(), 2);

        discovery.endpoints.lock().unwrap().retain(|(host, _)| host != "10.0.0.2");
        checker.run_cycle().await;

        let remaining = registry.instances("order-service");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].authority(), "10.0.0.1:80");
        assert!(remaining[0].is_healthy());
    }

    #[tokio::test]
    async fn failed_lookup_keeps_bucket_and_health() {
        let (checker, registry, transport, discovery) = setup(&[("10.0.0.1", 80)]);
        checker.run_cycle().await;
        assert!(!find(&registry, "10.0.0.1:80").is_healthy());

        discovery.unreachable.store(true, Ordering::SeqCst);
        checker.refresh().await;
        assert_eq!(registry.instances("order-service").len(), 1);

        discovery.unreachable.store(false, Ordering::SeqCst);
        checker.refresh().await;
        assert!(!find(&registry, "10.0.0.1:80").is_healthy());

        transport.set("10.0.0.1:80", Some(200));
        checker.run_cycle().await;
        assert!(find(&registry, "10.0.0.1:80").is_healthy());
    }

    #[tokio::test]
    async fn panicking_cycle_backs_off_and_continues() {
        let (checker, registry, transport, discovery) = setup(&[("10.0.0.1", 80)]);
        transport.set("10.0.0.1:80", Some(200));
        discovery.explode.store(true, Ordering::SeqCst);
        let checker = HealthChecker {
            config: HealthCheckConfig {
                interval_secs: 1,
                error_backoff_secs: 1,
                ..HealthCheckConfig::default()
            },
            ..checker
        };

        let started = Instant::now();
        let handle = checker.spawn();
        for _ in 0..50 {
            let probed = registry
                .instances("order-service")
                .first()
                .is_some_and(|i| i.last_health_check() > 0.0);
            if probed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert!(discovery.listings.load(Ordering::SeqCst) >= 2);
        assert!(started.elapsed() >= Duration::from_secs(1), "second cycle ran before the backoff");
        assert!(find(&registry, "10.0.0.1:80").last_health_check() > 0.0);
        assert!(!handle.is_finished());

        tokio::time::timeout(Duration::from_secs(2), handle.stop(Duration::from_secs(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn stop_after_grace_cancels_in_flight_probes() {
        let registry = Arc::new(ServiceRegistry::new());
        let transport = Arc::new(HangingTransport::default());
        let discovery = Arc::new(MutableDiscovery {
            endpoints: Mutex::new(vec![("10.0.0.1".to_string(), 80)]),
            ..MutableDiscovery::default()
        });
        let checker = HealthChecker::new(registry, discovery, transport.clone(), HealthCheckConfig::default());

        let handle = checker.spawn();
        for _ in 0..50 {
            if transport.started.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(transport.started.load(Ordering::SeqCst));

        tokio::time::timeout(Duration::from_secs(2), handle.stop(Duration::from_millis(100)))
            .await
            .unwrap();
        assert!(transport.dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stop_ends_loop() {
        let (checker, _, _, _) = setup(&[]);
        let handle = checker.spawn();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        tokio::time::timeout(Duration::from_secs(2), handle.stop(Duration::from_secs(1)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn disabled_checker_exits_immediately() {
        let registry = Arc::new(ServiceRegistry::new());
        let checker = HealthChecker::new(
            registry,
            Arc::new(MutableDiscovery::default()),
            Arc::new(ScriptedTransport::default()),
            HealthCheckConfig {
                enabled: false,
                ..HealthCheckConfig::default()
            },
        );
        let handle = checker.spawn();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.is_finished());
        handle.stop(Duration::from_secs(1)).await;
    }
}
