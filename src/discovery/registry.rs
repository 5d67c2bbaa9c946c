use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::discovery::DiscoveryService;
use crate::inbox::{Inbox, InboxOutcome};

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Overrides every service's own scan timeout when set
    pub scan_timeout_override: Option<Duration>,
    /// Purge entries not re-confirmed once a scan finishes
    pub purge_on_scan: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            scan_timeout_override: None,
            purge_on_scan: true,
        }
    }
}

/// Statistics for one scan run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Services that were run
    pub services_run: usize,
    /// Services that returned an error
    pub services_failed: usize,
    /// Services aborted for exceeding their time budget
    pub services_timed_out: usize,
    /// Results submitted to the inbox
    pub results_submitted: usize,
    /// Results that created a new inbox entry
    pub added: usize,
    /// Results that replaced an existing entry
    pub updated: usize,
    /// Results that only re-confirmed an existing entry
    pub unchanged: usize,
    /// Results skipped because their binding did not match the scanning service
    pub skipped_foreign: usize,
    /// Stale entries purged after the scan finished
    pub purged: usize,
}

impl ScanStats {
    fn absorb(&mut self, other: ScanStats) {
        self.services_run += other.services_run;
        self.services_failed += other.services_failed;
        self.services_timed_out += other.services_timed_out;
        self.results_submitted += other.results_submitted;
        self.added += other.added;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.skipped_foreign += other.skipped_foreign;
        self.purged += other.purged;
    }
}

/// Registry of discovery services.
///
/// The registry owns the inbox, runs registered services on request, and
/// feeds their results into it. More than one service may be registered for
/// the same binding; a scan runs all of them. When a scan for a binding
/// finishes, entries of that binding which no service re-confirmed are
/// purged (unless disabled via [`RegistryConfig`]); ignored entries always
/// stay.
pub struct DiscoveryServiceRegistry {
    services: Vec<Box<dyn DiscoveryService>>,
    inbox: Inbox,
    config: RegistryConfig,
}

impl DiscoveryServiceRegistry {
    /// Create a registry around the given inbox
    pub fn new(inbox: Inbox) -> Self {
        Self::with_config(inbox, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(inbox: Inbox, config: RegistryConfig) -> Self {
        Self {
            services: Vec::new(),
            inbox,
            config,
        }
    }

    /// Register a discovery service
    pub fn register(&mut self, service: Box<dyn DiscoveryService>) {
        self.services.push(service);
    }

    /// Unregister all services of a binding, returning how many were removed
    pub fn unregister(&mut self, binding_id: &str) -> usize {
        let before = self.services.len();
        self.services
            .retain(|service| service.binding_id() != binding_id);
        before - self.services.len()
    }

    /// Bindings with at least one registered service, sorted and deduplicated
    pub fn bindings(&self) -> Vec<String> {
        let mut bindings: Vec<String> = self
            .services
            .iter()
            .map(|service| service.binding_id().to_string())
            .collect();
        bindings.sort();
        bindings.dedup();
        bindings
    }

    /// The inbox the registry feeds
    pub fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    /// Mutable access to the inbox, for operator actions
    pub fn inbox_mut(&mut self) -> &mut Inbox {
        &mut self.inbox
    }

    /// Scan one binding: run every matching service, submit its results to
    /// the inbox, then purge entries the scan did not re-confirm.
    ///
    /// A failing or timed-out service is logged and counted but never aborts
    /// the scan. Results whose binding does not match the scanning service
    /// are skipped with a warning.
    pub async fn scan_binding(&mut self, binding_id: &str) -> Result<ScanStats> {
        if !self
            .services
            .iter()
            .any(|service| service.binding_id() == binding_id)
        {
            return Err(anyhow!(
                "No discovery service registered for binding '{}'",
                binding_id
            ));
        }

        let started = Utc::now();
        let mut stats = ScanStats::default();

        for index in 0..self.services.len() {
            if self.services[index].binding_id() != binding_id {
                continue;
            }

            stats.services_run += 1;
            let timeout = self
                .config
                .scan_timeout_override
                .unwrap_or_else(|| self.services[index].scan_timeout());

            let scan = self.services[index].scan();
            match tokio::time::timeout(timeout, scan).await {
                Ok(Ok(results)) => {
                    for result in results {
                        if result.binding_id() != binding_id {
                            warn!(
                                "discovery service for '{}' emitted a result for foreign binding '{}', skipping '{}'",
                                binding_id,
                                result.binding_id(),
                                result.thing_uid()
                            );
                            stats.skipped_foreign += 1;
                            continue;
                        }

                        stats.results_submitted += 1;
                        match self.inbox.add(result)? {
                            InboxOutcome::Added => stats.added += 1,
                            InboxOutcome::Updated => stats.updated += 1,
                            InboxOutcome::Unchanged => stats.unchanged += 1,
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("discovery scan for binding '{}' failed: {:#}", binding_id, e);
                    stats.services_failed += 1;
                }
                Err(_) => {
                    warn!(
                        "discovery scan for binding '{}' timed out after {:?}",
                        binding_id, timeout
                    );
                    stats.services_timed_out += 1;
                }
            }
        }

        if self.config.purge_on_scan {
            let purged = self.inbox.purge_older_than(binding_id, started)?;
            stats.purged = purged.len();
        }

        Ok(stats)
    }

    /// Scan every binding with at least one registered service
    pub async fn scan_all(&mut self) -> Result<ScanStats> {
        let mut stats = ScanStats::default();
        for binding_id in self.bindings() {
            stats.absorb(self.scan_binding(&binding_id).await?);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        DiscoveryResult, DiscoveryResultBuilder, DiscoveryResultFlag, ThingTypeUid, ThingUid,
    };
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn node(binding: &str, id: &str, ip: &str) -> DiscoveryResult {
        DiscoveryResultBuilder::new(
            ThingUid::new(format!("{}:{}", binding, id)).unwrap(),
            ThingTypeUid::new(format!("{}:sensor", binding)).unwrap(),
        )
        .with_property("ip", ip)
        .build()
        .unwrap()
    }

    /// Serves one canned result batch per scan, then empty batches
    struct ScriptedService {
        binding: String,
        batches: Mutex<Vec<Vec<DiscoveryResult>>>,
    }

    impl ScriptedService {
        fn new(binding: &str, batches: Vec<Vec<DiscoveryResult>>) -> Self {
            Self {
                binding: binding.to_string(),
                batches: Mutex::new(batches),
            }
        }
    }

    #[async_trait]
    impl DiscoveryService for ScriptedService {
        fn binding_id(&self) -> &str {
            &self.binding
        }

        async fn scan(&self) -> Result<Vec<DiscoveryResult>> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(batches.remove(0))
            }
        }
    }

    struct FailingService;

    #[async_trait]
    impl DiscoveryService for FailingService {
        fn binding_id(&self) -> &str {
            "zwave"
        }

        async fn scan(&self) -> Result<Vec<DiscoveryResult>> {
            bail!("controller not reachable")
        }
    }

    struct SlowService;

    #[async_trait]
    impl DiscoveryService for SlowService {
        fn binding_id(&self) -> &str {
            "zwave"
        }

        async fn scan(&self) -> Result<Vec<DiscoveryResult>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_scan_feeds_inbox() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        registry.register(Box::new(ScriptedService::new(
            "zwave",
            vec![vec![node("zwave", "node12", "10.0.0.5"), node("zwave", "node13", "10.0.0.6")]],
        )));

        let stats = registry.scan_binding("zwave").await.unwrap();
        assert_eq!(stats.services_run, 1);
        assert_eq!(stats.results_submitted, 2);
        assert_eq!(stats.added, 2);
        assert_eq!(registry.inbox().stats().total, 2);
    }

    #[tokio::test]
    async fn test_scan_unknown_binding_fails() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        assert!(registry.scan_binding("zwave").await.is_err());
    }

    #[tokio::test]
    async fn test_rescan_updates_and_purges_missing_things() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        registry.register(Box::new(ScriptedService::new(
            "zwave",
            vec![
                vec![node("zwave", "node12", "10.0.0.5"), node("zwave", "node13", "10.0.0.6")],
                // Second scan: node12 moved, node13 gone
                vec![node("zwave", "node12", "10.0.0.9")],
            ],
        )));

        registry.scan_binding("zwave").await.unwrap();
        let stats = registry.scan_binding("zwave").await.unwrap();

        assert_eq!(stats.updated, 1);
        assert_eq!(stats.purged, 1);
        assert_eq!(registry.inbox().stats().total, 1);

        let uid = ThingUid::new("zwave:node12").unwrap();
        assert_eq!(
            registry.inbox().get(&uid).unwrap().properties().get("ip"),
            Some(&serde_json::json!("10.0.0.9"))
        );
    }

    #[tokio::test]
    async fn test_rescan_keeps_ignored_things() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        registry.register(Box::new(ScriptedService::new(
            "zwave",
            vec![vec![node("zwave", "node13", "10.0.0.6")], vec![]],
        )));

        registry.scan_binding("zwave").await.unwrap();
        let uid = ThingUid::new("zwave:node13").unwrap();
        registry.inbox_mut().ignore(&uid).unwrap();

        // node13 is not re-confirmed but stays because it is ignored
        let stats = registry.scan_binding("zwave").await.unwrap();
        assert_eq!(stats.purged, 0);
        assert_eq!(
            registry.inbox().get(&uid).unwrap().flag(),
            DiscoveryResultFlag::Ignored
        );
    }

    #[tokio::test]
    async fn test_foreign_results_are_skipped() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        registry.register(Box::new(ScriptedService::new(
            "zwave",
            vec![vec![node("zwave", "node12", "10.0.0.5"), node("hue", "lamp3", "10.0.0.7")]],
        )));

        let stats = registry.scan_binding("zwave").await.unwrap();
        assert_eq!(stats.skipped_foreign, 1);
        assert_eq!(stats.added, 1);
        assert!(registry
            .inbox()
            .get(&ThingUid::new("hue:lamp3").unwrap())
            .is_none());
    }

    #[tokio::test]
    async fn test_failing_service_does_not_abort_scan() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        registry.register(Box::new(FailingService));
        registry.register(Box::new(ScriptedService::new(
            "zwave",
            vec![vec![node("zwave", "node12", "10.0.0.5")]],
        )));

        let stats = registry.scan_binding("zwave").await.unwrap();
        assert_eq!(stats.services_run, 2);
        assert_eq!(stats.services_failed, 1);
        assert_eq!(stats.added, 1);
    }

    #[tokio::test]
    async fn test_slow_service_is_timed_out() {
        let config = RegistryConfig {
            scan_timeout_override: Some(Duration::from_millis(50)),
            purge_on_scan: true,
        };
        let mut registry = DiscoveryServiceRegistry::with_config(Inbox::new(), config);
        registry.register(Box::new(SlowService));

        let stats = registry.scan_binding("zwave").await.unwrap();
        assert_eq!(stats.services_timed_out, 1);
        assert_eq!(stats.results_submitted, 0);
    }

    #[tokio::test]
    async fn test_scan_all_covers_every_binding() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        registry.register(Box::new(ScriptedService::new(
            "zwave",
            vec![vec![node("zwave", "node12", "10.0.0.5")]],
        )));
        registry.register(Box::new(ScriptedService::new(
            "hue",
            vec![vec![node("hue", "lamp3", "10.0.0.7")]],
        )));

        let stats = registry.scan_all().await.unwrap();
        assert_eq!(stats.services_run, 2);
        assert_eq!(stats.added, 2);
        assert_eq!(registry.bindings(), vec!["hue", "zwave"]);
    }

    #[tokio::test]
    async fn test_unregister_removes_binding_services() {
        let mut registry = DiscoveryServiceRegistry::new(Inbox::new());
        registry.register(Box::new(ScriptedService::new("zwave", vec![])));
        registry.register(Box::new(ScriptedService::new("zwave", vec![])));
        registry.register(Box::new(ScriptedService::new("hue", vec![])));

        assert_eq!(registry.unregister("zwave"), 2);
        assert_eq!(registry.bindings(), vec!["hue"]);
    }
}
