use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DiscoveryResult;

/// Default time budget for a single scan
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// A discovery process for one binding.
///
/// An implementation scans its environment (a wireless network, a subnet, a
/// bus) and proposes candidate things as discovery results. Services build
/// their results with [`crate::models::DiscoveryResultBuilder`], so every
/// result they emit carries the `New` flag; review state belongs to the
/// inbox, not to the service.
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Binding this service produces results for
    fn binding_id(&self) -> &str;

    /// Time budget for a single scan; the registry aborts longer scans
    fn scan_timeout(&self) -> Duration {
        DEFAULT_SCAN_TIMEOUT
    }

    /// Run one scan and return the candidates found
    async fn scan(&self) -> Result<Vec<DiscoveryResult>>;
}
