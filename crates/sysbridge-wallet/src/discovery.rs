//! Bounded wallet discovery.
//!
//! Injected wallet providers appear asynchronously (browser extensions,
//! hardware bridges). Discovery polls a probe on a fixed cadence inside a
//! hard time budget and resolves to a tri-state answer instead of leaving
//! callers polling forever.

use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Tri-state wallet availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WalletAvailability {
    /// Discovery has not run (or not finished) yet.
    #[default]
    Unresolved,
    Installed,
    NotInstalled,
}

/// A cheap, synchronous presence check for an injected wallet provider.
pub trait WalletProbe: Send + Sync {
    fn is_present(&self) -> bool;
}

/// Discovery cadence and budget.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub timeout_ms: u64,
    pub probe_interval_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            probe_interval_ms: 100,
        }
    }
}

/// Poll the probe until it reports presence or the budget runs out.
pub async fn detect_wallet(probe: &dyn WalletProbe, config: &DiscoveryConfig) -> WalletAvailability {
    let deadline = Instant::now() + Duration::from_millis(config.timeout_ms);

    loop {
        if probe.is_present() {
            return WalletAvailability::Installed;
        }
        if Instant::now() >= deadline {
            return WalletAvailability::NotInstalled;
        }
        sleep(Duration::from_millis(config.probe_interval_ms)).await;
    }
}
