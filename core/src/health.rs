//! Health check seam

use async_trait::async_trait;
use std::time::Duration;

use crate::Result;

/// Per-check timeout
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    /// Round trip time; meaningless when unreachable
    pub latency: Duration,
}

impl ProbeOutcome {
    pub fn reachable(latency: Duration) -> Self {
        Self {
            reachable: true,
            latency,
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reachable: false,
            latency: Duration::ZERO,
        }
    }

    /// Latency as stored in the table: whole milliseconds
    pub fn latency_label(&self) -> String {
        self.latency.as_millis().to_string()
    }
}

/// Liveness check against one address, exactly one probe per call
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// `Err` means the check could not be run at all; a host that does not
    /// answer is `Ok` with `reachable == false`.
    async fn check(&self, address: &str, timeout: Duration) -> Result<ProbeOutcome>;
}
