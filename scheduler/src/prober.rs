//! Health prober

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use cloudtray_core::notify::{self, Listener, Notifier};
use cloudtray_core::{
    ConfigStore, EntityTable, HealthCheck, HealthUpdate, ProbeOutcome, PROBE_TIMEOUT,
};

use crate::{arm, wait_until, DEBOUNCE_TICK};

/// Control side of a [`HealthProbe`]
#[derive(Clone)]
pub struct ProbeHandle {
    stop: Notifier,
    reconfigure: Notifier,
    trigger: Notifier,
}

impl ProbeHandle {
    /// Ask the loop to exit
    pub fn stop(&self) {
        self.stop.notify();
    }

    /// The probe interval changed
    pub fn config_changed(&self) {
        self.reconfigure.notify();
    }

    /// Probe now, if probing is enabled
    pub fn trigger(&self) {
        self.trigger.notify();
    }

    pub fn stop_notifier(&self) -> Notifier {
        self.stop.clone()
    }

    pub fn trigger_notifier(&self) -> Notifier {
        self.trigger.clone()
    }
}

/// Periodic liveness checks of every addressable server
pub struct HealthProbe {
    config: Arc<ConfigStore>,
    table: Arc<EntityTable>,
    checker: Arc<dyn HealthCheck>,
    redraw: Notifier,
    stop: Listener,
    reconfigure: Listener,
    trigger: Listener,
    debounce: Duration,
    timeout: Duration,
}

impl HealthProbe {
    /// `redraw` is notified whenever a probe result changes the table
    pub fn new(
        config: Arc<ConfigStore>,
        table: Arc<EntityTable>,
        checker: Arc<dyn HealthCheck>,
        redraw: Notifier,
    ) -> (Self, ProbeHandle) {
        let (stop_tx, stop) = notify::channel();
        let (reconfigure_tx, reconfigure) = notify::channel();
        let (trigger_tx, trigger) = notify::channel();

        let probe = Self {
            config,
            table,
            checker,
            redraw,
            stop,
            reconfigure,
            trigger,
            debounce: DEBOUNCE_TICK,
            timeout: PROBE_TIMEOUT,
        };
        let handle = ProbeHandle {
            stop: stop_tx,
            reconfigure: reconfigure_tx,
            trigger: trigger_tx,
        };
        (probe, handle)
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let mut period = self.config.probe_interval();
        let mut deadline = arm(period);
        info!(interval = ?period, "Health probe started");

        loop {
            tokio::select! {
                biased;

                _ = self.stop.recv() => {
                    info!("Health probe stopped");
                    return;
                }

                _ = sleep(self.debounce) => {
                    if self.reconfigure.try_recv().is_some() {
                        period = self.config.probe_interval();
                        deadline = arm(period);
                        info!(interval = ?period, "Health probe reconfigured");
                    }
                }

                Some(()) = self.trigger.recv() => {
                    if period.is_some() {
                        self.probe_all().await;
                        deadline = arm(period);
                    } else {
                        debug!("Probe request ignored, probing disabled");
                    }
                }

                _ = wait_until(deadline) => {
                    self.probe_all().await;
                    deadline = arm(period);
                }
            }
        }
    }

    /// Check every addressable server once, concurrently, and write back
    /// results that differ from what is stored.
    ///
    /// Returns the number of servers whose health changed.
    #[instrument(skip(self))]
    pub async fn probe_all(&self) -> usize {
        let targets: Vec<_> = self
            .table
            .snapshot()
            .into_iter()
            .filter_map(|record| {
                let (_, address) = record.info.probe_address()?;
                Some((record.info.id.clone(), address.to_string()))
            })
            .collect();

        if targets.is_empty() {
            debug!("Nothing to probe");
            return 0;
        }

        let checks = targets.iter().map(|(id, address)| async move {
            let check = self.checker.check(address, self.timeout);
            let outcome = match tokio::time::timeout(self.timeout, check).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    warn!(server_id = %id, address = %address, error = %e, "Health check failed");
                    return false;
                }
                Err(_) => ProbeOutcome::unreachable(),
            };

            match self
                .table
                .update_health(id, outcome.reachable, &outcome.latency_label())
            {
                HealthUpdate::Written => {
                    info!(
                        server_id = %id,
                        reachable = outcome.reachable,
                        latency_ms = outcome.latency.as_millis() as u64,
                        "Server health changed"
                    );
                    self.redraw.notify();
                    true
                }
                HealthUpdate::Unchanged => false,
                HealthUpdate::Gone => {
                    debug!(server_id = %id, "Server removed while probing, result dropped");
                    false
                }
            }
        });

        let changed = join_all(checks)
            .await
            .into_iter()
            .filter(|changed| *changed)
            .count();
        debug!(probed = targets.len(), changed, "Probe cycle finished");
        changed
    }
}
