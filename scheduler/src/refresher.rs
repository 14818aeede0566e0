//! Inventory refresher

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use cloudtray_core::notify::{self, Listener, Notifier};
use cloudtray_core::{
    ConfigStore, DisplaySlotPool, EntityTable, InventorySource, RefresherChange, Zone,
};

use crate::{arm, wait_until, DEBOUNCE_TICK};

/// Control side of an [`InventoryRefresher`]
#[derive(Clone)]
pub struct RefresherHandle {
    stop: Notifier,
    reconfigure: Notifier,
    mask: Notifier,
    redraw: Notifier,
}

impl RefresherHandle {
    /// Ask the loop to exit
    pub fn stop(&self) {
        self.stop.notify();
    }

    pub fn config_changed(&self, change: RefresherChange) {
        match change {
            RefresherChange::Reconfigure => self.reconfigure.notify(),
            RefresherChange::MaskOnly => self.mask.notify(),
        };
    }

    /// Re-render slot titles from the current table
    pub fn redraw(&self) {
        self.redraw.notify();
    }

    pub fn stop_notifier(&self) -> Notifier {
        self.stop.clone()
    }

    /// Notifier for the prober's "table changed" signal
    pub fn redraw_notifier(&self) -> Notifier {
        self.redraw.clone()
    }
}

/// Periodically fetches the inventory, reconciles it into the table and
/// renders the display slots
pub struct InventoryRefresher {
    config: Arc<ConfigStore>,
    table: Arc<EntityTable>,
    pool: Arc<DisplaySlotPool>,
    source: Arc<dyn InventorySource>,
    probe_trigger: Option<Notifier>,
    stop: Listener,
    reconfigure: Listener,
    mask: Listener,
    redraw: Listener,
    debounce: Duration,
    period: Option<Duration>,
    last_mask: String,
}

impl InventoryRefresher {
    pub fn new(
        config: Arc<ConfigStore>,
        table: Arc<EntityTable>,
        pool: Arc<DisplaySlotPool>,
        source: Arc<dyn InventorySource>,
    ) -> (Self, RefresherHandle) {
        let (stop_tx, stop) = notify::channel();
        let (reconfigure_tx, reconfigure) = notify::channel();
        let (mask_tx, mask) = notify::channel();
        let (redraw_tx, redraw) = notify::channel();

        let refresher = Self {
            config,
            table,
            pool,
            source,
            probe_trigger: None,
            stop,
            reconfigure,
            mask,
            redraw,
            debounce: DEBOUNCE_TICK,
            period: None,
            last_mask: String::new(),
        };
        let handle = RefresherHandle {
            stop: stop_tx,
            reconfigure: reconfigure_tx,
            mask: mask_tx,
            redraw: redraw_tx,
        };
        (refresher, handle)
    }

    /// Notified after the first successful fetch so servers get probed
    /// without waiting a full probe interval
    pub fn with_probe_trigger(mut self, trigger: Notifier) -> Self {
        self.probe_trigger = Some(trigger);
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        self.last_mask = self.config.view_mask();
        self.period = self.config.refresh_interval();
        info!(interval = ?self.period, "Inventory refresher started");
        if self.period.is_some() {
            self.first_run().await;
        }
        let mut deadline = arm(self.period);

        loop {
            tokio::select! {
                biased;

                _ = self.stop.recv() => {
                    info!("Inventory refresher stopped");
                    return;
                }

                _ = sleep(self.debounce) => {
                    if self.reconfigure.try_recv().is_some() {
                        self.reload().await;
                        deadline = arm(self.period);
                    } else if self.mask.try_recv().is_some() {
                        self.mask_changed();
                    }
                }

                Some(()) = self.redraw.recv() => {
                    self.render(false);
                }

                _ = wait_until(deadline) => {
                    self.refresh().await;
                    deadline = arm(self.period);
                }
            }
        }
    }

    async fn first_run(&mut self) {
        self.refresh().await;
        if let Some(trigger) = &self.probe_trigger {
            trigger.notify();
        }
    }

    /// Pick up interval and credential changes. A refresher that was parked
    /// and is now enabled fetches right away.
    async fn reload(&mut self) {
        let was_enabled = self.period.is_some();
        self.period = self.config.refresh_interval();
        info!(interval = ?self.period, "Inventory refresher reconfigured");

        if !was_enabled && self.period.is_some() {
            self.first_run().await;
        }
        self.mask_changed();
    }

    /// Re-render only when the display template text differs from the one
    /// used for the last render
    fn mask_changed(&mut self) {
        if self.config.view_mask() != self.last_mask {
            self.render(false);
        } else {
            debug!("Display template unchanged, no redraw");
        }
    }

    fn render(&mut self, full_relayout: bool) {
        self.last_mask = self.config.view_mask();
        self.pool.render(&self.table, &self.last_mask, full_relayout);
    }

    /// Fetch every configured zone, reconcile, render.
    ///
    /// A failing zone is logged and contributes nothing. When every zone
    /// fails (revoked or wrong credentials) the table ends up empty and the
    /// slots are hidden.
    #[instrument(skip(self))]
    async fn refresh(&mut self) {
        let credentials = self.config.credentials();
        let zone_names = self.config.zones();

        let mut servers = Vec::new();
        let mut failed = 0usize;
        for name in &zone_names {
            let zone = match name.parse::<Zone>() {
                Ok(zone) => zone,
                Err(e) => {
                    warn!(zone = %name, error = %e, "Skipping zone");
                    failed += 1;
                    continue;
                }
            };
            match self.source.list_servers(&credentials, zone).await {
                Ok(listed) => {
                    debug!(zone = %zone, count = listed.len(), "Zone listed");
                    servers.extend(listed);
                }
                Err(e) => {
                    warn!(zone = %zone, error = %e, "Failed to list servers");
                    failed += 1;
                }
            }
        }

        if !zone_names.is_empty() && failed == zone_names.len() {
            warn!(zones = failed, "Every zone failed, clearing inventory");
        }

        let resized = self.table.reconcile(servers);
        info!(
            servers = self.table.len(),
            failed_zones = failed,
            resized,
            "Inventory refreshed"
        );
        self.render(resized);
    }
}
