//! Coordinator loop
//!
//! Owns the click listener and the console command stream, and forwards
//! settings changes to the workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cloudtray_core::{
    export_slot, Clipboard, ConfigChanges, ConfigStore, DisplaySlotPool, EntityTable,
    JsonSettingsFile, Listener, SettingsStore,
};
use cloudtray_scheduler::{ProbeHandle, RefresherHandle};

use crate::commands::{Command, HELP};
use crate::tray::ConsoleTray;

/// Result of one console command
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    Message(String),
    Silent,
    Quit,
}

pub struct App {
    config: Arc<ConfigStore>,
    table: Arc<EntityTable>,
    pool: Arc<DisplaySlotPool>,
    tray: Arc<ConsoleTray>,
    clipboard: Box<dyn Clipboard>,
    store: Box<dyn SettingsStore>,
    settings_path: Option<PathBuf>,
    refresher: RefresherHandle,
    prober: ProbeHandle,
}

impl App {
    pub fn new(
        config: Arc<ConfigStore>,
        table: Arc<EntityTable>,
        pool: Arc<DisplaySlotPool>,
        tray: Arc<ConsoleTray>,
        clipboard: Box<dyn Clipboard>,
        refresher: RefresherHandle,
        prober: ProbeHandle,
    ) -> Self {
        Self {
            config,
            table,
            pool,
            tray,
            clipboard,
            store: Box::new(JsonSettingsFile),
            settings_path: None,
            refresher,
            prober,
        }
    }

    /// File used by `save` and on exit
    pub fn with_settings_path(mut self, path: Option<PathBuf>) -> Self {
        self.settings_path = path;
        self
    }

    pub fn settings_path(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }

    /// Run until `stop` fires or `quit` is entered. A closed command stream
    /// (stdin at EOF) leaves the loop waiting for clicks and `stop`.
    pub async fn run(
        &self,
        mut clicks: Listener<usize>,
        mut commands: mpsc::Receiver<Command>,
        mut stop: Listener,
    ) {
        let mut console_open = true;

        loop {
            tokio::select! {
                biased;

                _ = stop.recv() => {
                    debug!("Stop requested");
                    break;
                }

                Some(index) = clicks.recv() => {
                    match self.on_click(index) {
                        Ok(text) => info!(slot = index, text = %text, "Slot exported"),
                        Err(e) => println!("{}", e),
                    }
                }

                command = commands.recv(), if console_open => {
                    let Some(command) = command else {
                        debug!("Console closed");
                        console_open = false;
                        continue;
                    };
                    match self.execute(command) {
                        Reply::Message(message) => println!("{}", message),
                        Reply::Silent => {}
                        Reply::Quit => break,
                    }
                }
            }
        }
    }

    /// Export slot `index` to the clipboard
    pub fn on_click(&self, index: usize) -> cloudtray_core::Result<String> {
        let text = export_slot(&self.config, &self.table, index)?;
        self.clipboard.write_text(&text)?;
        Ok(text)
    }

    pub fn execute(&self, command: Command) -> Reply {
        match command {
            Command::Click(index) => {
                if self.pool.click(index) {
                    Reply::Silent
                } else {
                    Reply::Message(format!("Wrong menu index: {}", index))
                }
            }
            Command::List => Reply::Message(self.listing()),
            Command::Set(patch) => {
                let changes = self.config.apply(patch);
                if changes.is_empty() {
                    debug!("Settings unchanged or export template only");
                }
                self.dispatch(changes);
                Reply::Message("Settings updated".to_string())
            }
            Command::Reset => {
                self.dispatch(self.config.reset());
                Reply::Message("Settings reset to defaults".to_string())
            }
            Command::Import(path) => match self.config.load_from(self.store.as_ref(), &path) {
                Ok(changes) => {
                    self.dispatch(changes);
                    Reply::Message(format!("Imported {}", path.display()))
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Import failed");
                    Reply::Message(e.to_string())
                }
            },
            Command::Export(path) => Reply::Message(self.save(&path)),
            Command::Save => match &self.settings_path {
                Some(path) => Reply::Message(self.save(path)),
                None => Reply::Message("No settings file configured".to_string()),
            },
            Command::Refresh => {
                if self.config.probe_interval().is_some() {
                    self.prober.trigger();
                    Reply::Silent
                } else {
                    Reply::Message("Probing is disabled (ping-interval is 0)".to_string())
                }
            }
            Command::Help => Reply::Message(HELP.to_string()),
            Command::Quit => Reply::Quit,
        }
    }

    /// Write the settings to the startup path, if any
    pub fn save_settings(&self) {
        if let Some(path) = &self.settings_path {
            if let Err(e) = self.config.save_to(self.store.as_ref(), path) {
                warn!(path = %path.display(), error = %e, "Failed to save settings");
            }
        }
    }

    fn save(&self, path: &Path) -> String {
        match self.config.save_to(self.store.as_ref(), path) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to save settings");
                e.to_string()
            }
        }
    }

    fn dispatch(&self, changes: ConfigChanges) {
        if let Some(change) = changes.refresher() {
            self.refresher.config_changed(change);
        }
        if changes.probe {
            self.prober.config_changed();
        }
    }

    fn listing(&self) -> String {
        let slots = self.tray.visible();
        let mut lines = Vec::with_capacity(slots.len() + 1);

        match self.table.refreshed_at() {
            Some(at) => lines.push(format!(
                "{} servers, refreshed {}",
                self.table.len(),
                at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
            )),
            None => lines.push("Inventory not fetched yet".to_string()),
        }
        lines.extend(slots.into_iter().map(|(index, title)| format!("{:>3}  {}", index, title)));
        lines.join("\n")
    }
}
