//! Core library for cloudtray
//!
//! This crate holds the server table, configuration store, slot pool and
//! the traits the background workers use to reach the outside world.

pub mod clipboard;
pub mod config;
pub mod error;
pub mod health;
pub mod inventory;
pub mod notify;
pub mod slots;
pub mod table;
pub mod template;
pub mod types;

// Re-exports
pub use clipboard::{export_slot, Clipboard};
pub use config::{
    ConfigChanges, ConfigPatch, ConfigStore, Credentials, EnvOverride, JsonSettingsFile,
    RefresherChange, Settings, SettingsStore,
};
pub use error::{Error, Result};
pub use health::{HealthCheck, ProbeOutcome, PROBE_TIMEOUT};
pub use inventory::{InventorySource, Zone};
pub use notify::{Listener, Notifier, Shutdown};
pub use slots::{DisplaySlotPool, TrayItem};
pub use table::{EntityTable, HealthUpdate};
pub use template::{fill_mask, fill_view};
pub use types::{Health, ServerId, ServerInfo, ServerRecord};
