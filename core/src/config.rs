//! Configuration store and settings persistence

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::{Error, Result};

pub const APP_NAME: &str = "cloudtray";
pub const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_VIEW_MASK: &str = "{ALIVE} {FLAG} {NAME} {IPvX} {STATE}";
pub const DEFAULT_COPY_MASK: &str = "ssh root@{IPv4}";
pub const DEFAULT_CHECK_INTERVAL: u64 = 1200;
pub const DEFAULT_PING_INTERVAL: u64 = 10;
pub const DEFAULT_ZONES: [&str; 2] = ["fr-par-1", "nl-ams-1"];

/// Refresh intervals below this disable the refresher
pub const MIN_CHECK_INTERVAL: u64 = 10;
/// Probe intervals below this disable the prober
pub const MIN_PING_INTERVAL: u64 = 1;

/// Persisted settings (flat JSON record)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub organization_id: String,
    pub access_key: String,
    pub secret_key: String,

    /// Slot title template
    pub view_mask: String,
    /// Clipboard template
    pub copy_mask: String,

    /// Inventory refresh interval, seconds
    pub check_interval: u64,
    /// Health probe interval, seconds
    pub ping_interval: u64,

    /// Zones queried on every refresh
    pub zones: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            organization_id: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            view_mask: DEFAULT_VIEW_MASK.to_string(),
            copy_mask: DEFAULT_COPY_MASK.to_string(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            zones: DEFAULT_ZONES.iter().map(|z| z.to_string()).collect(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("organization_id", &self.organization_id)
            .field("access_key", &self.access_key)
            .field("secret_key", &mask_secret(&self.secret_key))
            .field("view_mask", &self.view_mask)
            .field("copy_mask", &self.copy_mask)
            .field("check_interval", &self.check_interval)
            .field("ping_interval", &self.ping_interval)
            .field("zones", &self.zones)
            .finish()
    }
}

impl Settings {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            organization_id: self.organization_id.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        }
    }

    /// Refresh period, or `None` when refreshing is disabled (interval too
    /// small or credentials missing)
    pub fn refresh_interval(&self) -> Option<Duration> {
        if self.check_interval >= MIN_CHECK_INTERVAL && self.credentials().is_complete() {
            Some(Duration::from_secs(self.check_interval))
        } else {
            None
        }
    }

    /// Probe period, or `None` when probing is disabled
    pub fn probe_interval(&self) -> Option<Duration> {
        if self.ping_interval >= MIN_PING_INTERVAL {
            Some(Duration::from_secs(self.ping_interval))
        } else {
            None
        }
    }

    fn credential_fields_mut(&mut self) -> [(&'static str, &mut String); 3] {
        [
            ("SCW_DEFAULT_ORGANIZATION_ID", &mut self.organization_id),
            ("SCW_ACCESS_KEY", &mut self.access_key),
            ("SCW_SECRET_KEY", &mut self.secret_key),
        ]
    }

    /// Override credentials from the environment.
    ///
    /// Reads `SCW_DEFAULT_ORGANIZATION_ID`, `SCW_ACCESS_KEY` and
    /// `SCW_SECRET_KEY` (or their `_FILE` variants). Returns what was
    /// replaced so the file values can be written back on save.
    pub fn apply_env_overrides(&mut self) -> Vec<EnvOverride> {
        self.apply_overrides_with(get_secret)
    }

    fn apply_overrides_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Vec<EnvOverride> {
        let mut applied = Vec::new();
        for (var, field) in self.credential_fields_mut() {
            let Some(value) = lookup(var) else {
                continue;
            };
            if *field == value {
                continue;
            }
            debug!(var, "Credential taken from environment");
            let file_value = std::mem::replace(field, value.clone());
            applied.push(EnvOverride {
                var,
                env_value: value,
                file_value,
            });
        }
        applied
    }
}

/// A credential replaced from the environment, and the value it replaced
#[derive(Clone, PartialEq, Eq)]
pub struct EnvOverride {
    var: &'static str,
    env_value: String,
    file_value: String,
}

impl EnvOverride {
    pub fn var(&self) -> &'static str {
        self.var
    }

    /// Put the file value back unless the field was edited since startup
    fn restore(&self, settings: &mut Settings) {
        for (var, field) in settings.credential_fields_mut() {
            if var == self.var && *field == self.env_value {
                field.clone_from(&self.file_value);
            }
        }
    }
}

impl fmt::Debug for EnvOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvOverride").field("var", &self.var).finish()
    }
}

/// Inventory API credentials
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub organization_id: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn is_complete(&self) -> bool {
        !self.organization_id.is_empty()
            && !self.access_key.is_empty()
            && !self.secret_key.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("organization_id", &self.organization_id)
            .field("access_key", &self.access_key)
            .field("secret_key", &mask_secret(&self.secret_key))
            .finish()
    }
}

/// Mask a secret for logs: first and last three characters of long values
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        "***".to_string()
    } else {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{head}***{tail}")
    }
}

/// Get secret from environment variable or file
///
/// If `VAR_NAME` is not set, tries `VAR_NAME_FILE`, which should point to a
/// file containing the secret. Empty values count as unset.
pub fn get_secret(var_name: &str) -> Option<String> {
    if let Ok(value) = std::env::var(var_name) {
        if !value.is_empty() {
            return Some(value);
        }
    }

    let file_var = format!("{}_FILE", var_name);
    if let Ok(path) = std::env::var(&file_var) {
        if let Ok(contents) = fs::read_to_string(&path) {
            let value = contents.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}

/// Partial update of the settings; `None` fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub organization_id: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub view_mask: Option<String>,
    pub copy_mask: Option<String>,
    pub check_interval: Option<u64>,
    pub ping_interval: Option<u64>,
    pub zones: Option<Vec<String>>,
}

/// What the refresher has to do after a settings change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefresherChange {
    /// Re-read interval and credentials, restart the timer, re-evaluate the display template
    Reconfigure,
    /// Only the display template changed
    MaskOnly,
}

/// Notifications owed to the workers after a settings change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigChanges {
    pub reconfigure: bool,
    pub mask: bool,
    pub probe: bool,
}

impl ConfigChanges {
    /// Everything may have changed (reset, import)
    pub fn all() -> Self {
        Self {
            reconfigure: true,
            mask: true,
            probe: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.reconfigure || self.mask || self.probe)
    }

    pub fn refresher(&self) -> Option<RefresherChange> {
        if self.reconfigure {
            Some(RefresherChange::Reconfigure)
        } else if self.mask {
            Some(RefresherChange::MaskOnly)
        } else {
            None
        }
    }
}

fn set_if_changed<T: PartialEq>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) if *slot != value => {
            *slot = value;
            true
        }
        _ => false,
    }
}

/// Shared, lock-guarded settings
#[derive(Debug, Default)]
pub struct ConfigStore {
    settings: RwLock<Settings>,
    env_overrides: Vec<EnvOverride>,
}

impl ConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(settings),
            env_overrides: Vec::new(),
        }
    }

    /// Credentials that came from the environment are never persisted
    pub fn with_env_overrides(mut self, overrides: Vec<EnvOverride>) -> Self {
        self.env_overrides = overrides;
        self
    }

    pub fn snapshot(&self) -> Settings {
        self.settings.read().clone()
    }

    pub fn view_mask(&self) -> String {
        self.settings.read().view_mask.clone()
    }

    pub fn copy_mask(&self) -> String {
        self.settings.read().copy_mask.clone()
    }

    pub fn credentials(&self) -> Credentials {
        self.settings.read().credentials()
    }

    pub fn zones(&self) -> Vec<String> {
        self.settings.read().zones.clone()
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.settings.read().refresh_interval()
    }

    pub fn probe_interval(&self) -> Option<Duration> {
        self.settings.read().probe_interval()
    }

    /// Apply a patch and report which workers must be told.
    ///
    /// Fields set to their current value produce no notification.
    pub fn apply(&self, patch: ConfigPatch) -> ConfigChanges {
        let mut settings = self.settings.write();
        let mut changes = ConfigChanges::default();

        changes.reconfigure |= set_if_changed(&mut settings.organization_id, patch.organization_id);
        changes.reconfigure |= set_if_changed(&mut settings.access_key, patch.access_key);
        changes.reconfigure |= set_if_changed(&mut settings.secret_key, patch.secret_key);
        changes.reconfigure |= set_if_changed(&mut settings.check_interval, patch.check_interval);
        changes.reconfigure |= set_if_changed(&mut settings.zones, patch.zones);
        changes.mask |= set_if_changed(&mut settings.view_mask, patch.view_mask);
        changes.probe |= set_if_changed(&mut settings.ping_interval, patch.ping_interval);
        // The export template is read at click time; nobody to notify.
        set_if_changed(&mut settings.copy_mask, patch.copy_mask);

        changes
    }

    /// Replace everything (import)
    pub fn replace(&self, settings: Settings) -> ConfigChanges {
        *self.settings.write() = settings;
        ConfigChanges::all()
    }

    /// Back to defaults
    pub fn reset(&self) -> ConfigChanges {
        self.replace(Settings::default())
    }

    /// Import settings from `path`. The store is untouched on error.
    pub fn load_from(&self, store: &dyn SettingsStore, path: &Path) -> Result<ConfigChanges> {
        let settings = store.load(path)?;
        info!(path = %path.display(), "Settings imported");
        Ok(self.replace(settings))
    }

    /// Settings as they should land on disk: environment credentials are
    /// swapped back for the values loaded from the file
    pub fn persisted(&self) -> Settings {
        let mut settings = self.snapshot();
        for env_override in &self.env_overrides {
            env_override.restore(&mut settings);
        }
        settings
    }

    /// Write the current settings to `path`
    pub fn save_to(&self, store: &dyn SettingsStore, path: &Path) -> Result<()> {
        let settings = self.persisted();
        store.save(path, &settings)?;
        info!(path = %path.display(), "Settings saved");
        Ok(())
    }
}

/// Settings persistence medium
pub trait SettingsStore: Send + Sync {
    fn load(&self, path: &Path) -> Result<Settings>;
    fn save(&self, path: &Path, settings: &Settings) -> Result<()>;
}

/// Pretty-printed JSON file, owner-only permissions on unix
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSettingsFile;

impl SettingsStore for JsonSettingsFile {
    fn load(&self, path: &Path) -> Result<Settings> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::PersistenceError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::PersistenceError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    fn save(&self, path: &Path, settings: &Settings) -> Result<()> {
        let json = serde_json::to_string_pretty(settings)?;

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            create_private_dir(dir).map_err(|e| {
                Error::PersistenceError(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }

        write_private_file(path, json.as_bytes()).map_err(|e| {
            Error::PersistenceError(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

fn write_private_file(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()
}

/// `<config dir>/cloudtray/settings.json`, if the platform has a config dir
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(SETTINGS_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Settings {
        Settings {
            organization_id: "org".to_string(),
            access_key: "SCWACCESS".to_string(),
            secret_key: "0123-4567-89ab".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.view_mask, "{ALIVE} {FLAG} {NAME} {IPvX} {STATE}");
        assert_eq!(settings.copy_mask, "ssh root@{IPv4}");
        assert_eq!(settings.check_interval, 1200);
        assert_eq!(settings.ping_interval, 10);
        assert_eq!(settings.zones, vec!["fr-par-1", "nl-ams-1"]);
    }

    #[test]
    fn test_refresh_disabled_without_credentials() {
        assert_eq!(Settings::default().refresh_interval(), None);
        assert_eq!(configured().refresh_interval(), Some(Duration::from_secs(1200)));
    }

    #[test]
    fn test_refresh_disabled_below_threshold() {
        let mut settings = configured();
        settings.check_interval = 9;
        assert_eq!(settings.refresh_interval(), None);
        settings.check_interval = 10;
        assert_eq!(settings.refresh_interval(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_probe_disabled_at_zero() {
        let mut settings = Settings::default();
        settings.ping_interval = 0;
        assert_eq!(settings.probe_interval(), None);
        settings.ping_interval = 1;
        assert_eq!(settings.probe_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_apply_classifies_changes() {
        let store = ConfigStore::new(configured());

        let changes = store.apply(ConfigPatch {
            secret_key: Some("new-secret-value".to_string()),
            ..Default::default()
        });
        assert_eq!(changes.refresher(), Some(RefresherChange::Reconfigure));
        assert!(!changes.probe);

        let changes = store.apply(ConfigPatch {
            view_mask: Some("{NAME}".to_string()),
            ..Default::default()
        });
        assert_eq!(changes.refresher(), Some(RefresherChange::MaskOnly));

        let changes = store.apply(ConfigPatch {
            ping_interval: Some(0),
            ..Default::default()
        });
        assert_eq!(changes.refresher(), None);
        assert!(changes.probe);
        assert_eq!(store.probe_interval(), None);
    }

    #[test]
    fn test_apply_same_value_is_silent() {
        let store = ConfigStore::new(configured());
        let changes = store.apply(ConfigPatch {
            view_mask: Some(DEFAULT_VIEW_MASK.to_string()),
            check_interval: Some(DEFAULT_CHECK_INTERVAL),
            ..Default::default()
        });
        assert!(changes.is_empty());
    }

    #[test]
    fn test_copy_mask_change_notifies_nobody() {
        let store = ConfigStore::new(configured());
        let changes = store.apply(ConfigPatch {
            copy_mask: Some("mosh {IPvX}".to_string()),
            ..Default::default()
        });
        assert!(changes.is_empty());
        assert_eq!(store.copy_mask(), "mosh {IPvX}");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = ConfigStore::new(configured());
        assert_eq!(store.reset(), ConfigChanges::all());
        assert_eq!(store.snapshot(), Settings::default());
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let store = ConfigStore::new(configured());

        store.save_to(&JsonSettingsFile, &path).unwrap();

        let other = ConfigStore::default();
        let changes = other.load_from(&JsonSettingsFile, &path).unwrap();
        assert_eq!(changes, ConfigChanges::all());
        assert_eq!(other.snapshot(), configured());
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        JsonSettingsFile.save(&path, &configured()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{"access_key": "abc", "ping_interval": 0}"#).unwrap();

        let settings = JsonSettingsFile.load(&path).unwrap();
        assert_eq!(settings.access_key, "abc");
        assert_eq!(settings.ping_interval, 0);
        assert_eq!(settings.check_interval, DEFAULT_CHECK_INTERVAL);
        assert_eq!(settings.view_mask, DEFAULT_VIEW_MASK);
    }

    #[test]
    fn test_failed_import_keeps_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "not json").unwrap();

        let store = ConfigStore::new(configured());
        let err = store.load_from(&JsonSettingsFile, &path).unwrap_err();
        assert!(matches!(err, Error::PersistenceError(_)));
        assert!(store
            .load_from(&JsonSettingsFile, &dir.path().join("missing.json"))
            .is_err());
        assert_eq!(store.snapshot(), configured());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc123def456ghi789"), "abc***789");
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret(""), "***");
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", configured());
        assert!(!rendered.contains("0123-4567-89ab"));
        assert!(rendered.contains("012***9ab"));
    }

    fn fake_env(var: &str) -> Option<String> {
        match var {
            "SCW_SECRET_KEY" => Some("env-secret-0000".to_string()),
            "SCW_ACCESS_KEY" => Some("SCWACCESS".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_env_overrides_replace_credentials() {
        let mut settings = configured();
        let overrides = settings.apply_overrides_with(fake_env);

        assert_eq!(settings.secret_key, "env-secret-0000");
        assert_eq!(settings.organization_id, "org");
        // same value as the file: nothing to remember
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].var(), "SCW_SECRET_KEY");
    }

    #[test]
    fn test_env_credentials_are_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let mut settings = configured();
        let overrides = settings.apply_overrides_with(fake_env);
        let store = ConfigStore::new(settings).with_env_overrides(overrides);
        assert_eq!(store.credentials().secret_key, "env-secret-0000");

        store.save_to(&JsonSettingsFile, &path).unwrap();
        let saved = JsonSettingsFile.load(&path).unwrap();
        assert_eq!(saved.secret_key, "0123-4567-89ab");
        assert!(!fs::read_to_string(&path).unwrap().contains("env-secret-0000"));
    }

    #[test]
    fn test_credential_edited_after_start_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);

        let mut settings = configured();
        let overrides = settings.apply_overrides_with(fake_env);
        let store = ConfigStore::new(settings).with_env_overrides(overrides);
        store.apply(ConfigPatch {
            secret_key: Some("typed-in-secret".to_string()),
            ..Default::default()
        });

        store.save_to(&JsonSettingsFile, &path).unwrap();
        assert_eq!(
            JsonSettingsFile.load(&path).unwrap().secret_key,
            "typed-in-secret"
        );
    }

    #[test]
    fn test_env_override_debug_hides_values() {
        let mut settings = configured();
        let overrides = settings.apply_overrides_with(fake_env);
        let rendered = format!("{:?}", overrides);
        assert!(rendered.contains("SCW_SECRET_KEY"));
        assert!(!rendered.contains("env-secret-0000"));
        assert!(!rendered.contains("0123-4567-89ab"));
    }
}
