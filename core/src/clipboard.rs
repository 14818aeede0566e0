//! Clipboard seam and slot export

use crate::config::ConfigStore;
use crate::table::EntityTable;
use crate::template::fill_mask;
use crate::{Error, Result};

/// Text sink for exported slots
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// Render the export template for the server shown in slot `index`.
///
/// The config lock is released before the table is read.
pub fn export_slot(config: &ConfigStore, table: &EntityTable, index: usize) -> Result<String> {
    let mask = config.copy_mask();
    let record = table
        .record_at(index)
        .ok_or_else(|| Error::SlotError(format!("Wrong menu index: {}", index)))?;
    Ok(fill_mask(&mask, &record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::types::ServerInfo;

    #[test]
    fn test_export_uses_copy_mask() {
        let config = ConfigStore::new(Settings::default());
        let table = EntityTable::new();
        table.reconcile(vec![
            ServerInfo::new("a", "web1", "running").with_ipv4("192.0.2.1"),
            ServerInfo::new("b", "web2", "running").with_ipv4("192.0.2.2"),
        ]);

        assert_eq!(export_slot(&config, &table, 1).unwrap(), "ssh root@192.0.2.2");
    }

    #[test]
    fn test_export_out_of_range() {
        let config = ConfigStore::new(Settings::default());
        let table = EntityTable::new();
        let err = export_slot(&config, &table, 0).unwrap_err();
        assert!(matches!(err, Error::SlotError(_)));
    }
}
