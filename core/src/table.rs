//! Entity table
//!
//! Shared map of server id → record plus the display order from the last
//! refresh. The map and the order are only ever replaced together under one
//! write lock, so a reader never sees an order entry missing from the map.
//!
//! Health lives in a per-entity cell. The prober updates a single cell while
//! holding the table read lock, so renders are not blocked by probe results,
//! and reconciliation moves cells into the new table so that results landing
//! mid-refresh are not lost.

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{Health, ServerId, ServerInfo, ServerRecord};

struct Entity {
    info: ServerInfo,
    health: Arc<RwLock<Health>>,
}

impl Entity {
    fn record(&self) -> ServerRecord {
        ServerRecord {
            info: self.info.clone(),
            health: self.health.read().clone(),
        }
    }
}

#[derive(Default)]
struct TableState {
    entries: HashMap<ServerId, Entity>,
    order: Vec<ServerId>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl TableState {
    fn resolve(&self, id: &ServerId) -> &Entity {
        match self.entries.get(id) {
            Some(entity) => entity,
            // The order and the map are swapped together; getting here means
            // the table itself is broken.
            None => panic!("entity table corrupted: ordered id {} missing from map", id),
        }
    }
}

/// Outcome of a single health write-back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthUpdate {
    /// Stored value changed
    Written,
    /// Result matched the stored value, nothing written
    Unchanged,
    /// Entity left the table since the probe snapshot
    Gone,
}

/// Shared server table
#[derive(Default)]
pub struct EntityTable {
    state: RwLock<TableState>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table with a freshly fetched inventory.
    ///
    /// Duplicate ids keep their first occurrence. Health of servers already
    /// known is carried over; new servers start unreachable with unknown
    /// latency. Returns `true` when the number of servers changed.
    pub fn reconcile(&self, fetched: Vec<ServerInfo>) -> bool {
        // Upgradable: readers keep going while the new table is built, and no
        // other writer can slip in before the swap.
        let current = self.state.upgradable_read();

        let mut entries = HashMap::with_capacity(fetched.len());
        let mut order = Vec::with_capacity(fetched.len());
        for info in fetched {
            if entries.contains_key(&info.id) {
                continue;
            }
            let health = current
                .entries
                .get(&info.id)
                .map(|old| Arc::clone(&old.health))
                .unwrap_or_default();
            order.push(info.id.clone());
            entries.insert(info.id.clone(), Entity { info, health });
        }

        let old_len = current.order.len();
        let new_len = order.len();

        let mut state = RwLockUpgradableReadGuard::upgrade(current);
        state.entries = entries;
        state.order = order;
        state.refreshed_at = Some(Utc::now());

        old_len != new_len
    }

    pub fn len(&self) -> usize {
        self.state.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids in display order
    pub fn ordered_ids(&self) -> Vec<ServerId> {
        self.state.read().order.clone()
    }

    /// Copy of every record, in display order
    pub fn snapshot(&self) -> Vec<ServerRecord> {
        let state = self.state.read();
        state
            .order
            .iter()
            .map(|id| state.resolve(id).record())
            .collect()
    }

    pub fn get(&self, id: &ServerId) -> Option<ServerRecord> {
        self.state.read().entries.get(id).map(Entity::record)
    }

    /// Record at display position `index`
    pub fn record_at(&self, index: usize) -> Option<ServerRecord> {
        let state = self.state.read();
        state.order.get(index).map(|id| state.resolve(id).record())
    }

    /// Visit the first `limit` records in display order under one read lock.
    ///
    /// Returns the number of records visited.
    pub fn for_each_ordered(
        &self,
        limit: usize,
        mut visit: impl FnMut(usize, &ServerRecord),
    ) -> usize {
        let state = self.state.read();
        let count = state.order.len().min(limit);
        for (index, id) in state.order.iter().take(count).enumerate() {
            visit(index, &state.resolve(id).record());
        }
        count
    }

    /// Write a probe result back to one entity.
    ///
    /// Only the entity's own cell is write-locked. Nothing is written when
    /// the result matches what is stored (see [`Health::apply`]), or when the
    /// entity has been removed since it was probed.
    pub fn update_health(&self, id: &ServerId, reachable: bool, latency: &str) -> HealthUpdate {
        let state = self.state.read();
        let Some(entity) = state.entries.get(id) else {
            return HealthUpdate::Gone;
        };
        let mut health = entity.health.write();
        if health.apply(reachable, latency) {
            HealthUpdate::Written
        } else {
            HealthUpdate::Unchanged
        }
    }

    /// Time of the last reconciliation
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().refreshed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_LATENCY;
    use std::collections::HashSet;

    fn server(id: &str, name: &str) -> ServerInfo {
        ServerInfo::new(id, name, "running").with_ipv4("192.0.2.1")
    }

    fn ids(table: &EntityTable) -> Vec<String> {
        table
            .ordered_ids()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let table = EntityTable::new();
        table.reconcile(vec![server("A", "first"), server("B", "b"), server("A", "second")]);

        assert_eq!(ids(&table), vec!["A", "B"]);
        assert_eq!(table.get(&"A".into()).unwrap().info.name, "first");
    }

    #[test]
    fn test_order_matches_distinct_input_ids() {
        let input = ["c", "a", "c", "b", "a", "d", "b"];
        let table = EntityTable::new();
        table.reconcile(input.iter().map(|id| server(id, id)).collect());

        let distinct: HashSet<&str> = input.iter().copied().collect();
        assert_eq!(table.len(), distinct.len());
        assert_eq!(ids(&table), vec!["c", "a", "b", "d"]);
        for id in distinct {
            assert!(table.get(&id.into()).is_some());
        }
    }

    #[test]
    fn test_health_preserved_for_known_servers() {
        let table = EntityTable::new();
        table.reconcile(vec![server("A", "a"), server("B", "b")]);
        assert_eq!(table.update_health(&"A".into(), true, "17"), HealthUpdate::Written);

        table.reconcile(vec![server("B", "b"), server("A", "a-renamed"), server("C", "c")]);

        let a = table.get(&"A".into()).unwrap();
        assert_eq!(a.info.name, "a-renamed");
        assert!(a.health.reachable);
        assert_eq!(a.health.latency, "17");

        let c = table.get(&"C".into()).unwrap();
        assert!(!c.health.reachable);
        assert_eq!(c.health.latency, UNKNOWN_LATENCY);
    }

    #[test]
    fn test_reconcile_reports_size_change() {
        let table = EntityTable::new();
        assert!(table.reconcile(vec![server("A", "a"), server("B", "b")]));
        // same size, different members
        assert!(!table.reconcile(vec![server("C", "c"), server("B", "b")]));
        assert!(table.reconcile(vec![server("C", "c")]));
        assert!(table.reconcile(Vec::new()));
        assert!(table.is_empty());
    }

    #[test]
    fn test_removed_server_drops_health_write() {
        let table = EntityTable::new();
        table.reconcile(vec![server("A", "a")]);
        table.reconcile(vec![server("B", "b")]);

        assert_eq!(table.update_health(&"A".into(), true, "5"), HealthUpdate::Gone);
        assert!(table.get(&"A".into()).is_none());
    }

    #[test]
    fn test_update_health_unchanged() {
        let table = EntityTable::new();
        table.reconcile(vec![server("A", "a")]);
        assert_eq!(table.update_health(&"A".into(), false, "9"), HealthUpdate::Unchanged);
        assert_eq!(table.update_health(&"A".into(), true, "9"), HealthUpdate::Written);
        assert_eq!(table.update_health(&"A".into(), true, "9"), HealthUpdate::Unchanged);
        assert_eq!(table.update_health(&"A".into(), false, "0"), HealthUpdate::Written);
    }

    #[test]
    fn test_for_each_ordered_respects_limit() {
        let table = EntityTable::new();
        table.reconcile(vec![server("A", "a"), server("B", "b"), server("C", "c")]);

        let mut seen = Vec::new();
        let count = table.for_each_ordered(2, |index, record| {
            seen.push((index, record.info.name.clone()));
        });
        assert_eq!(count, 2);
        assert_eq!(seen, vec![(0, "a".to_string()), (1, "b".to_string())]);
        assert_eq!(table.record_at(2).unwrap().info.name, "c");
        assert!(table.record_at(3).is_none());
    }

    #[test]
    fn test_readers_never_see_partial_table() {
        let table = Arc::new(EntityTable::new());
        let writer = {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for round in 0..200 {
                    let size = round % 7;
                    let batch = (0..size)
                        .map(|n| server(&format!("{round}-{n}"), "s"))
                        .collect();
                    table.reconcile(batch);
                }
            })
        };

        for _ in 0..200 {
            // resolve() panics on an inconsistent pair
            let records = table.snapshot();
            if let Some(first) = records.first() {
                let round =
                    |r: &ServerRecord| r.id().as_str().split('-').next().unwrap().to_string();
                let expected = round(first);
                assert!(records.iter().all(|r| round(r) == expected));
            }
        }
        writer.join().unwrap();
    }
}
