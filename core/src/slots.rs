//! Display slot pool
//!
//! A fixed number of tray items with stable indices. Slot `i` shows the
//! entity at position `i` of the table order; slots past the end of the
//! table stay hidden.

use std::sync::Arc;
use tracing::debug;

use crate::notify::{self, Listener, Notifier};
use crate::table::EntityTable;
use crate::template::fill_view;

/// One renderable tray entry, provided by the tray front end
pub trait TrayItem: Send + Sync {
    fn set_title(&self, title: &str);
    fn show(&self);
    fn hide(&self);
}

/// Fixed-capacity pool of tray items
pub struct DisplaySlotPool {
    items: Vec<Arc<dyn TrayItem>>,
    clicks: Notifier<usize>,
}

impl DisplaySlotPool {
    /// Wrap `items` (all hidden on return) and get the click listener.
    ///
    /// Clicks coalesce: while one click is waiting to be handled, further
    /// clicks are dropped.
    pub fn new(items: Vec<Arc<dyn TrayItem>>) -> (Self, Listener<usize>) {
        let (clicks, listener) = notify::channel();
        let pool = Self { items, clicks };
        pool.hide_all();
        (pool, listener)
    }

    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Report a click on slot `index`. Out-of-range indices are ignored.
    pub fn click(&self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.clicks.send(index)
    }

    /// Set the title of slot `index`, optionally making it visible.
    ///
    /// Returns `false` without touching anything when `index` is out of range.
    pub fn update_title(&self, index: usize, title: &str, show: bool) -> bool {
        let Some(item) = self.items.get(index) else {
            return false;
        };
        item.set_title(title);
        if show {
            item.show();
        }
        true
    }

    pub fn hide_all(&self) {
        for item in &self.items {
            item.hide();
        }
    }

    /// Render the table into the slots using the display template `mask`.
    ///
    /// With `full_relayout` every slot is hidden first and the rendered ones
    /// shown again, which is needed whenever the table size changed. Without
    /// it only titles are rewritten. Returns the number of slots rendered.
    pub fn render(&self, table: &EntityTable, mask: &str, full_relayout: bool) -> usize {
        if full_relayout {
            self.hide_all();
        }
        let rendered = table.for_each_ordered(self.capacity(), |index, record| {
            self.update_title(index, &fill_view(mask, record), full_relayout);
        });
        debug!(rendered, full_relayout, "Slots rendered");
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ServerInfo;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct RecordingItem {
        title: Mutex<String>,
        visible: AtomicBool,
    }

    impl TrayItem for RecordingItem {
        fn set_title(&self, title: &str) {
            *self.title.lock() = title.to_string();
        }

        fn show(&self) {
            self.visible.store(true, Ordering::SeqCst);
        }

        fn hide(&self) {
            self.visible.store(false, Ordering::SeqCst);
        }
    }

    fn pool(capacity: usize) -> (DisplaySlotPool, Vec<Arc<RecordingItem>>, Listener<usize>) {
        let items: Vec<Arc<RecordingItem>> =
            (0..capacity).map(|_| Arc::new(RecordingItem::default())).collect();
        let dyn_items = items
            .iter()
            .map(|item| Arc::clone(item) as Arc<dyn TrayItem>)
            .collect();
        let (pool, clicks) = DisplaySlotPool::new(dyn_items);
        (pool, items, clicks)
    }

    fn visible(items: &[Arc<RecordingItem>]) -> Vec<usize> {
        items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.visible.load(Ordering::SeqCst))
            .map(|(index, _)| index)
            .collect()
    }

    fn servers(ids: &[&str]) -> Vec<ServerInfo> {
        ids.iter()
            .map(|id| ServerInfo::new(*id, format!("srv-{id}"), "running"))
            .collect()
    }

    #[test]
    fn test_update_title_rejects_out_of_range() {
        let (pool, items, _clicks) = pool(2);
        assert!(!pool.update_title(2, "nope", true));
        assert!(pool.update_title(1, "yes", true));
        assert_eq!(*items[1].title.lock(), "yes");
        assert_eq!(visible(&items), vec![1]);
    }

    #[test]
    fn test_update_title_without_show_keeps_hidden() {
        let (pool, items, _clicks) = pool(1);
        assert!(pool.update_title(0, "quiet", false));
        assert_eq!(*items[0].title.lock(), "quiet");
        assert!(visible(&items).is_empty());
    }

    #[test]
    fn test_duplicate_inventory_leaves_slot_hidden() {
        let (pool, items, _clicks) = pool(20);
        let table = EntityTable::new();
        let changed = table.reconcile(servers(&["A", "B", "A"]));

        assert_eq!(pool.render(&table, "{NAME}", changed), 2);
        assert_eq!(visible(&items), vec![0, 1]);
        assert_eq!(*items[0].title.lock(), "srv-A");
        assert_eq!(*items[1].title.lock(), "srv-B");
    }

    #[test]
    fn test_shrinking_hides_stale_slots() {
        let (pool, items, _clicks) = pool(5);
        let table = EntityTable::new();

        let changed = table.reconcile(servers(&["A", "B", "C", "D"]));
        pool.render(&table, "{ID}", changed);
        assert_eq!(visible(&items), vec![0, 1, 2, 3]);

        let changed = table.reconcile(servers(&["D", "B"]));
        assert!(changed);
        pool.render(&table, "{ID}", changed);
        assert_eq!(visible(&items), vec![0, 1]);
        assert_eq!(*items[0].title.lock(), "D");
        assert_eq!(*items[1].title.lock(), "B");
    }

    #[test]
    fn test_capacity_bounds_visible_slots() {
        let (pool, items, _clicks) = pool(3);
        let table = EntityTable::new();
        let changed = table.reconcile(servers(&["A", "B", "C", "D", "E"]));

        assert_eq!(pool.render(&table, "{ID}", changed), 3);
        assert_eq!(visible(&items), vec![0, 1, 2]);
    }

    #[test]
    fn test_title_only_render_keeps_visibility() {
        let (pool, items, _clicks) = pool(4);
        let table = EntityTable::new();
        let changed = table.reconcile(servers(&["A", "B"]));
        pool.render(&table, "{ID}", changed);

        pool.render(&table, "{NAME}", false);
        assert_eq!(visible(&items), vec![0, 1]);
        assert_eq!(*items[1].title.lock(), "srv-B");
    }

    #[tokio::test]
    async fn test_clicks_funnel_into_one_listener() {
        let (pool, _items, mut clicks) = pool(3);
        assert!(!pool.click(3));
        assert!(pool.click(2));
        // pending click not consumed yet
        assert!(!pool.click(0));
        assert_eq!(clicks.recv().await, Some(2));
        assert!(pool.click(0));
        assert_eq!(clicks.recv().await, Some(0));
    }
}
