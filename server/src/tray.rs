//! Console stand-in for the tray menu

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use cloudtray_core::TrayItem;

#[derive(Debug, Default)]
struct SlotState {
    title: String,
    visible: bool,
}

/// One menu entry; title and visibility changes are logged
#[derive(Debug)]
pub struct ConsoleItem {
    index: usize,
    state: Mutex<SlotState>,
}

impl ConsoleItem {
    fn new(index: usize) -> Self {
        Self {
            index,
            state: Mutex::new(SlotState::default()),
        }
    }
}

impl TrayItem for ConsoleItem {
    fn set_title(&self, title: &str) {
        let mut state = self.state.lock();
        if state.title != title {
            if state.visible {
                debug!(slot = self.index, title, "Slot updated");
            }
            state.title = title.to_string();
        }
    }

    fn show(&self) {
        let mut state = self.state.lock();
        if !state.visible {
            debug!(slot = self.index, title = %state.title, "Slot shown");
            state.visible = true;
        }
    }

    fn hide(&self) {
        let mut state = self.state.lock();
        if state.visible {
            debug!(slot = self.index, "Slot hidden");
            state.visible = false;
        }
    }
}

/// Fixed list of console menu entries
pub struct ConsoleTray {
    items: Vec<Arc<ConsoleItem>>,
}

impl ConsoleTray {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: (0..capacity)
                .map(|index| Arc::new(ConsoleItem::new(index)))
                .collect(),
        }
    }

    /// Entries for [`cloudtray_core::DisplaySlotPool::new`]
    pub fn items(&self) -> Vec<Arc<dyn TrayItem>> {
        self.items
            .iter()
            .map(|item| item.clone() as Arc<dyn TrayItem>)
            .collect()
    }

    /// Visible entries in index order
    pub fn visible(&self) -> Vec<(usize, String)> {
        self.items
            .iter()
            .filter_map(|item| {
                let state = item.state.lock();
                state.visible.then(|| (item.index, state.title.clone()))
            })
            .collect()
    }
}
