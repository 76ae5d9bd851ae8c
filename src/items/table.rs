//! In-memory item table.
//!
//! Holds the item → account bindings and each item's current state. Acts as
//! registry, state store and notification sink at once. When a state file is
//! configured, every published update is written through to disk while the
//! table is still locked, so the file always holds the latest snapshot.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use super::{ItemRegistry, ItemStateStore};
use crate::storage::{self, ItemStates};
use crate::types::{ItemLookupError, WatchedAccount};

#[derive(Debug, Clone)]
struct ItemEntry {
    account_id: String,
    state: Option<String>,
}

/// Item bindings and states shared between the scheduler and other writers.
#[derive(Debug, Default)]
pub struct ItemTable {
    items: RwLock<BTreeMap<String, ItemEntry>>,
    state_file: Option<PathBuf>,
}

type Entries = BTreeMap<String, ItemEntry>;

fn states_of(items: &Entries) -> ItemStates {
    items
        .iter()
        .filter_map(|(name, e)| e.state.clone().map(|s| (name.clone(), s)))
        .collect()
}

impl ItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table that persists published states to `path`.
    pub fn with_state_file(path: impl Into<PathBuf>) -> Self {
        Self {
            items: RwLock::default(),
            state_file: Some(path.into()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bind `item_name` to `account_id`. Rebinding keeps the current state.
    pub fn bind(&self, item_name: impl Into<String>, account_id: impl Into<String>) {
        let account_id = account_id.into();
        self.write()
            .entry(item_name.into())
            .and_modify(|e| e.account_id = account_id.clone())
            .or_insert(ItemEntry {
                account_id,
                state: None,
            });
    }

    /// Restore previously published states. Unknown items are skipped.
    pub fn restore(&self, states: ItemStates) {
        let mut items = self.write();
        let mut restored = 0usize;
        for (name, state) in states {
            if let Some(entry) = items.get_mut(&name) {
                entry.state = Some(state);
                restored += 1;
            }
        }
        info!(restored, "Item states restored");
    }

    /// Current states of all items that have one.
    pub fn snapshot(&self) -> ItemStates {
        states_of(&self.read())
    }
}

impl ItemRegistry for ItemTable {
    fn watched_items(&self) -> Vec<WatchedAccount> {
        self.read()
            .iter()
            .map(|(name, e)| WatchedAccount::new(name.clone(), e.account_id.clone()))
            .collect()
    }
}

impl ItemStateStore for ItemTable {
    fn get_current_state(&self, item_name: &str) -> Result<Option<String>, ItemLookupError> {
        self.read()
            .get(item_name)
            .map(|e| e.state.clone())
            .ok_or_else(|| ItemLookupError(item_name.to_string()))
    }

    fn post_update(&self, item_name: &str, new_state: &str) -> Result<(), ItemLookupError> {
        let mut items = self.write();
        let entry = items
            .get_mut(item_name)
            .ok_or_else(|| ItemLookupError(item_name.to_string()))?;
        entry.state = Some(new_state.to_string());
        info!(item = item_name, state = new_state, "Item updated");

        // Written under the guard: a concurrent update cannot land an older snapshot last.
        if let Some(path) = &self.state_file {
            if let Err(e) = storage::save_states(&states_of(&items), path) {
                warn!(error = %e, "Failed to persist item states");
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_state_file() -> PathBuf {
        std::env::temp_dir().join(format!("fio_test_table_{}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_bind_and_list_in_name_order() {
        let table = ItemTable::new();
        table.bind("Savings", "222");
        table.bind("Checking", "111");

        let items = table.watched_items();
        assert_eq!(
            items,
            vec![
                WatchedAccount::new("Checking", "111"),
                WatchedAccount::new("Savings", "222"),
            ]
        );
    }

    #[test]
    fn test_state_starts_absent() {
        let table = ItemTable::new();
        table.bind("Checking", "111");
        assert_eq!(table.get_current_state("Checking"), Ok(None));
    }

    #[test]
    fn test_post_update_sets_state() {
        let table = ItemTable::new();
        table.bind("Checking", "111");
        table.post_update("Checking", "100 CZK").unwrap();
        assert_eq!(
            table.get_current_state("Checking"),
            Ok(Some("100 CZK".to_string()))
        );
    }

    #[test]
    fn test_unknown_item_lookup_error() {
        let table = ItemTable::new();
        assert_eq!(
            table.get_current_state("Missing"),
            Err(ItemLookupError("Missing".into()))
        );
        assert!(table.post_update("Missing", "1 CZK").is_err());
    }

    #[test]
    fn test_rebind_keeps_state() {
        let table = ItemTable::new();
        table.bind("Checking", "111");
        table.post_update("Checking", "5 CZK").unwrap();
        table.bind("Checking", "333");

        assert_eq!(table.watched_items()[0].account_id, "333");
        assert_eq!(table.get_current_state("Checking"), Ok(Some("5 CZK".into())));
    }

    #[test]
    fn test_restore_skips_unknown_items() {
        let table = ItemTable::new();
        table.bind("Checking", "111");

        let mut states = ItemStates::new();
        states.insert("Checking".into(), "7 CZK".into());
        states.insert("Gone".into(), "8 CZK".into());
        table.restore(states);

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("Checking").map(String::as_str), Some("7 CZK"));
    }

    #[test]
    fn test_post_update_writes_state_file() {
        let path = temp_state_file();
        let table = ItemTable::with_state_file(&path);
        table.bind("Checking", "111");
        table.post_update("Checking", "1 000 CZK").unwrap();

        let loaded = storage::load_states(&path).unwrap().unwrap();
        assert_eq!(loaded.get("Checking").map(String::as_str), Some("1 000 CZK"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_concurrent_updates_leave_latest_snapshot_on_disk() {
        let path = temp_state_file();
        let table = Arc::new(ItemTable::with_state_file(&path));
        let names: Vec<String> = (0..8).map(|i| format!("Item{i}")).collect();
        for name in &names {
            table.bind(name.as_str(), "111");
        }

        let writers: Vec<_> = names
            .iter()
            .cloned()
            .map(|name| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || {
                    for round in 0..20 {
                        table.post_update(&name, &format!("{round} CZK")).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let on_disk = storage::load_states(&path).unwrap().unwrap();
        assert_eq!(on_disk, table.snapshot());
        assert_eq!(on_disk.len(), names.len());
        assert!(on_disk.values().all(|s| s == "19 CZK"));

        std::fs::remove_file(&path).unwrap();
    }
}
