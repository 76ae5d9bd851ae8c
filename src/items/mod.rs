//! Watched-item registry and item state store.
//!
//! The core only reads the registry and reads/writes item state through
//! these traits. `ItemTable` is the in-process implementation used by the
//! binary and the tests.

pub mod table;

pub use table::ItemTable;

use crate::types::{ItemLookupError, WatchedAccount};

/// Read-only view of the items bound to bank accounts.
pub trait ItemRegistry: Send + Sync {
    /// All `(item, account)` bindings, in a stable order.
    fn watched_items(&self) -> Vec<WatchedAccount>;
}

/// Authoritative store of each item's current state, and the notification
/// sink that receives balance updates.
#[cfg_attr(test, mockall::automock)]
pub trait ItemStateStore: Send + Sync {
    /// Current state of `item_name`, `None` if it was never set.
    fn get_current_state(&self, item_name: &str) -> Result<Option<String>, ItemLookupError>;

    /// Publish a new state for `item_name`.
    fn post_update(&self, item_name: &str, new_state: &str) -> Result<(), ItemLookupError>;
}
