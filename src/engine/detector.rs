//! Change detection against the item state store.
//!
//! A resolved balance is published only when it differs from what the store
//! currently holds for the item. The store is re-read on every call; nothing
//! is cached here because other writers may change item state between cycles.

use std::sync::Arc;
use tracing::debug;

use crate::items::ItemStateStore;
use crate::types::ItemLookupError;

pub struct ChangeDetector {
    store: Arc<dyn ItemStateStore>,
}

impl ChangeDetector {
    pub fn new(store: Arc<dyn ItemStateStore>) -> Self {
        Self { store }
    }

    /// True iff `new_value` is non-empty and differs from the recorded state.
    pub fn should_emit(&self, item_name: &str, new_value: &str) -> Result<bool, ItemLookupError> {
        if new_value.is_empty() {
            return Ok(false);
        }
        let current = self.store.get_current_state(item_name)?;
        Ok(current.as_deref() != Some(new_value))
    }

    /// Publish `new_value` for `item_name` if it changed. Returns whether an
    /// update was posted.
    pub fn publish_if_changed(
        &self,
        item_name: &str,
        new_value: &str,
    ) -> Result<bool, ItemLookupError> {
        if !self.should_emit(item_name, new_value)? {
            debug!(item = item_name, value = new_value, "Balance unchanged");
            return Ok(false);
        }
        self.store.post_update(item_name, new_value)?;
        Ok(true)
    }
}
