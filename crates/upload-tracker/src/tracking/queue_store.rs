//! Queue store: membership, status and progress of every tracked document

use std::collections::HashMap;

use crate::types::{QueueItem, UploadStatus};

/// Keyed store of tracked uploads
#[derive(Debug, Default)]
pub struct QueueStore {
    items: HashMap<String, QueueItem>,
}

impl QueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an item under its key.
    ///
    /// Replacing an item whose status is terminal with a non-error status is
    /// rejected; returns whether the item was stored.
    pub fn upsert(&mut self, item: QueueItem) -> bool {
        if let Some(existing) = self.items.get(&item.key) {
            if !existing.status.can_transition_to(item.status) {
                tracing::debug!(
                    "Rejected stale update for {}: {} -> {}",
                    item.key,
                    existing.status,
                    item.status
                );
                return false;
            }
        }
        self.items.insert(item.key.clone(), item);
        true
    }

    /// Change the status of an existing item under the transition guard
    pub fn set_status(&mut self, key: &str, status: UploadStatus) -> bool {
        match self.items.get_mut(key) {
            Some(item) if item.status.can_transition_to(status) => {
                item.status = status;
                true
            }
            Some(item) => {
                tracing::debug!(
                    "Rejected status change for {}: {} -> {}",
                    key,
                    item.status,
                    status
                );
                false
            }
            None => false,
        }
    }

    /// Mutate an item in place. Status changes must go through `set_status`.
    pub fn update<F>(&mut self, key: &str, f: F) -> bool
    where
        F: FnOnce(&mut QueueItem),
    {
        match self.items.get_mut(key) {
            Some(item) => {
                let status = item.status;
                f(item);
                item.status = status;
                true
            }
            None => false,
        }
    }

    /// Move an item to a new key (filename -> document id)
    pub fn rekey(&mut self, old_key: &str, new_key: &str) -> bool {
        if old_key == new_key {
            return self.items.contains_key(old_key);
        }
        match self.items.remove(old_key) {
            Some(mut item) => {
                item.key = new_key.to_string();
                self.items.insert(new_key.to_string(), item);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<QueueItem> {
        self.items.remove(key)
    }

    pub fn find(&self, key: &str) -> Option<&QueueItem> {
        self.items.get(key)
    }

    /// Find the item for a file name, whether or not it has been re-keyed
    pub fn find_by_file_name(&self, file_name: &str) -> Option<&QueueItem> {
        self.items.get(file_name).or_else(|| {
            self.items
                .values()
                .filter(|item| item.file_name == file_name)
                .min_by_key(|item| item.start_time)
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// All items, oldest first
    pub fn list_all(&self) -> Vec<QueueItem> {
        let mut items: Vec<QueueItem> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.key.cmp(&b.key)));
        items
    }

    /// Oldest item that is processing with an assigned document id
    pub fn oldest_processing(&self) -> Option<&QueueItem> {
        self.items
            .values()
            .filter(|item| item.status == UploadStatus::Processing && item.document_id.is_some())
            .min_by(|a, b| a.start_time.cmp(&b.start_time).then_with(|| a.key.cmp(&b.key)))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}
