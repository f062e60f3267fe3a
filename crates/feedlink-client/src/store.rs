//! Feed state store — de-duplicated items (newest first) plus an unread counter.
//!
//! Every operation is synchronous and total. The counter is adjusted in the
//! same call that flips a flag, so `unread_count()` always equals the number
//! of stored items with `acknowledged == false`.

use std::collections::VecDeque;

use feedlink_core::types::{FeedItem, FeedSnapshot};

/// Outcome of upserting one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone)]
pub struct FeedStore {
    items: VecDeque<FeedItem>,
    unread: usize,
    total: u64,
    max_items: usize,
}

impl FeedStore {
    /// Store with the default cap of 200 items.
    pub fn new() -> Self {
        Self::with_max_items(200)
    }

    /// Store keeping at most `max_items` (oldest dropped first). 0 = unbounded.
    pub fn with_max_items(max_items: usize) -> Self {
        Self {
            items: VecDeque::new(),
            unread: 0,
            total: 0,
            max_items,
        }
    }

    /// Replace the contents with `snapshot`; the counter is recomputed from
    /// the items, the backend's own count is not trusted.
    pub fn load_snapshot(&mut self, snapshot: FeedSnapshot) {
        self.items.clear();
        for item in snapshot.items {
            match self.position(&item.id) {
                Some(idx) => self.items[idx] = item,
                None => self.items.push_back(item),
            }
        }
        self.unread = self.items.iter().filter(|i| !i.acknowledged).count();
        self.total = snapshot.total.max(self.items.len() as u64);
        self.enforce_cap();
    }

    /// Upsert every snapshot item. New items are prepended keeping the
    /// snapshot's order; known ids are overwritten in place.
    pub fn merge_snapshot(&mut self, snapshot: FeedSnapshot) {
        let mut fresh = Vec::new();
        for item in snapshot.items {
            if self.position(&item.id).is_some() {
                self.upsert(item);
            } else if let Some(dup) = fresh.iter_mut().find(|f: &&mut FeedItem| f.id == item.id) {
                *dup = item;
            } else {
                fresh.push(item);
            }
        }
        for item in fresh.into_iter().rev() {
            self.upsert(item);
        }
        self.total = self.total.max(snapshot.total).max(self.items.len() as u64);
    }

    /// Upsert one pushed item by id; new items go to the front and count
    /// towards the backend total.
    pub fn merge_incoming(&mut self, item: FeedItem) -> MergeOutcome {
        let outcome = self.upsert(item);
        if outcome == MergeOutcome::Inserted {
            self.total += 1;
        }
        outcome
    }

    fn upsert(&mut self, item: FeedItem) -> MergeOutcome {
        match self.position(&item.id) {
            Some(idx) => {
                let was_unread = !self.items[idx].acknowledged;
                let now_unread = !item.acknowledged;
                self.items[idx] = item;
                self.apply_delta(was_unread, now_unread);
                MergeOutcome::Updated
            }
            None => {
                if !item.acknowledged {
                    self.unread += 1;
                }
                self.items.push_front(item);
                self.enforce_cap();
                MergeOutcome::Inserted
            }
        }
    }

    /// Mark one item read. Returns whether anything changed.
    pub fn mark_read(&mut self, id: &str) -> bool {
        self.set_acknowledged(id, true)
    }

    /// Mark every item read. Returns how many flipped.
    pub fn mark_all_read(&mut self) -> usize {
        let mut flipped = 0;
        for item in self.items.iter_mut().filter(|i| !i.acknowledged) {
            item.acknowledged = true;
            flipped += 1;
        }
        self.unread = 0;
        flipped
    }

    /// Set the flag on one item, keeping the counter in step.
    /// Returns `false` when the id is unknown or the flag already had that value.
    pub fn set_acknowledged(&mut self, id: &str, acknowledged: bool) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let item = &mut self.items[idx];
        if item.acknowledged == acknowledged {
            return false;
        }
        item.acknowledged = acknowledged;
        self.apply_delta(acknowledged, !acknowledged);
        true
    }

    /// Ids of items not yet acknowledged, in display order.
    pub fn unread_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| !i.acknowledged)
            .map(|i| i.id.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&FeedItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Items in display order (newest first).
    pub fn items(&self) -> impl Iterator<Item = &FeedItem> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<FeedItem> {
        self.items.iter().cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.unread
    }

    /// Backend-reported total (at least the number of stored items).
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    fn apply_delta(&mut self, was_unread: bool, now_unread: bool) {
        match (was_unread, now_unread) {
            (true, false) => self.unread = self.unread.saturating_sub(1),
            (false, true) => self.unread += 1,
            _ => {}
        }
    }

    fn enforce_cap(&mut self) {
        if self.max_items == 0 {
            return;
        }
        while self.items.len() > self.max_items {
            if let Some(dropped) = self.items.pop_back() {
                if !dropped.acknowledged {
                    self.unread = self.unread.saturating_sub(1);
                }
            }
        }
    }
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlink_core::types::FeedLevel;

    fn item(id: &str) -> FeedItem {
        FeedItem::new(id, &format!("title {id}"), "body", FeedLevel::Low)
    }

    fn assert_counter(store: &FeedStore) {
        let actual = store.items().filter(|i| !i.acknowledged).count();
        assert_eq!(store.unread_count(), actual, "counter out of sync");
        let mut ids: Vec<_> = store.items().map(|i| i.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), store.len(), "duplicate ids in store");
    }

    #[test]
    fn test_counter_tracks_every_merge() {
        let mut store = FeedStore::new();
        let sequence = vec![
            item("a"),
            item("b"),
            item("a").acknowledged(),
            item("c").acknowledged(),
            item("c"),
            item("b").acknowledged(),
            item("d"),
            item("a"),
        ];
        for it in sequence {
            store.merge_incoming(it);
            assert_counter(&store);
        }
        assert_eq!(store.len(), 4);
        assert_eq!(store.unread_count(), 3);
    }

    #[test]
    fn test_new_items_prepended_updates_in_place() {
        let mut store = FeedStore::new();
        store.merge_incoming(item("a"));
        store.merge_incoming(item("b"));
        assert_eq!(store.merge_incoming(item("a").acknowledged()), MergeOutcome::Updated);

        let order: Vec<_> = store.items().map(|i| i.id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
        assert!(store.get("a").unwrap().acknowledged);
    }

    #[test]
    fn test_mark_read_idempotent() {
        let mut store = FeedStore::new();
        store.merge_incoming(item("a"));
        store.merge_incoming(item("b"));

        assert!(store.mark_read("a"));
        let once = store.to_vec();
        let once_count = store.unread_count();

        assert!(!store.mark_read("a"));
        assert_eq!(store.to_vec(), once);
        assert_eq!(store.unread_count(), once_count);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_mark_read_unknown_id_is_noop() {
        let mut store = FeedStore::new();
        store.merge_incoming(item("a"));
        assert!(!store.mark_read("missing"));
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_mark_all_read() {
        let mut store = FeedStore::new();
        store.merge_incoming(item("a"));
        store.merge_incoming(item("b").acknowledged());
        store.merge_incoming(item("c"));
        assert_eq!(store.mark_all_read(), 2);
        assert_eq!(store.unread_count(), 0);
        assert!(store.items().all(|i| i.acknowledged));
        assert_counter(&store);
    }

    #[test]
    fn test_load_snapshot_idempotent() {
        let snapshot = FeedSnapshot {
            items: vec![item("a"), item("b").acknowledged(), item("c")],
            unacknowledged_count: 99,
            total: 10,
        };
        let mut store = FeedStore::new();
        store.load_snapshot(snapshot.clone());
        let first = store.to_vec();
        assert_eq!(store.unread_count(), 2);

        store.load_snapshot(snapshot);
        assert_eq!(store.to_vec(), first);
        assert_eq!(store.unread_count(), 2);
        assert_eq!(store.total(), 10);
    }

    #[test]
    fn test_load_snapshot_collapses_repeated_ids() {
        let mut store = FeedStore::new();
        store.load_snapshot(FeedSnapshot::from_items(vec![
            item("a"),
            item("b"),
            item("a").acknowledged(),
        ]));
        assert_eq!(store.len(), 2);
        assert!(store.get("a").unwrap().acknowledged);
        assert_counter(&store);
    }

    #[test]
    fn test_merge_snapshot_keeps_order() {
        let mut store = FeedStore::new();
        store.merge_incoming(item("old"));
        store.merge_incoming(item("live"));

        store.merge_snapshot(FeedSnapshot::from_items(vec![
            item("n1"),
            item("n2"),
            item("old").acknowledged(),
        ]));
        let order: Vec<_> = store.items().map(|i| i.id.as_str()).collect();
        assert_eq!(order, vec!["n1", "n2", "live", "old"]);
        assert_eq!(store.unread_count(), 3);
        assert_counter(&store);
    }

    #[test]
    fn test_total_counts_only_pushed_items() {
        let mut store = FeedStore::new();
        let mut first = FeedSnapshot::from_items(vec![item("a"), item("b")]);
        first.total = 57;
        store.load_snapshot(first);
        assert_eq!(store.total(), 57);

        // the backend already counts "c" in its own total
        let mut reconcile = FeedSnapshot::from_items(vec![item("c"), item("a"), item("b")]);
        reconcile.total = 58;
        store.merge_snapshot(reconcile);
        assert_eq!(store.total(), 58);

        store.merge_incoming(item("pushed"));
        assert_eq!(store.total(), 59);
        store.merge_incoming(item("pushed").acknowledged());
        assert_eq!(store.total(), 59);
    }

    #[test]
    fn test_cap_drops_oldest_and_adjusts_counter() {
        let mut store = FeedStore::with_max_items(2);
        store.merge_incoming(item("a"));
        store.merge_incoming(item("b"));
        store.merge_incoming(item("c"));
        assert_eq!(store.len(), 2);
        assert!(!store.contains("a"));
        assert_eq!(store.unread_count(), 2);
        assert_counter(&store);
    }
}
