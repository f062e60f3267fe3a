//! Optimistic acknowledgements: apply locally, confirm with the server,
//! roll back exactly what was flipped if the server rejects it.

use std::collections::HashMap;

use crate::store::FeedStore;

/// What the user asked to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckScope {
    One(String),
    All,
}

/// A local mutation awaiting server confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TentativeAck {
    pub scope: AckScope,
    flipped: Vec<String>,
}

impl TentativeAck {
    /// Ids whose flag went from unread to read in the local phase.
    pub fn flipped(&self) -> &[String] {
        &self.flipped
    }

    /// Nothing changed locally.
    pub fn is_noop(&self) -> bool {
        self.flipped.is_empty()
    }
}

impl FeedStore {
    /// Phase one: apply the acknowledgement locally.
    pub fn acknowledge(&mut self, scope: AckScope) -> TentativeAck {
        let flipped = match &scope {
            AckScope::One(id) => {
                if self.mark_read(id) {
                    vec![id.clone()]
                } else {
                    Vec::new()
                }
            }
            AckScope::All => {
                let ids = self.unread_ids();
                self.mark_all_read();
                ids
            }
        };
        TentativeAck { scope, flipped }
    }

    /// Undo a rejected acknowledgement. Only ids still present and still
    /// acknowledged are restored. Returns how many were restored.
    pub fn rollback(&mut self, ack: &TentativeAck) -> usize {
        ack.flipped
            .iter()
            .filter(|id| self.set_acknowledged(id, false))
            .count()
    }

    /// Re-apply a pending acknowledgement after a snapshot replaced the items.
    pub fn reapply(&mut self, ack: &TentativeAck) {
        for id in &ack.flipped {
            self.set_acknowledged(id, true);
        }
    }
}

/// Acknowledgements sent to the server and not yet settled.
#[derive(Debug, Default)]
pub struct PendingAcks {
    next_id: u64,
    pending: HashMap<u64, TentativeAck>,
}

impl PendingAcks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `ack`; the returned id comes back with the server's answer.
    pub fn register(&mut self, ack: TentativeAck) -> u64 {
        self.next_id += 1;
        self.pending.insert(self.next_id, ack);
        self.next_id
    }

    pub fn take(&mut self, id: u64) -> Option<TentativeAck> {
        self.pending.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TentativeAck> {
        self.pending.values()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedlink_core::types::{FeedItem, FeedLevel, FeedSnapshot};

    fn store_with(ids: &[(&str, bool)]) -> FeedStore {
        let items = ids
            .iter()
            .map(|(id, ack)| {
                let item = FeedItem::new(id, "t", "b", FeedLevel::High);
                if *ack { item.acknowledged() } else { item }
            })
            .collect();
        let mut store = FeedStore::new();
        store.load_snapshot(FeedSnapshot::from_items(items));
        store
    }

    #[test]
    fn test_rollback_single() {
        let mut store = store_with(&[("a", false), ("b", false)]);
        let ack = store.acknowledge(AckScope::One("a".into()));
        assert_eq!(ack.flipped(), ["a".to_string()]);
        assert_eq!(store.unread_count(), 1);

        assert_eq!(store.rollback(&ack), 1);
        assert!(!store.get("a").unwrap().acknowledged);
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn test_rollback_all_restores_only_flipped() {
        let mut store = store_with(&[("a", false), ("b", true), ("c", false)]);
        let ack = store.acknowledge(AckScope::All);
        assert_eq!(ack.flipped().len(), 2);
        assert_eq!(store.unread_count(), 0);

        store.rollback(&ack);
        assert!(store.get("b").unwrap().acknowledged);
        assert_eq!(store.unread_count(), 2);
    }

    #[test]
    fn test_already_read_is_noop() {
        let mut store = store_with(&[("a", true)]);
        let ack = store.acknowledge(AckScope::One("a".into()));
        assert!(ack.is_noop());
        assert_eq!(store.rollback(&ack), 0);
        assert!(store.get("a").unwrap().acknowledged);
    }

    #[test]
    fn test_rollback_skips_vanished_items() {
        let mut store = store_with(&[("a", false)]);
        let ack = store.acknowledge(AckScope::One("a".into()));
        store.load_snapshot(FeedSnapshot::empty());
        assert_eq!(store.rollback(&ack), 0);
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_pending_registry() {
        let mut store = store_with(&[("a", false)]);
        let mut pending = PendingAcks::new();
        let id = pending.register(store.acknowledge(AckScope::One("a".into())));
        assert_eq!(pending.len(), 1);

        // a poll replaced the items before the server answered
        store.load_snapshot(FeedSnapshot::from_items(vec![FeedItem::new("a", "t", "b", FeedLevel::Low)]));
        for ack in pending.iter() {
            store.reapply(ack);
        }
        assert_eq!(store.unread_count(), 0);

        assert!(pending.take(id).is_some());
        assert!(pending.take(id).is_none());
        assert!(pending.is_empty());
    }
}
