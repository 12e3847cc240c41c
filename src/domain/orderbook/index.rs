/// Ordered index over one side of a market book
///
/// A `BTreeMap` from key to the entries sharing that key (FIFO within a key),
/// plus an identity map so deletion finds the right entry even when several
/// entries share a key. Scans visit keys in ascending order.

use super::traits::BookEntry;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap};
use std::ops::RangeBounds;

type Level<E> = SmallVec<[E; 4]>;

#[derive(Debug, Clone)]
pub struct OrderIndex<E: BookEntry> {
    levels: BTreeMap<E::Key, Level<E>>,
    locations: HashMap<E::Id, E::Key>,
}

impl<E: BookEntry> Default for OrderIndex<E> {
    fn default() -> Self {
        Self {
            levels: BTreeMap::new(),
            locations: HashMap::new(),
        }
    }
}

impl<E: BookEntry> OrderIndex<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`; returns `false` (and changes nothing) if an entry with
    /// the same identity is already present.
    pub fn insert(&mut self, entry: E) -> bool {
        if self.locations.contains_key(entry.entry_id()) {
            return false;
        }
        let key = entry.index_key();
        self.locations.insert(entry.entry_id().clone(), key);
        self.levels.entry(key).or_default().push(entry);
        true
    }

    /// Removes the entry with identity `id`, if present
    pub fn remove(&mut self, id: &E::Id) -> Option<E> {
        let key = self.locations.remove(id)?;
        let level = self.levels.get_mut(&key)?;
        let pos = level.iter().position(|e| e.entry_id() == id)?;
        let entry = level.remove(pos);
        if level.is_empty() {
            self.levels.remove(&key);
        }
        Some(entry)
    }

    pub fn get(&self, id: &E::Id) -> Option<&E> {
        let key = self.locations.get(id)?;
        self.levels.get(key)?.iter().find(|e| e.entry_id() == id)
    }

    pub fn contains(&self, id: &E::Id) -> bool {
        self.locations.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// All entries in ascending key order
    pub fn iter(&self) -> impl Iterator<Item = &E> + '_ {
        self.levels.values().flat_map(|level| level.iter())
    }

    /// Entries whose key falls in `range`, ascending
    pub fn range<R>(&self, range: R) -> impl Iterator<Item = &E> + '_
    where
        R: RangeBounds<E::Key>,
    {
        self.levels.range(range).flat_map(|(_, level)| level.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DriverOffer;
    use crate::domain::ids::{DriverId, OfferId};
    use crate::domain::values::{AvailabilityWindow, Price};
    use chrono::{TimeZone, Utc};

    fn offer(id: &str, cents: u64) -> DriverOffer {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        DriverOffer::new(
            OfferId::new(id),
            DriverId::new("d"),
            "PVG",
            "sedan",
            AvailabilityWindow::new(t, t),
            Price::from_cents(cents),
            4.5,
        )
    }

    fn ids<'a>(it: impl Iterator<Item = &'a DriverOffer>) -> Vec<&'a str> {
        it.map(|o| o.id.as_str()).collect()
    }

    #[test]
    fn test_iter_is_key_ordered_and_fifo_within_key() {
        let mut index = OrderIndex::new();
        index.insert(offer("c", 900));
        index.insert(offer("a", 800));
        index.insert(offer("b", 800));

        assert_eq!(ids(index.iter()), vec!["a", "b", "c"]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_duplicate_identity_is_rejected() {
        let mut index = OrderIndex::new();
        assert!(index.insert(offer("a", 800)));
        assert!(!index.insert(offer("a", 800)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_by_identity_with_shared_key() {
        let mut index = OrderIndex::new();
        index.insert(offer("a", 800));
        index.insert(offer("b", 800));
        index.insert(offer("c", 800));

        let removed = index.remove(&OfferId::new("b")).unwrap();
        assert_eq!(removed.id.as_str(), "b");
        assert_eq!(ids(index.iter()), vec!["a", "c"]);
        assert!(index.remove(&OfferId::new("b")).is_none());
    }

    #[test]
    fn test_remove_last_entry_drops_level() {
        let mut index = OrderIndex::new();
        index.insert(offer("a", 800));
        index.remove(&OfferId::new("a"));
        assert!(index.is_empty());
        assert_eq!(index.range(..).count(), 0);
    }

    #[test]
    fn test_range_scan() {
        let mut index = OrderIndex::new();
        for (id, cents) in [("a", 100), ("b", 200), ("c", 300), ("d", 400)] {
            index.insert(offer(id, cents));
        }
        assert_eq!(ids(index.range(200..=300)), vec!["b", "c"]);
        assert_eq!(ids(index.range(..=100)), vec!["a"]);
        assert_eq!(ids(index.range(350..)), vec!["d"]);
    }

    #[test]
    fn test_get() {
        let mut index = OrderIndex::new();
        index.insert(offer("a", 800));
        assert_eq!(index.get(&OfferId::new("a")).unwrap().price.cents(), 800);
        assert!(index.get(&OfferId::new("zz")).is_none());
        assert!(index.contains(&OfferId::new("a")));
    }
}
