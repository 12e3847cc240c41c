//! In-process sorted-set mirror
//!
//! Models the remote cache as named sorted sets, one per market and side,
//! keyed `orderbook:{side}:{airport}:{vehicle}`. Members are entity ids
//! scored by the index key and carry the serialized entity. Nothing in the
//! matching path reads it back.

use crate::application::error::MirrorError;
use crate::application::ports::{BookMirror, BookSide};
use crate::domain::values::MarketKey;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
struct Member {
    score: f64,
    payload: String,
}

#[derive(Debug, Default)]
pub struct InMemorySortedSetMirror {
    sets: Mutex<HashMap<String, HashMap<String, Member>>>,
}

impl InMemorySortedSetMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(market: &MarketKey, side: BookSide) -> String {
        format!("orderbook:{}:{}:{}", side, market.airport_code, market.vehicle_type)
    }

    pub fn len(&self, market: &MarketKey, side: BookSide) -> usize {
        self.sets
            .lock()
            .get(&Self::set_name(market, side))
            .map_or(0, HashMap::len)
    }

    /// Member ids ordered by score, ties by id
    pub fn members(&self, market: &MarketKey, side: BookSide) -> Vec<String> {
        let sets = self.sets.lock();
        let Some(set) = sets.get(&Self::set_name(market, side)) else {
            return Vec::new();
        };
        let mut members: Vec<(&String, f64)> = set.iter().map(|(id, m)| (id, m.score)).collect();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        members.into_iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn payload(&self, market: &MarketKey, side: BookSide, entity_id: &str) -> Option<String> {
        self.sets
            .lock()
            .get(&Self::set_name(market, side))
            .and_then(|set| set.get(entity_id))
            .map(|m| m.payload.clone())
    }
}

#[async_trait]
impl BookMirror for InMemorySortedSetMirror {
    async fn add(
        &self,
        market: &MarketKey,
        side: BookSide,
        entity_id: &str,
        sort_key: f64,
        payload: String,
    ) -> Result<(), MirrorError> {
        self.sets
            .lock()
            .entry(Self::set_name(market, side))
            .or_default()
            .insert(entity_id.to_owned(), Member { score: sort_key, payload });
        Ok(())
    }

    async fn remove(&self, market: &MarketKey, side: BookSide, entity_id: &str) -> Result<(), MirrorError> {
        let mut sets = self.sets.lock();
        let name = Self::set_name(market, side);
        if let Some(set) = sets.get_mut(&name) {
            set.remove(entity_id);
            if set.is_empty() {
                sets.remove(&name);
            }
        }
        Ok(())
    }
}

/// Mirror that discards everything (`--no-mirror`)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMirror;

#[async_trait]
impl BookMirror for NoopMirror {
    async fn add(&self, _: &MarketKey, _: BookSide, _: &str, _: f64, _: String) -> Result<(), MirrorError> {
        Ok(())
    }

    async fn remove(&self, _: &MarketKey, _: BookSide, _: &str) -> Result<(), MirrorError> {
        Ok(())
    }
}
