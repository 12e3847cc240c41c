/// Book Registry - one lock per market key
///
/// Maps each (airport, vehicle type) to its [`MarketBook`] behind its own
/// `RwLock`. Two markets never contend: the outer map lock is held only long
/// enough to look up or create the entry, never while a book is being read or
/// mutated.
///
/// Matching decisions take the book's write lock for the whole
/// insert → scan → rank → claim sequence. The read lock is for diagnostics
/// only.

use crate::domain::orderbook::{BookDepth, MarketBook};
use crate::domain::values::MarketKey;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub type SharedBook = Arc<RwLock<MarketBook>>;

/// Depth of one market, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketDepth {
    pub airport_code: String,
    pub vehicle_type: String,
    #[serde(flatten)]
    pub depth: BookDepth,
}

#[derive(Debug, Default)]
pub struct BookRegistry {
    books: RwLock<HashMap<MarketKey, SharedBook>>,
}

impl BookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Book for `key`, created empty on first use
    pub fn book(&self, key: &MarketKey) -> SharedBook {
        if let Some(book) = self.books.read().get(key) {
            return Arc::clone(book);
        }
        let mut books = self.books.write();
        Arc::clone(
            books
                .entry(key.clone())
                .or_insert_with(|| Arc::new(RwLock::new(MarketBook::new(key.clone())))),
        )
    }

    /// Book for `key` if one was ever created
    pub fn existing(&self, key: &MarketKey) -> Option<SharedBook> {
        self.books.read().get(key).cloned()
    }

    pub fn market_count(&self) -> usize {
        self.books.read().len()
    }

    /// Depth of every known market, sorted by key
    pub fn snapshot(&self) -> Vec<MarketDepth> {
        let books: Vec<SharedBook> = self.books.read().values().cloned().collect();
        let mut depths: Vec<MarketDepth> = books
            .iter()
            .map(|book| {
                let book = book.read();
                MarketDepth {
                    airport_code: book.key().airport_code.clone(),
                    vehicle_type: book.key().vehicle_type.clone(),
                    depth: book.depth(),
                }
            })
            .collect();
        depths.sort_by(|a, b| {
            (&a.airport_code, &a.vehicle_type).cmp(&(&b.airport_code, &b.vehicle_type))
        });
        depths
    }
}
