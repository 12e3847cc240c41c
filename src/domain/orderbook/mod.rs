/// Domain Layer - OrderBook Module
///
/// In-memory order books, one [`MarketBook`] per (airport, vehicle type).
///
/// - `traits`: [`BookEntry`], how requests and offers are keyed
/// - `index`: [`OrderIndex`], a multi-entry ordered index with identity removal
/// - `market_book`: the request/offer pair of one market plus claiming

pub mod index;
pub mod market_book;
pub mod traits;

pub use index::OrderIndex;
pub use market_book::{Admission, BookDepth, Candidates, ClaimedPair, MarketBook, DEFAULT_TOMBSTONE_CAPACITY};
pub use traits::BookEntry;
