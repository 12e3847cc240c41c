/// BookEntry Trait - what an order book needs to know about its entries
///
/// Both sides of a market book are the same ordered container, parameterised
/// by the entry type:
/// - requests are keyed by desired time (epoch milliseconds)
/// - offers are keyed by price (integer cents)
///
/// Several entries may share a key, so every entry also carries an identity
/// used for deletion.

use crate::domain::entities::{DriverOffer, PickupRequest};
use crate::domain::ids::{OfferId, RequestId};
use std::fmt::{Debug, Display};
use std::hash::Hash;

pub trait BookEntry: Clone + Debug {
    type Key: Ord + Copy + Debug;
    type Id: Eq + Hash + Clone + Display + Debug;

    /// Ordering key within the index
    fn index_key(&self) -> Self::Key;

    fn entry_id(&self) -> &Self::Id;
}

impl BookEntry for PickupRequest {
    type Key = i64;
    type Id = RequestId;

    #[inline]
    fn index_key(&self) -> i64 {
        self.desired_time.timestamp_millis()
    }

    #[inline]
    fn entry_id(&self) -> &RequestId {
        &self.id
    }
}

impl BookEntry for DriverOffer {
    type Key = u64;
    type Id = OfferId;

    #[inline]
    fn index_key(&self) -> u64 {
        self.price.cents()
    }

    #[inline]
    fn entry_id(&self) -> &OfferId {
        &self.id
    }
}
