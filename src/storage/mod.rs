//! Durable item store: a JSON map from normalized guid to [`ItemRecord`].

mod store;
mod types;

pub use store::Store;
pub use types::{Enclosure, ItemRecord, ParsedItem, StoreError, UpsertStats};
