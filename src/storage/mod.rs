mod items;
mod memory;
mod schema;
mod search;
mod sources;
mod store;
mod types;

pub use items::DEFAULT_PAGE_SIZE;
pub use memory::MemoryStore;
pub use schema::Database;
pub use search::MAX_SEARCH_QUERY_LENGTH;
pub use store::FeedStore;
pub use types::{
    never_updated, DatabaseError, Item, NewItem, Source, UpsertSummary,
    DEFAULT_REFRESH_INTERVAL_SECS, MAX_REFRESH_INTERVAL_SECS, NEVER_UPDATED_TIMESTAMP,
};
