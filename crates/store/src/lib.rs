pub mod db;
pub mod export;
pub mod feed;
pub mod file;
pub mod memory;
pub mod query;
pub mod schema;
pub mod sheet;
pub mod store;
pub mod write;

pub use feed::{Feed, FeedEvent, Subscription};
pub use store::{HistoryOrder, Store};
