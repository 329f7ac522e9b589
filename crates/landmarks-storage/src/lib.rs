pub mod hot_cache;
pub mod queue;
pub mod store;
pub mod traits;

pub use hot_cache::{HotCache, HotCacheStats, HotCacheStatsSnapshot};
pub use queue::{consumer_name, ClaimedMessage, RedisQueue};
pub use store::PostgresStore;
pub use traits::{Queue, Store};
