//! Tracked order store adapters.

mod in_memory;
mod redis_store;

pub use in_memory::InMemoryOrderStore;
pub use redis_store::RedisOrderStore;
