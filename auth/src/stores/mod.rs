//! Session store implementations.

pub mod session_memory;
pub mod session_redis;

pub use session_memory::InMemorySessionStore;
pub use session_redis::RedisSessionStore;
