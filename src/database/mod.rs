pub mod memory_store;
pub mod postgres_service;
pub mod redis_manager;
pub mod security_store;
pub mod session_store;

pub use memory_store::MemoryStore;
pub use postgres_service::PostgresStore;
pub use redis_manager::RedisService;
pub use security_store::{EventQuery, FailedLogin, SecurityStore, StoreError};
pub use session_store::{SessionRecord, SessionStore, TokenKind};
