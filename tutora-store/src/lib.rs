pub mod app_config;
pub mod customer_repo;
pub mod database;
pub mod events;
pub mod memory;
pub mod redis_repo;

pub use customer_repo::PgCustomerStore;
pub use database::DbClient;
pub use events::EventProducer;
pub use memory::MemoryCustomerStore;
pub use redis_repo::RedisClient;
