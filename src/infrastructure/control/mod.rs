//! Control flag and cycle budget stores

mod in_memory;
mod postgres;

pub use in_memory::InMemoryControlRepository;
pub use postgres::PostgresControlRepository;
