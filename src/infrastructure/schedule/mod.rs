//! Schedule record stores

mod in_memory;
mod postgres;

pub use in_memory::InMemoryScheduleRepository;
pub use postgres::PostgresScheduleRepository;
