//! Relational storage plumbing

mod postgres;

pub use postgres::PostgresConfig;
pub(crate) use postgres::{from_bigint, to_bigint};
