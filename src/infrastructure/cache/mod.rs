//! Cache infrastructure - moka-backed implementation of the cache port

mod in_memory;

pub use in_memory::InMemoryCache;
