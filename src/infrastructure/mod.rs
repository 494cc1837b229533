//! Infrastructure layer - adapters, services and wiring helpers

pub mod cache;
pub mod control;
pub mod llm;
pub mod logging;
pub mod observability;
pub mod schedule;
pub mod services;
pub mod social;
pub mod storage;
pub mod workflow;
