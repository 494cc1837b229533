//! Control domain - scheduler/agent switches, pause window and cycle budget

mod entity;
mod repository;

pub use entity::{ControlState, CycleBudget};
pub use repository::ControlRepository;

#[cfg(test)]
pub use repository::MockControlRepository;
