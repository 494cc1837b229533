//! Schedule domain - persistent interval schedules and their claim

mod entity;
mod repository;

pub use entity::{ScheduleMode, WorkflowScheduleRecord};
pub use repository::ScheduleRepository;

#[cfg(test)]
pub use repository::MockScheduleRepository;
