//! Application services driving the engine

mod admin;
mod agent_batch;
pub mod clock;
mod scheduler;

pub use admin::AdminService;
pub use agent_batch::{AgentBatchProcessor, BatchPlan};
pub use clock::{Clock, FixedClock, SystemClock};
pub use scheduler::{IntervalScheduler, ScheduledRun, TickReport};
