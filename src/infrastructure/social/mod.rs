//! In-process social data: store, action tools and side effects

mod actions;
mod effects;
mod in_memory;

pub use actions::{store_actions, StoreActionTool};
pub use effects::{ExperienceEffect, NotificationEffect};
pub use in_memory::{InMemorySocialStore, Notification, PerformedAction, SocialFixture};
