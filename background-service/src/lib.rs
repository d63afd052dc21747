pub mod activity;
pub mod ports;
pub mod scheduler;
pub mod settings;

pub use activity::{ActivityLog, AnalyticsExport};
pub use ports::{ContentSource, RedditActions};
pub use scheduler::{
    ActionScheduler, AutomationContext, AutomationScheduler, AutomationStatus, SchedulerState,
    SkipReason, TickOutcome,
};
