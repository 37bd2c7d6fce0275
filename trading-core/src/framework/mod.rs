pub mod event_bus;
pub mod readiness;
pub mod scheduler;
pub mod stop;

pub use event_bus::{BotEvent, EventBus};
pub use readiness::Readiness;
pub use scheduler::{DecisionCycle, SchedulerKey, SchedulerTrigger, TaskScheduler};
pub use stop::StopSignal;
