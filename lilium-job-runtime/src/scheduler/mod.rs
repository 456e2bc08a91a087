mod builder;
mod fire_loop;
mod scheduler;

pub use builder::SchedulerBuilder;
pub use scheduler::{Scheduler, SchedulerState};
