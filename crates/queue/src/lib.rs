//! Background maintenance for civicdesk.
//!
//! - **Scheduler**: periodic verification session sweep and read
//!   notification cleanup, driven by tokio intervals.

pub mod scheduler;

pub use scheduler::{
    MaintenanceExecutor, MaintenanceJob, SchedulerConfig, SchedulerHandle, ServiceExecutor,
    run_job, run_scheduler,
};
