//! Anchor cache refresh: on-demand (`RefreshService`) and periodic
//! (`RefreshScheduler`) re-encoding of a tenant's active boundaries.

pub mod scheduler;
pub mod service;

pub use scheduler::{RefreshScheduler, SchedulerConfig};
pub use service::{RefreshService, RefreshStats};
