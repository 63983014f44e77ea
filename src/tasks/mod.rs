//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Sweep: Removes expired cache entries and finished rate-limit windows

mod cleanup;

pub use cleanup::spawn_cleanup_task;
