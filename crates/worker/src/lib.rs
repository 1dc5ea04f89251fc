//! Worker process building blocks: the claim-execute-report runner,
//! the stuck-job reaper, and the retention sweeper.
//!
//! The binary in `main.rs` runs the maintenance loops; applications
//! that execute generation payloads embed [`runner::Runner`] with their
//! own [`handler::JobHandler`] implementation.

pub mod config;
pub mod handler;
pub mod reaper;
pub mod runner;
