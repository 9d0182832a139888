//! Submission lifecycle engine for the campaign submission service.
//!
//! Commands, reconciliation workers, and the outbox relay live under
//! [`workflows::submissions`]; configuration, telemetry, and the top-level error type are shared
//! with the API binary.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
