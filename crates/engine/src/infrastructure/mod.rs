//! Infrastructure implementations.
//!
//! Contains port trait definitions and their SQLite, clock and metrics
//! adapters, plus environment configuration.

pub mod clock;
pub mod config;
pub mod metrics;
pub mod ports;
pub mod sqlite;
