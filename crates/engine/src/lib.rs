//! Chronicle Engine library.
//!
//! Keeps a persistent fantasy-world clock running alongside real time and
//! drives everything that depends on it.
//!
//! ## Structure
//!
//! - `use_cases/` - Clock service, event scheduler, calendar service, cooldown tracker
//! - `infrastructure/` - Ports, SQLite adapters, configuration
//! - `workers` - Background task runner
//! - `app` - Application composition

pub mod app;
pub mod infrastructure;
pub mod use_cases;
pub mod workers;

pub use app::App;
