//! User-facing flows: setup, dashboard and secret rotation.
//!
//! Flows catch transport failures at their boundary and turn them into flash
//! messages or dedicated views; they only return `Err` for local preconditions.

mod dashboard;
mod rotation;
mod setup;

pub use dashboard::*;
pub use rotation::*;
pub use setup::*;
