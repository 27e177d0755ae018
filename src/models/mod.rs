//! Data models for the bot client.
//!
//! Wire-facing types keep the backend's field names through serde attributes.

mod dashboard;
mod flash;
mod setup;

pub use dashboard::*;
pub use flash::*;
pub use setup::*;
