//! Ratewatch Common Types
//!
//! Shared types for the rate tracker: currency codes, rate observations,
//! snapshots of the latest known rates and change events.

pub mod monetary;
pub mod event;
pub mod error;
pub mod time;

pub use monetary::*;
pub use event::*;
pub use error::*;
pub use time::*;
