//! Ratekeeper Common Types
//!
//! Shared types used across Ratekeeper: validated currency codes, ordered
//! currency pairs, look-back periods, provider snapshots and persisted rate
//! samples.

pub mod monetary;
pub mod period;
pub mod rates;
pub mod error;
pub mod time;

pub use monetary::*;
pub use period::*;
pub use rates::*;
pub use error::*;
pub use time::*;
