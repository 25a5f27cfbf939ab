#![forbid(unsafe_code)]

//! Bitrate adaptation for one connection.
//!
//! [`BitrateController`] turns a quality score and the current metrics into a
//! new target bitrate inside a `[min, max]` envelope and applies it to the
//! outgoing video sender. A dead zone between the shrink and grow conditions
//! provides the hysteresis that keeps the rate from oscillating at a decision
//! boundary.

mod controller;
mod envelope;

pub use controller::{AdaptReason, BitrateController};
pub use envelope::BitrateEnvelope;
