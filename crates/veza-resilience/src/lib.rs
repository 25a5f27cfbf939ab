#![forbid(unsafe_code)]

//! Connection recovery for one transport.
//!
//! A failure signal drives an explicit state machine through in-place
//! recovery (`Recovering`), an ordered list of fallback server
//! configurations (`Fallback`), and finally `Exhausted`, which is reported
//! exactly once and latches until the operator resets. Only one recovery
//! sequence is ever in flight; concurrent failure signals are ignored.

mod config;
mod controller;
mod error;
mod state;

pub use crate::{
    config::ResilienceConfig,
    controller::ResilienceController,
    error::{ResilienceError, ResilienceResult},
    state::{ResilienceState, TerminalReason},
};
