//! Tempus Time - Clock, command processing and phase gating
//!
//! This crate implements the time control surface of the engine:
//! - Fixed-step clock with pause and speed multiplier
//! - Queued control commands drained once per step
//! - Rewind mode transitions (Record, Playback, CatchUp)
//! - Execution phase gate consulted by every time-aware subsystem

pub mod clock;
pub mod command;
pub mod engine;
pub mod phase;

pub use clock::*;
pub use command::*;
pub use engine::*;
pub use phase::*;
