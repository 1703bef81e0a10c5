//! Tempus Test Harness - Deterministic simulation testing
//!
//! This crate provides:
//! - Walkers: moving entities driven by local time scale, rewindable
//! - Seeded random command scripts
//! - A harness running scripts and capturing tick/mode trajectories

pub mod harness;
pub mod script;
pub mod walker;

pub use harness::*;
pub use script::*;
pub use walker::*;
