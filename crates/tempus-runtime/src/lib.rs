//! Tempus Runtime - Fixed-step simulation driver
//!
//! Each call to [`Simulation::step`] runs one step of the loop:
//! 1. Drain time control commands and progress the clock
//! 2. For every live tick produced: prune history, resolve time bubbles,
//!    decay lashback risk, advance producers, record the tick
//! 3. For a Playback or CatchUp frame: restore every producer from history
//! 4. Turn local bubble requests into bubbles and lashback triggers

pub mod config;
pub mod simulation;
pub mod telemetry;

pub use config::*;
pub use simulation::*;
