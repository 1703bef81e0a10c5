//! Tempus Distortion - Local time scale overrides and their cost
//!
//! This crate implements:
//! - Time bubbles: spatial volumes that override an entity's local time scale
//! - Nearest-wins resolution of overlapping bubbles
//! - Per-entity local time scale attachments
//! - The lashback risk tracker that penalizes overuse of distortion
//!
//! Both the bubble set and the risk tracker are rewindable producers.

pub mod bubble;
pub mod lashback;
pub mod scale;

pub use bubble::*;
pub use lashback::*;
pub use scale::*;
