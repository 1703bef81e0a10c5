//! Tempus Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every Tempus crate:
//! - Identifiers (EntityId, BubbleId, SourceId, PlayerId)
//! - The simulation tick
//! - Rewind modes and execution phases
//! - Horizontal-plane geometry for spatial effects
//! - Error types

pub mod error;
pub mod geometry;
pub mod id;
pub mod mode;
pub mod tick;

pub use error::*;
pub use geometry::*;
pub use id::*;
pub use mode::*;
pub use tick::*;
