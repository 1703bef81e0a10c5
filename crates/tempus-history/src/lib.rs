//! Tempus History - Bounded snapshot store and producer restoration
//!
//! This crate implements the History Store:
//! - Tagged, length-prefixed per-producer blocks inside each tick record
//! - Atomic commit of a tick record
//! - Horizon-based pruning and hard record bound
//! - Ordered record/restore over registered rewindable producers

pub mod producer;
pub mod record;
pub mod store;

pub use producer::*;
pub use record::*;
pub use store::*;
