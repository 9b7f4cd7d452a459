//! # Warden Common
//!
//! Shared types for the Warden AI crates:
//! - Entity handles ([`EntityId`]) used as table keys
//! - Spatial helpers over [`glam::Vec3`] (vision cones, falloff)
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod ids;
pub mod space;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::space::*;
}

pub use prelude::*;
