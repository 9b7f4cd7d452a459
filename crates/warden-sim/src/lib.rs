//! # Warden Sim
//!
//! Headless arena for exercising Warden AI components:
//! - Arena world with sphere occluders ([`arena`])
//! - Fixed-step clock ([`clock`])
//! - Scripted guard-versus-intruders encounter ([`scenario`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod arena;
pub mod clock;
pub mod scenario;

pub use arena::{Arena, Body, Occluder};
pub use clock::SimClock;
pub use scenario::{Guard, Intruder, Scenario, ScenarioSummary, ScriptAction};
