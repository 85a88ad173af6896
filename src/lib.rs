//! Emotional simulation core for a virtual pet.
//!
//! The creature's affective kernel evolves under fixed ticks and player
//! stimuli. Commands pass an ethical safeguard and an autonomy layer before
//! they touch the kernel, and evolution is gated behind multi-factor checks.
//! All core functions take a snapshot and return a new one; [`sim::Session`]
//! is the caller-side owner that threads it through.

pub mod app;
pub mod config;
pub mod error;
pub mod evolution;
pub mod kernel;
pub mod logging;
pub mod model;
pub mod narrative;
pub mod refusal;
pub mod resonance;
pub mod rng;
pub mod safeguard;
pub mod sim;

pub use error::KernelError;
pub use model::{Creature, Mood, RefusalReason, Stimulus};
pub use sim::Session;
