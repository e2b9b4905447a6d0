//! Skydrop - falling-item arcade simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (spawning, drop physics, difficulty, effects)
//! - `config`: Data-driven tuning supplied by the host at startup
//!
//! The crate contains no rendering, audio or input handling. A host drives
//! the simulation by calling `sim::tick` once per frame with the elapsed
//! time and the current pointer target, then drains semantic events for
//! presentation.

pub mod config;
pub mod sim;

pub use config::GameConfig;
pub use sim::{GameEvent, GamePhase, GameState, TickInput, tick};

/// Timing constants shared by the simulation and host loops
pub mod consts {
    /// Reference tick rate the tuning numbers are calibrated against
    pub const REFERENCE_TICK_RATE: f32 = 60.0;
    /// One reference tick in seconds
    pub const REFERENCE_DT: f32 = 1.0 / REFERENCE_TICK_RATE;
    /// Frame-delta multiplier clamp (protects against tab-switch spikes)
    pub const DT_MULT_MIN: f32 = 0.1;
    pub const DT_MULT_MAX: f32 = 4.0;
    /// Exponential smoothing factor for the frame-delta multiplier
    pub const DT_MULT_SMOOTHING: f32 = 0.2;
}

/// Round to one decimal place (speed multipliers are reported this way)
#[inline]
pub fn round_to_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}
