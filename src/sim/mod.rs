//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must stay pure and
//! deterministic:
//! - Seeded RNG only
//! - Frame deltas normalized to the reference tick rate
//! - No rendering, audio or platform dependencies
//!
//! Tick order is fixed: effect timers, difficulty, spawning, physics,
//! catch/miss resolution. See `tick::tick`.

pub mod difficulty;
pub mod effects;
pub mod physics;
pub mod spawn;
pub mod state;
pub mod tick;

pub use effects::{ActiveEffect, Aftereffect, CastError, EffectScheduler, StackEntry};
pub use state::{
    ActivityTally, Catcher, DropEntity, DropFate, EffectKind, EffectPayload, EntityCategory,
    GameEvent, GamePhase, GameState, ReverseState, SpawnDefinition,
};
pub use tick::{TickInput, tick};
