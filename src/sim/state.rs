//! Game state and core simulation types
//!
//! Everything the host needs to observe (entity transforms, score, phase,
//! active effects) hangs off `GameState`. One state per run; restart
//! builds a fresh one.

use std::collections::HashMap;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::sim::effects::EffectScheduler;
use crate::sim::spawn::validate_pool;

/// What a drop entity is, for scoring and physics tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityCategory {
    Item,
    Projectile,
    PowerUp,
}

/// Timed effect families tracked by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectKind {
    /// Scales the physics time step down
    TimeSlow,
    /// Stops the physics time step entirely
    Freeze,
    /// Scales freshly spawned drop speeds up
    SpeedBoost,
    /// Blocks projectile and DOT damage while active
    Shield,
    /// Drops rise instead of falling
    ReverseGravity,
    /// Narrows the fall-angle bounds
    SteepFall,
    /// Damps horizontal drift on new spawns
    DriftDamp,
    /// Temporary dodge rating bonus
    DodgeBoost,
}

/// What collecting (or being hit by) an entity does
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EffectPayload {
    Score { points: u32 },
    Damage { amount: f32 },
    Heal { amount: f32 },
    Buff { kind: EffectKind, magnitude: f32, duration_secs: f32 },
    /// Impact damage plus a stacking damage-over-time
    Dot { impact: f32, per_tick: f32, duration_secs: f32 },
    /// Stacking heal-over-time
    Hot { per_tick: f32, duration_secs: f32 },
    /// Permanently lowers the effective speed multiplier (capped)
    PermanentSlow { amount: f32 },
}

/// Immutable spawn template. Pool-level counters live in `GameState` so
/// definitions stay shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnDefinition {
    pub id: String,
    pub category: EntityCategory,
    pub base_probability: f32,
    pub size_multiplier: f32,
    /// Random speed factor range applied at spawn
    pub speed_variation: (f32, f32),
    pub level_scaling: bool,
    /// Healing drops become likelier at low health
    pub health_scaling: bool,
    pub speed_scaling: bool,
    /// Never selected again after its first spawn
    pub one_shot: bool,
    pub payload: EffectPayload,
}

/// Reverse-gravity participation of one entity
///
/// `ReversedExempt` is sticky: an entity that bounced off the top keeps
/// falling normally until the global mode fully deactivates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReverseState {
    #[default]
    Normal,
    ReversedActive,
    ReversedExempt,
}

/// Lifecycle of a drop entity; exactly one transition away from `Falling`
/// per tick, and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DropFate {
    #[default]
    Falling,
    Collected,
    Missed,
    /// Removed without player interaction (reverse-gravity purge)
    Purged,
}

/// A live falling object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropEntity {
    pub id: u32,
    pub definition_id: String,
    pub category: EntityCategory,
    pub payload: EffectPayload,
    /// Top-left corner
    pub pos: Vec2,
    pub size: Vec2,
    pub vel: Vec2,
    /// Speed magnitude assigned at spawn, used when re-aiming the entity
    pub base_speed: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    pub fall_angle: f32,
    pub reverse: ReverseState,
    pub fate: DropFate,
}

impl DropEntity {
    /// Axis-aligned overlap test against another box
    pub fn overlaps(&self, pos: Vec2, size: Vec2) -> bool {
        self.pos.x < pos.x + size.x
            && self.pos.x + self.size.x > pos.x
            && self.pos.y < pos.y + size.y
            && self.pos.y + self.size.y > pos.y
    }

    pub fn center_x(&self) -> f32 {
        self.pos.x + self.size.x / 2.0
    }
}

/// The player-controlled catcher at the bottom of the field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catcher {
    /// Left edge
    pub x: f32,
    pub width: f32,
    pub height: f32,
    pub vel_x: f32,
}

impl Catcher {
    /// Move toward a target center position, speed-limited
    pub fn move_toward(&mut self, target_center_x: f32, dt: f32, max_speed: f32, field_width: f32) {
        let target = (target_center_x - self.width / 2.0).clamp(0.0, field_width - self.width);
        let delta = target - self.x;
        let max_delta = max_speed * dt;
        let clamped_delta = delta.clamp(-max_delta, max_delta);

        self.vel_x = if dt > 0.0 { clamped_delta / dt } else { 0.0 };
        self.x += clamped_delta;
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }
}

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Playing,
    Won,
    GameOver,
}

/// Per-level activity counters feeding the timed difficulty mode
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ActivityTally {
    pub collections: u32,
    pub power_ups: u32,
    pub misses: u32,
    pub damage_events: u32,
}

/// Semantic events for the presentation layer (audio, notifications).
/// The host drains these each frame; the core never renders or plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Spawned { id: u32, definition: String, category: EntityCategory },
    Collected { id: u32, definition: String, category: EntityCategory },
    Missed { id: u32, definition: String },
    ScoreGained { points: u32 },
    DamageTaken { amount: f32 },
    DamageDodged,
    DamageBlocked,
    Healed { amount: f32 },
    DotTick { amount: f32 },
    HotTick { amount: f32 },
    EffectActivated { kind: EffectKind },
    EffectRefreshed { kind: EffectKind },
    EffectExpired { kind: EffectKind },
    CastRejected { ability: String, remaining_secs: f32 },
    SetCompleted { count: u32 },
    LevelUp { level: u32 },
    PhaseChanged { phase: GamePhase },
}

fn default_rng() -> Pcg32 {
    Pcg32::seed_from_u64(0)
}

/// Complete simulation state for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    /// Run seed for reproducibility
    pub seed: u64,
    #[serde(skip, default = "default_rng")]
    pub rng: Pcg32,
    pub phase: GamePhase,

    // === Outcome ===
    pub score: u32,
    pub health: f32,
    pub max_health: f32,
    pub combo: u32,
    pub miss_count: u32,

    // === Time ===
    /// Accumulated simulation time in seconds
    pub time_secs: f64,
    /// Smoothed frame-delta multiplier relative to the reference rate
    pub dt_multiplier: f32,

    // === Difficulty ===
    pub current_level: u32,
    pub level_speed_multiplier: f32,
    /// Timed mode: when the current level began
    pub level_started_at: f64,
    /// Timed mode: how long the current level runs
    pub level_required_secs: f32,
    pub tally: ActivityTally,
    /// Monotone capped reduction from permanent-slow pickups
    pub permanent_speed_reduction: f32,
    /// Monotone capped reduction from completed item sets
    pub set_speed_reduction: f32,
    pub sets_completed: u32,

    // === Effect-overridable globals ===
    pub fall_angle_min: f32,
    pub fall_angle_max: f32,
    pub horizontal_drift: f32,
    pub dodge_rating: f32,

    // === Spawning ===
    /// Validated spawn pool (malformed definitions were dropped at load)
    pub pool: Vec<SpawnDefinition>,
    pub spawn_counts: HashMap<String, u32>,
    pub collected_counts: HashMap<String, u32>,
    /// Countdown to the next regular drop
    pub spawn_timer: f32,
    pub last_power_up_score: Option<u32>,
    pub consumed_custom_spawns: Vec<u32>,
    /// Recent staging Y positions for the spawn spacing check
    pub recent_spawn_ys: Vec<f32>,

    // === Live objects ===
    pub drops: Vec<DropEntity>,
    pub catcher: Catcher,
    pub effects: EffectScheduler,

    #[serde(skip)]
    events: Vec<GameEvent>,
    next_id: u32,
}

impl GameState {
    /// Create a fresh run. The config's spawn pool is validated here;
    /// malformed entries are logged and excluded.
    pub fn new(seed: u64, config: &GameConfig) -> Self {
        let pool = validate_pool(&config.pool);
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            phase: GamePhase::Playing,

            score: 0,
            health: config.field.max_health,
            max_health: config.field.max_health,
            combo: 0,
            miss_count: 0,

            time_secs: 0.0,
            dt_multiplier: 1.0,

            current_level: 0,
            level_speed_multiplier: config.difficulty.base_speed_multiplier,
            level_started_at: 0.0,
            level_required_secs: config.difficulty.base_level_secs,
            tally: ActivityTally::default(),
            permanent_speed_reduction: 0.0,
            set_speed_reduction: 0.0,
            sets_completed: 0,

            fall_angle_min: config.physics.fall_angle_min,
            fall_angle_max: config.physics.fall_angle_max,
            horizontal_drift: config.physics.horizontal_drift,
            dodge_rating: 0.0,

            pool,
            spawn_counts: HashMap::new(),
            collected_counts: HashMap::new(),
            spawn_timer: config.spawn.drop_interval_secs,
            last_power_up_score: None,
            consumed_custom_spawns: Vec::new(),
            recent_spawn_ys: Vec::new(),

            drops: Vec::new(),
            catcher: Catcher {
                x: (config.field.width - config.field.catcher_width) / 2.0,
                width: config.field.catcher_width,
                height: config.field.catcher_height,
                vel_x: 0.0,
            },
            effects: EffectScheduler::default(),

            events: Vec::new(),
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Hand pending events to the presentation layer
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Speed multiplier drops actually spawn with: the level multiplier
    /// minus the permanent reductions, floored so the fastest bullet-time
    /// tier stays reachable.
    pub fn effective_speed_multiplier(&self, floor: f32) -> f32 {
        (self.level_speed_multiplier - self.permanent_speed_reduction - self.set_speed_reduction)
            .max(floor)
    }

    /// Accumulate permanent-slow pickups, independently capped
    pub fn add_permanent_reduction(&mut self, amount: f32, cap: f32) {
        self.permanent_speed_reduction = (self.permanent_speed_reduction + amount).min(cap);
    }

    /// Accumulate set-completion reductions, independently capped
    pub fn add_set_reduction(&mut self, amount: f32, cap: f32) {
        self.set_speed_reduction = (self.set_speed_reduction + amount).min(cap);
    }

    pub fn apply_heal(&mut self, amount: f32) {
        self.health = (self.health + amount).min(self.max_health);
    }

    /// Lower health, clamped at zero. Phase transition happens in the tick.
    pub fn apply_damage(&mut self, amount: f32) {
        self.health = (self.health - amount).max(0.0);
    }

    pub fn health_fraction(&self) -> f32 {
        if self.max_health > 0.0 { self.health / self.max_health } else { 0.0 }
    }

    pub fn spawn_count(&self, definition_id: &str) -> u32 {
        self.spawn_counts.get(definition_id).copied().unwrap_or(0)
    }

    pub fn record_spawn(&mut self, definition_id: &str) {
        *self.spawn_counts.entry(definition_id.to_string()).or_insert(0) += 1;
    }

    pub fn record_collection(&mut self, definition_id: &str) {
        *self.collected_counts.entry(definition_id.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn test_new_state_is_centered_and_healthy() {
        let config = GameConfig::default();
        let state = GameState::new(7, &config);
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.health, config.field.max_health);
        let center = state.catcher.x + state.catcher.width / 2.0;
        assert!((center - config.field.width / 2.0).abs() < 0.01);
    }

    #[test]
    fn test_health_clamps_both_ways() {
        let config = GameConfig::default();
        let mut state = GameState::new(7, &config);
        state.apply_damage(5000.0);
        assert_eq!(state.health, 0.0);
        state.apply_heal(5000.0);
        assert_eq!(state.health, state.max_health);
    }

    #[test]
    fn test_effective_multiplier_floor() {
        let config = GameConfig::default();
        let mut state = GameState::new(7, &config);
        state.level_speed_multiplier = 3.7;
        state.permanent_speed_reduction = 4.0;
        assert_eq!(state.effective_speed_multiplier(0.3), 0.3);
    }

    #[test]
    fn test_reductions_are_capped_independently() {
        let config = GameConfig::default();
        let mut state = GameState::new(7, &config);
        for _ in 0..10 {
            state.add_permanent_reduction(0.5, 2.0);
            state.add_set_reduction(0.5, 1.5);
        }
        assert_eq!(state.permanent_speed_reduction, 2.0);
        assert_eq!(state.set_speed_reduction, 1.5);
    }

    #[test]
    fn test_entity_ids_are_unique() {
        let config = GameConfig::default();
        let mut state = GameState::new(7, &config);
        let a = state.next_entity_id();
        let b = state.next_entity_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_catcher_move_toward_respects_speed_and_bounds() {
        let mut catcher = Catcher { x: 100.0, width: 100.0, height: 28.0, vel_x: 0.0 };
        catcher.move_toward(800.0, 0.1, 500.0, 800.0);
        // Limited to 50px of travel this step
        assert!((catcher.x - 150.0).abs() < 0.01);
        for _ in 0..100 {
            catcher.move_toward(10_000.0, 0.1, 500.0, 800.0);
        }
        assert!((catcher.x - 700.0).abs() < 0.01);
    }
}
