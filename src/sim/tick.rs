//! Per-frame simulation step
//!
//! Fixed execution order: effect timers, difficulty, spawning, physics,
//! then catch/miss resolution. Effect expirations restore any overridden
//! globals before physics reads them in the same tick.

use glam::Vec2;

use crate::config::GameConfig;
use crate::consts::{DT_MULT_MAX, DT_MULT_MIN, DT_MULT_SMOOTHING, REFERENCE_DT};
use crate::sim::effects::{self, CastError};
use crate::sim::state::{
    DropFate, EffectKind, EffectPayload, EntityCategory, GameEvent, GamePhase, GameState,
};
use crate::sim::{difficulty, physics, spawn};

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Pointer/touch target for the catcher center (field coordinates)
    pub target_x: Option<f32>,
    /// Ability to cast this tick
    pub cast: Option<String>,
    /// Throw the run away and start fresh
    pub restart: bool,
}

/// Advance the whole simulation by one host frame
pub fn tick(state: &mut GameState, input: &TickInput, config: &GameConfig, frame_dt_secs: f32) {
    if input.restart {
        let seed = state.seed.wrapping_add(1);
        *state = GameState::new(seed, config);
        return;
    }
    if state.phase != GamePhase::Playing {
        return;
    }

    // Normalize the host frame delta to the reference rate: clamp spikes,
    // smooth high-refresh jitter
    let raw_mult = (frame_dt_secs / REFERENCE_DT).clamp(DT_MULT_MIN, DT_MULT_MAX);
    state.dt_multiplier += (raw_mult - state.dt_multiplier) * DT_MULT_SMOOTHING;
    let dt_secs = state.dt_multiplier * REFERENCE_DT;
    state.time_secs += dt_secs as f64;

    if let Some(ability) = &input.cast {
        match effects::cast_ability(state, config, ability) {
            Ok(()) => {}
            Err(CastError::OnCooldown { remaining_secs }) => {
                state.push_event(GameEvent::CastRejected {
                    ability: ability.clone(),
                    remaining_secs,
                });
            }
            Err(CastError::UnknownAbility) => {
                log::warn!("cast of unknown ability '{ability}' ignored");
                state.push_event(GameEvent::CastRejected {
                    ability: ability.clone(),
                    remaining_secs: 0.0,
                });
            }
        }
    }

    // 1. Effect timers run on the unscaled delta
    effects::tick_effects(state, config, dt_secs);

    // 2. Level and speed multiplier for this tick
    difficulty::recompute(state, &config.difficulty);

    // 3. New drops
    run_spawns(state, config, dt_secs);

    // 4. Physics on the time-scaled delta (freeze and time-slow apply here)
    let scaled_dt = dt_secs * state.effects.time_scale();
    let mut drops = std::mem::take(&mut state.drops);
    for drop in &mut drops {
        physics::advance(drop, state, config, scaled_dt);
    }
    state.drops = drops;

    // 5. The catcher moves at player speed even under freeze
    if let Some(target) = input.target_x {
        state.catcher.move_toward(
            target,
            dt_secs,
            config.field.catcher_max_speed,
            config.field.width,
        );
    }

    resolve_catches(state, config);
    resolve_misses(state);

    // 6. Settled entities leave the field
    state.drops.retain(|d| d.fate == DropFate::Falling);

    update_phase(state, config);
}

/// Regular cadence spawns plus score-gated power-ups
fn run_spawns(state: &mut GameState, config: &GameConfig, dt_secs: f32) {
    if state.pool.is_empty() {
        return;
    }

    // The cadence shares the physics time scale, so freeze pauses it
    state.spawn_timer -= dt_secs * state.effects.time_scale();
    if state.spawn_timer <= 0.0 {
        if state.drops.len() < config.spawn.max_live_entities
            && let Some(index) = spawn::select_candidate(state, false)
        {
            physics::spawn_drop(state, config, index);
        }
        let pace = state.level_speed_multiplier.max(1.0);
        state.spawn_timer += (config.spawn.drop_interval_secs / pace).max(0.2);
    }

    if spawn::should_spawn_power_up(state, &config.spawn)
        && state.drops.len() < config.spawn.max_live_entities
        && let Some(index) = spawn::select_candidate(state, true)
    {
        physics::spawn_drop(state, config, index);
    }
}

/// Entities overlapping the catcher are collected and their payloads applied
fn resolve_catches(state: &mut GameState, config: &GameConfig) {
    let catcher_pos = Vec2::new(state.catcher.x, config.field.height - state.catcher.height);
    let catcher_size = Vec2::new(state.catcher.width, state.catcher.height);

    let mut caught = Vec::new();
    for drop in &mut state.drops {
        if drop.fate == DropFate::Falling && drop.overlaps(catcher_pos, catcher_size) {
            drop.fate = DropFate::Collected;
            caught.push((drop.id, drop.definition_id.clone(), drop.category, drop.payload));
        }
    }

    for (id, definition, category, payload) in caught {
        state.push_event(GameEvent::Collected { id, definition: definition.clone(), category });
        state.record_collection(&definition);
        match category {
            EntityCategory::Item => {
                state.tally.collections += 1;
                state.combo += 1;
            }
            EntityCategory::PowerUp => state.tally.power_ups += 1,
            EntityCategory::Projectile => {}
        }
        apply_payload(state, config, payload);
    }

    check_set_completion(state, config);
}

fn apply_payload(state: &mut GameState, config: &GameConfig, payload: EffectPayload) {
    match payload {
        EffectPayload::Score { points } => {
            state.score += points;
            state.push_event(GameEvent::ScoreGained { points });
        }
        EffectPayload::Damage { amount } => resolve_damage(state, config, amount, None),
        EffectPayload::Heal { amount } => {
            state.apply_heal(amount);
            state.push_event(GameEvent::Healed { amount });
        }
        EffectPayload::Buff { kind, magnitude, duration_secs } => {
            effects::apply_effect(state, kind, magnitude, duration_secs, None);
        }
        EffectPayload::Dot { impact, per_tick, duration_secs } => {
            resolve_damage(state, config, impact, Some((per_tick, duration_secs)));
        }
        EffectPayload::Hot { per_tick, duration_secs } => {
            effects::add_hot(state, config, per_tick, duration_secs);
        }
        EffectPayload::PermanentSlow { amount } => {
            state.add_permanent_reduction(amount, config.difficulty.permanent_reduction_cap);
        }
    }
}

/// Damage pipeline: dodge roll, then shield, then health. A blocked or
/// dodged hit never attaches its DOT.
fn resolve_damage(
    state: &mut GameState,
    config: &GameConfig,
    amount: f32,
    dot: Option<(f32, f32)>,
) {
    use rand::Rng;

    let rating =
        (state.dodge_rating + state.effects.dodge_bonus()).min(config.effects.dodge_cap);
    if rating > 0.0 && state.rng.random_range(0.0..100.0) < rating {
        state.push_event(GameEvent::DamageDodged);
        return;
    }
    if state.effects.is_active(EffectKind::Shield) {
        state.push_event(GameEvent::DamageBlocked);
        return;
    }

    state.apply_damage(amount);
    state.tally.damage_events += 1;
    state.combo = 0;
    state.push_event(GameEvent::DamageTaken { amount });

    if let Some((per_tick, duration_secs)) = dot {
        effects::add_dot(state, config, per_tick, duration_secs);
    }
}

/// Items that fell past the catcher count as misses; projectiles and
/// power-ups just leave the field.
fn resolve_misses(state: &mut GameState) {
    let mut missed = Vec::new();
    for drop in &state.drops {
        if drop.fate == DropFate::Missed && drop.category == EntityCategory::Item {
            missed.push((drop.id, drop.definition_id.clone()));
        }
    }
    for (id, definition) in missed {
        state.miss_count += 1;
        state.tally.misses += 1;
        state.combo = 0;
        state.push_event(GameEvent::Missed { id, definition });
    }
}

/// Collecting every distinct item at least once more completes a set and
/// grants a capped permanent speed reduction.
fn check_set_completion(state: &mut GameState, config: &GameConfig) {
    let min_collected = state
        .pool
        .iter()
        .filter(|def| def.category == EntityCategory::Item)
        .map(|def| state.collected_counts.get(&def.id).copied().unwrap_or(0))
        .min();
    let Some(min_collected) = min_collected else { return };

    while state.sets_completed < min_collected {
        state.sets_completed += 1;
        state.add_set_reduction(
            config.difficulty.set_reduction_step,
            config.difficulty.set_reduction_cap,
        );
        let count = state.sets_completed;
        state.push_event(GameEvent::SetCompleted { count });
        log::debug!("item set {count} completed");
    }
}

fn update_phase(state: &mut GameState, config: &GameConfig) {
    if state.health <= 0.0 {
        state.phase = GamePhase::GameOver;
        state.push_event(GameEvent::PhaseChanged { phase: GamePhase::GameOver });
    } else if let Some(target) = config.difficulty.target_score
        && state.score >= target
    {
        state.phase = GamePhase::Won;
        state.push_event(GameEvent::PhaseChanged { phase: GamePhase::Won });
    }
}
