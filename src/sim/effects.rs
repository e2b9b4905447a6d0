//! Timed effect scheduler
//!
//! Tracks non-stackable timed buffs/debuffs, stacking DOT/HOT lists with a
//! shared tick cadence, and ability cooldowns. Expirations restore any
//! global parameters they overrode before physics reads them in the same
//! tick.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;
use crate::sim::physics;
use crate::sim::state::{EffectKind, GameEvent, GameState};

/// Why a cast was refused
#[derive(Debug, Clone, PartialEq)]
pub enum CastError {
    OnCooldown { remaining_secs: f32 },
    UnknownAbility,
}

/// Effect applied when a timed effect expires
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aftereffect {
    pub kind: EffectKind,
    pub magnitude: f32,
    pub duration_secs: f32,
}

/// Pre-activation values of the globals an effect may override
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSnapshot {
    pub fall_angle_min: f32,
    pub fall_angle_max: f32,
    pub horizontal_drift: f32,
}

/// One non-stackable timed effect. At most one entry per kind; re-applying
/// refreshes the timer instead of stacking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveEffect {
    pub kind: EffectKind,
    pub remaining_secs: f32,
    pub magnitude: f32,
    pub snapshot: Option<ParamSnapshot>,
    pub aftereffect: Option<Aftereffect>,
}

/// One DOT or HOT stack entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StackEntry {
    pub remaining_secs: f32,
    pub per_tick: f32,
}

/// All scheduler state. Lives inside `GameState`; `clear` resets it on
/// restart with no partial-cancellation states.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectScheduler {
    pub timed: Vec<ActiveEffect>,
    pub dots: Vec<StackEntry>,
    pub dot_timer: f32,
    pub hots: Vec<StackEntry>,
    pub hot_timer: f32,
    pub cooldowns: HashMap<String, f32>,
}

impl EffectScheduler {
    pub fn is_active(&self, kind: EffectKind) -> bool {
        self.timed.iter().any(|e| e.kind == kind)
    }

    pub fn magnitude(&self, kind: EffectKind) -> Option<f32> {
        self.timed.iter().find(|e| e.kind == kind).map(|e| e.magnitude)
    }

    pub fn remaining(&self, kind: EffectKind) -> Option<f32> {
        self.timed.iter().find(|e| e.kind == kind).map(|e| e.remaining_secs)
    }

    /// Physics time-step scale: freeze wins over time-slow
    pub fn time_scale(&self) -> f32 {
        if self.is_active(EffectKind::Freeze) {
            0.0
        } else {
            self.magnitude(EffectKind::TimeSlow).unwrap_or(1.0)
        }
    }

    /// Multiplier applied to freshly spawned drop speeds
    pub fn spawn_speed_boost(&self) -> f32 {
        self.magnitude(EffectKind::SpeedBoost).unwrap_or(1.0)
    }

    /// Temporary dodge rating on top of the state's base rating
    pub fn dodge_bonus(&self) -> f32 {
        self.magnitude(EffectKind::DodgeBoost).unwrap_or(0.0)
    }

    pub fn cooldown_remaining(&self, ability_id: &str) -> f32 {
        self.cooldowns.get(ability_id).copied().unwrap_or(0.0)
    }

    /// Forcibly drop every effect, stack and cooldown (game restart)
    pub fn clear(&mut self) {
        self.timed.clear();
        self.dots.clear();
        self.dot_timer = 0.0;
        self.hots.clear();
        self.hot_timer = 0.0;
        self.cooldowns.clear();
    }
}

fn take_snapshot(state: &GameState, kind: EffectKind) -> Option<ParamSnapshot> {
    match kind {
        EffectKind::SteepFall | EffectKind::DriftDamp => Some(ParamSnapshot {
            fall_angle_min: state.fall_angle_min,
            fall_angle_max: state.fall_angle_max,
            horizontal_drift: state.horizontal_drift,
        }),
        _ => None,
    }
}

fn restore_snapshot(state: &mut GameState, snapshot: Option<ParamSnapshot>) {
    if let Some(snap) = snapshot {
        state.fall_angle_min = snap.fall_angle_min;
        state.fall_angle_max = snap.fall_angle_max;
        state.horizontal_drift = snap.horizontal_drift;
    }
}

/// Write the effect's parameter override. Callers must have restored the
/// snapshot first when re-applying, so overrides never compound.
fn apply_override(state: &mut GameState, kind: EffectKind, magnitude: f32) {
    match kind {
        EffectKind::SteepFall => {
            state.fall_angle_min *= magnitude;
            state.fall_angle_max *= magnitude;
        }
        EffectKind::DriftDamp => {
            state.horizontal_drift *= magnitude;
        }
        _ => {}
    }
}

/// Activate or refresh a non-stackable timed effect
pub fn apply_effect(
    state: &mut GameState,
    kind: EffectKind,
    magnitude: f32,
    duration_secs: f32,
    aftereffect: Option<Aftereffect>,
) {
    if let Some(idx) = state.effects.timed.iter().position(|e| e.kind == kind) {
        // Refresh: restore the snapshot before re-applying the override
        let snapshot = state.effects.timed[idx].snapshot;
        restore_snapshot(state, snapshot);
        apply_override(state, kind, magnitude);

        let entry = &mut state.effects.timed[idx];
        entry.remaining_secs = duration_secs;
        entry.magnitude = magnitude;
        entry.aftereffect = aftereffect;
        state.push_event(GameEvent::EffectRefreshed { kind });
        log::debug!("effect refreshed: {kind:?} for {duration_secs}s");
        return;
    }

    let snapshot = take_snapshot(state, kind);
    apply_override(state, kind, magnitude);
    state.effects.timed.push(ActiveEffect {
        kind,
        remaining_secs: duration_secs,
        magnitude,
        snapshot,
        aftereffect,
    });

    if kind == EffectKind::ReverseGravity {
        physics::begin_reverse_gravity(state);
    }

    state.push_event(GameEvent::EffectActivated { kind });
    log::debug!("effect activated: {kind:?} for {duration_secs}s");
}

/// Register a damage-over-time stack. Only the first stack of an empty
/// list restarts the shared cadence.
pub fn add_dot(state: &mut GameState, config: &GameConfig, per_tick: f32, duration_secs: f32) {
    if state.effects.dots.is_empty() {
        state.effects.dot_timer = config.effects.dot_tick_secs;
    }
    state.effects.dots.push(StackEntry { remaining_secs: duration_secs, per_tick });
}

/// Register a heal-over-time stack
pub fn add_hot(state: &mut GameState, config: &GameConfig, per_tick: f32, duration_secs: f32) {
    if state.effects.hots.is_empty() {
        state.effects.hot_timer = config.effects.hot_tick_secs;
    }
    state.effects.hots.push(StackEntry { remaining_secs: duration_secs, per_tick });
}

/// Cast a configured ability. Refused while its cooldown is running.
pub fn cast_ability(
    state: &mut GameState,
    config: &GameConfig,
    ability_id: &str,
) -> Result<(), CastError> {
    let Some(def) = config.abilities.iter().find(|a| a.id == ability_id) else {
        return Err(CastError::UnknownAbility);
    };

    let remaining = state.effects.cooldown_remaining(ability_id);
    if remaining > 0.0 {
        return Err(CastError::OnCooldown { remaining_secs: remaining });
    }

    state.effects.cooldowns.insert(def.id.clone(), def.cooldown_secs);
    if def.duration_secs > 0.0 {
        let aftereffect = def.expiry_dodge_bonus.map(|bonus| Aftereffect {
            kind: EffectKind::DodgeBoost,
            magnitude: bonus,
            duration_secs: config.effects.aftereffect_dodge_secs,
        });
        apply_effect(state, def.effect, def.magnitude, def.duration_secs, aftereffect);
    }
    Ok(())
}

/// Advance every timer by the (unscaled) frame delta. Runs first in the
/// tick so expirations restore globals before physics reads them.
pub fn tick_effects(state: &mut GameState, config: &GameConfig, dt_secs: f32) {
    // Cooldowns
    for remaining in state.effects.cooldowns.values_mut() {
        *remaining -= dt_secs;
    }
    state.effects.cooldowns.retain(|_, remaining| *remaining > 0.0);

    // Timed effects: expired entries are removed before their side effects
    // run, so a later tick can never re-fire them
    let mut expired = Vec::new();
    let mut i = 0;
    while i < state.effects.timed.len() {
        state.effects.timed[i].remaining_secs -= dt_secs;
        if state.effects.timed[i].remaining_secs <= 0.0 {
            expired.push(state.effects.timed.remove(i));
        } else {
            i += 1;
        }
    }
    for effect in expired {
        restore_snapshot(state, effect.snapshot);
        if effect.kind == EffectKind::ReverseGravity {
            physics::end_reverse_gravity(state);
        }
        if let Some(after) = effect.aftereffect {
            apply_effect(state, after.kind, after.magnitude, after.duration_secs, None);
        }
        state.push_event(GameEvent::EffectExpired { kind: effect.kind });
        log::debug!("effect expired: {:?}", effect.kind);
    }

    tick_dots(state, config, dt_secs);
    tick_hots(state, config, dt_secs);
}

fn tick_dots(state: &mut GameState, config: &GameConfig, dt_secs: f32) {
    if state.effects.dots.is_empty() {
        return;
    }
    state.effects.dot_timer -= dt_secs;
    while state.effects.dot_timer <= 0.0 && !state.effects.dots.is_empty() {
        let total: f32 = state.effects.dots.iter().map(|e| e.per_tick).sum();
        if state.effects.is_active(EffectKind::Shield) {
            state.push_event(GameEvent::DamageBlocked);
        } else {
            state.apply_damage(total);
            state.push_event(GameEvent::DotTick { amount: total });
        }
        let interval = config.effects.dot_tick_secs;
        for entry in &mut state.effects.dots {
            entry.remaining_secs -= interval;
        }
        state.effects.dots.retain(|e| e.remaining_secs > 0.0);
        state.effects.dot_timer += interval;
    }
}

fn tick_hots(state: &mut GameState, config: &GameConfig, dt_secs: f32) {
    if state.effects.hots.is_empty() {
        return;
    }
    state.effects.hot_timer -= dt_secs;
    while state.effects.hot_timer <= 0.0 && !state.effects.hots.is_empty() {
        // Shield never blocks healing
        let total: f32 = state.effects.hots.iter().map(|e| e.per_tick).sum();
        state.apply_heal(total);
        state.push_event(GameEvent::HotTick { amount: total });
        let interval = config.effects.hot_tick_secs;
        for entry in &mut state.effects.hots {
            entry.remaining_secs -= interval;
        }
        state.effects.hots.retain(|e| e.remaining_secs > 0.0);
        state.effects.hot_timer += interval;
    }
}
