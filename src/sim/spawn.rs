//! Weighted spawn selection
//!
//! Picks the next drop from the pool by weighted random choice, with the
//! weights scaled by level, player health and current speed. A separate
//! score-milestone gate decides when power-ups enter the field at all.

use rand::Rng;

use crate::config::SpawnConfig;
use crate::sim::state::{EffectPayload, EntityCategory, GameState, SpawnDefinition};

/// Filter a raw pool down to well-formed definitions. Malformed entries
/// are logged and excluded instead of failing the run.
pub fn validate_pool(raw: &[SpawnDefinition]) -> Vec<SpawnDefinition> {
    let mut pool = Vec::with_capacity(raw.len());
    for def in raw {
        if def.id.is_empty() {
            log::warn!("spawn definition with empty id excluded");
            continue;
        }
        if !def.base_probability.is_finite() || def.base_probability < 0.0 {
            log::warn!("spawn definition '{}' has bad probability, excluded", def.id);
            continue;
        }
        if def.size_multiplier <= 0.0 {
            log::warn!("spawn definition '{}' has nonpositive size, excluded", def.id);
            continue;
        }
        if def.speed_variation.0 <= 0.0 || def.speed_variation.0 > def.speed_variation.1 {
            log::warn!("spawn definition '{}' has bad speed range, excluded", def.id);
            continue;
        }
        pool.push(def.clone());
    }
    if pool.is_empty() {
        log::warn!("spawn pool empty after validation, spawning disabled");
    }
    pool
}

fn is_healing(def: &SpawnDefinition) -> bool {
    matches!(def.payload, EffectPayload::Heal { .. } | EffectPayload::Hot { .. })
}

/// Selection weight for one candidate under the current state
pub fn effective_weight(def: &SpawnDefinition, state: &GameState) -> f32 {
    // One-shots are gone for good after their first spawn
    if def.one_shot && state.spawn_count(&def.id) > 0 {
        return 0.0;
    }

    let mut weight = def.base_probability;
    if def.level_scaling {
        weight *= 1.0 + state.current_level as f32 * 0.1;
    }
    if def.health_scaling && is_healing(def) {
        let fraction = state.health_fraction();
        weight *= if fraction <= 0.3 {
            1.5
        } else if fraction <= 0.5 {
            1.3
        } else if fraction <= 0.7 {
            1.15
        } else {
            1.0
        };
    }
    if def.speed_scaling {
        weight *= 1.0 + (state.level_speed_multiplier - 1.0) * 0.5;
    }
    weight.max(0.0)
}

/// Weighted draw over the pool, restricted to power-ups or regular drops.
/// Returns a pool index; `None` only when no candidate of that kind exists.
pub fn select_candidate(state: &mut GameState, power_ups: bool) -> Option<usize> {
    let candidates: Vec<(usize, f32)> = state
        .pool
        .iter()
        .enumerate()
        .filter(|(_, def)| (def.category == EntityCategory::PowerUp) == power_ups)
        .map(|(i, def)| (i, effective_weight(def, state)))
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let total: f32 = candidates.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        // Degenerate pool: defined fallback instead of an error path
        return Some(candidates[0].0);
    }

    let mut remainder = state.rng.random_range(0.0..total);
    for (index, weight) in &candidates {
        remainder -= weight;
        if remainder <= 0.0 {
            return Some(*index);
        }
    }
    // Floating-point shortfall lands on the last candidate
    Some(candidates.last().unwrap().0)
}

/// Whether a power-up should spawn this tick: a fixed score-interval
/// milestone or an exact custom spawn score, each consumed once, then a
/// random chance on top.
pub fn should_spawn_power_up(state: &mut GameState, config: &SpawnConfig) -> bool {
    let mut triggered = false;

    if config.power_up_interval > 0 {
        let milestone = (state.score / config.power_up_interval) * config.power_up_interval;
        if milestone > 0 && state.last_power_up_score.is_none_or(|last| milestone > last) {
            state.last_power_up_score = Some(milestone);
            triggered = true;
        }
    }

    if config.custom_power_up_scores.contains(&state.score)
        && !state.consumed_custom_spawns.contains(&state.score)
    {
        state.consumed_custom_spawns.push(state.score);
        triggered = true;
    }

    // A failed roll still consumes the milestone, so it cannot re-fire
    triggered && state.rng.random_bool(config.power_up_chance)
}
