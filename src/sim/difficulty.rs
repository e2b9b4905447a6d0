//! Difficulty progression
//!
//! Pure computation of the current level and its speed multiplier. Points
//! mode follows score thresholds; timed mode runs each level for a
//! duration shortened by good play and stretched by sloppy play.

use crate::config::{DifficultyConfig, DifficultyMode};
use crate::round_to_tenth;
use crate::sim::state::{ActivityTally, GameEvent, GameState};

/// Level for an accumulated score: the highest threshold reached, plus one
/// extra level per fixed interval past the last threshold.
pub fn level_for_score(score: u32, config: &DifficultyConfig) -> u32 {
    let thresholds = &config.score_thresholds;
    if thresholds.is_empty() {
        return 0;
    }

    let mut level = 0;
    for (i, threshold) in thresholds.iter().enumerate() {
        if score >= *threshold {
            level = i as u32;
        } else {
            break;
        }
    }

    let last = *thresholds.last().unwrap();
    if score >= last && config.extra_level_interval > 0 {
        level += (score - last) / config.extra_level_interval;
    }
    level
}

/// Timed mode: duration of the next level from this level's activity.
/// Bonuses and penalties are each capped before they combine.
pub fn next_level_secs(tally: &ActivityTally, config: &DifficultyConfig) -> f32 {
    let collection_bonus =
        (tally.collections as f32 * config.collection_bonus_secs).min(config.collection_bonus_cap_secs);
    let power_up_bonus =
        (tally.power_ups as f32 * config.power_up_bonus_secs).min(config.power_up_bonus_cap_secs);
    let miss_penalty =
        (tally.misses as f32 * config.miss_penalty_secs).min(config.miss_penalty_cap_secs);
    let damage_penalty =
        (tally.damage_events as f32 * config.damage_penalty_secs).min(config.damage_penalty_cap_secs);

    (config.base_level_secs - collection_bonus - power_up_bonus + miss_penalty + damage_penalty)
        .max(config.min_level_secs)
}

/// Speed multiplier for a level: base plus the tier increments up to that
/// level, precision-pinned at specific low levels, capped, and rounded to
/// one decimal.
pub fn compute_speed_multiplier(level: u32, config: &DifficultyConfig) -> f32 {
    let mut multiplier = config.base_speed_multiplier;
    for tier in &config.tiers {
        if level < tier.from_level {
            continue;
        }
        let top = level.min(tier.to_level);
        let levels_in_tier = top - tier.from_level + 1;
        multiplier += levels_in_tier as f32 * tier.increment;
    }

    if let Some(&(_, pinned)) =
        config.precision_adjustments.iter().find(|(pin_level, _)| *pin_level == level)
    {
        multiplier = pinned;
    }

    if let Some(cap) = config.high_level_cap
        && level >= config.high_level_cap_from
    {
        multiplier = multiplier.min(cap);
    }

    round_to_tenth(multiplier).min(config.max_multiplier)
}

/// Recompute level and speed multiplier for this tick, storing them on the
/// state so the spawn selector and physics observe them immediately.
pub fn recompute(state: &mut GameState, config: &DifficultyConfig) {
    let new_level = match config.mode {
        DifficultyMode::Points => level_for_score(state.score, config),
        DifficultyMode::Timed => {
            let elapsed = (state.time_secs - state.level_started_at) as f32;
            if elapsed >= state.level_required_secs {
                state.level_required_secs = next_level_secs(&state.tally, config);
                state.current_level + 1
            } else {
                state.current_level
            }
        }
    };

    if new_level != state.current_level {
        state.current_level = new_level;
        state.level_started_at = state.time_secs;
        state.tally = ActivityTally::default();
        state.push_event(GameEvent::LevelUp { level: new_level });
        log::debug!("level up: {new_level}");
    }

    state.level_speed_multiplier = compute_speed_multiplier(state.current_level, config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::state::GameState;
    use proptest::prelude::*;

    #[test]
    fn test_level_follows_thresholds() {
        let cfg = DifficultyConfig::default();
        assert_eq!(level_for_score(0, &cfg), 0);
        assert_eq!(level_for_score(49, &cfg), 0);
        assert_eq!(level_for_score(50, &cfg), 1);
        assert_eq!(level_for_score(125, &cfg), 2);
        assert_eq!(level_for_score(1349, &cfg), 8);
        assert_eq!(level_for_score(1350, &cfg), 9);
    }

    #[test]
    fn test_extra_levels_past_last_threshold() {
        let cfg = DifficultyConfig::default();
        // 1350 + 300 per extra level
        assert_eq!(level_for_score(1649, &cfg), 9);
        assert_eq!(level_for_score(1650, &cfg), 10);
        assert_eq!(level_for_score(2250, &cfg), 12);
    }

    #[test]
    fn test_precision_adjustments_pin_low_levels() {
        let cfg = DifficultyConfig::default();
        assert_eq!(compute_speed_multiplier(1, &cfg), 1.1);
        assert_eq!(compute_speed_multiplier(2, &cfg), 1.3);
        assert_eq!(compute_speed_multiplier(4, &cfg), 1.7);
        // Unpinned levels follow the tier formula
        assert_eq!(compute_speed_multiplier(3, &cfg), 1.6);
        assert_eq!(compute_speed_multiplier(10, &cfg), 3.0);
        assert_eq!(compute_speed_multiplier(20, &cfg), 4.0);
    }

    #[test]
    fn test_high_level_safety_cap() {
        let cfg = DifficultyConfig::default();
        assert_eq!(compute_speed_multiplier(100, &cfg), 8.0);
        assert_eq!(compute_speed_multiplier(500, &cfg), 8.0);
    }

    #[test]
    fn test_timed_mode_duration_floor_and_caps() {
        let cfg = DifficultyConfig::default();

        // Sloppy level: penalties push the duration up
        let sloppy = ActivityTally { collections: 0, power_ups: 0, misses: 6, damage_events: 4 };
        assert_eq!(next_level_secs(&sloppy, &cfg), 45.0 + 3.0 + 4.0);

        // Strong level: bonuses are capped before combining
        let strong =
            ActivityTally { collections: 200, power_ups: 10, misses: 0, damage_events: 0 };
        assert_eq!(next_level_secs(&strong, &cfg), 45.0 - 10.0 - 6.0);

        // Floor holds no matter how strong the level was
        let mut floor_cfg = cfg.clone();
        floor_cfg.base_level_secs = 12.0;
        assert_eq!(next_level_secs(&strong, &floor_cfg), floor_cfg.min_level_secs);
    }

    #[test]
    fn test_recompute_stores_level_and_multiplier() {
        let config = GameConfig::default();
        let mut state = GameState::new(3, &config);
        state.score = 125;
        recompute(&mut state, &config.difficulty);
        assert_eq!(state.current_level, 2);
        assert_eq!(state.level_speed_multiplier, 1.3);
        assert!(
            state
                .drain_events()
                .contains(&crate::sim::state::GameEvent::LevelUp { level: 2 })
        );
    }

    #[test]
    fn test_timed_mode_levels_on_elapsed_time() {
        let mut config = GameConfig::default();
        config.difficulty.mode = crate::config::DifficultyMode::Timed;
        let mut state = GameState::new(3, &config);
        state.level_required_secs = 45.0;

        state.time_secs = 44.0;
        recompute(&mut state, &config.difficulty);
        assert_eq!(state.current_level, 0);

        state.time_secs = 45.0;
        recompute(&mut state, &config.difficulty);
        assert_eq!(state.current_level, 1);
        assert_eq!(state.level_started_at, 45.0);
    }

    proptest! {
        #[test]
        fn prop_multiplier_monotonic_past_pins(l1 in 5u32..2000, delta in 1u32..500) {
            let cfg = DifficultyConfig::default();
            let l2 = l1 + delta;
            prop_assert!(
                compute_speed_multiplier(l2, &cfg) >= compute_speed_multiplier(l1, &cfg)
            );
        }

        #[test]
        fn prop_multiplier_never_exceeds_max(level in 0u32..100_000) {
            let cfg = DifficultyConfig::default();
            prop_assert!(compute_speed_multiplier(level, &cfg) <= cfg.max_multiplier);
        }
    }
}
