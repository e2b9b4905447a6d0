//! Drop trajectory physics
//!
//! Creates drop entities from spawn templates and advances them every
//! tick: angled fall, spin, air resistance, boundary bounces and the
//! reverse-gravity mode. Physics never fails; bad values are clamped back
//! into range and logged.

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use crate::config::{BounceParams, GameConfig, PhysicsConfig};
use crate::consts::REFERENCE_TICK_RATE;
use crate::sim::state::{
    DropEntity, DropFate, EffectKind, EntityCategory, GameEvent, GameState, ReverseState,
};

/// Standard normal draw via the Box-Muller transform
fn gaussian_standard(rng: &mut Pcg32) -> f32 {
    let u1: f32 = rng.random_range(f32::EPSILON..1.0);
    let u2: f32 = rng.random_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// Pick a staging Y above the field, spaced away from recent spawns.
/// Ten retries stepping further up, then the candidate is accepted as-is.
fn stage_spawn_y(state: &mut GameState, physics: &PhysicsConfig, entity_height: f32) -> f32 {
    let mut candidate = -entity_height - state.rng.random_range(0.0..physics.spawn_spacing);
    for _ in 0..10 {
        let clear = state
            .recent_spawn_ys
            .iter()
            .all(|y| (y - candidate).abs() >= physics.spawn_spacing);
        if clear {
            break;
        }
        candidate -= physics.spawn_spacing;
    }

    state.recent_spawn_ys.push(candidate);
    if state.recent_spawn_ys.len() > physics.spawn_history {
        let excess = state.recent_spawn_ys.len() - physics.spawn_history;
        state.recent_spawn_ys.drain(..excess);
    }
    candidate
}

/// Create a live drop from a validated pool entry. Returns the entity id.
pub fn spawn_drop(state: &mut GameState, config: &GameConfig, def_index: usize) -> u32 {
    let def = state.pool[def_index].clone();
    let field = &config.field;
    let physics = &config.physics;

    let edge = field.entity_base_size * def.size_multiplier;
    let size = Vec2::new(edge, edge);
    let max_x = (field.width - edge).max(0.0);

    // Projectiles cluster around the field center; everything else is uniform
    let x = if def.category == EntityCategory::Projectile {
        let center = field.width / 2.0;
        let offset = gaussian_standard(&mut state.rng) * field.width * 0.25;
        (center + offset - edge / 2.0).clamp(0.0, max_x)
    } else {
        state.rng.random_range(0.0..=max_x)
    };
    let y = stage_spawn_y(state, physics, edge);

    let effective = state.effective_speed_multiplier(config.difficulty.multiplier_floor);
    let variation = state.rng.random_range(def.speed_variation.0..=def.speed_variation.1);
    let speed =
        physics.global_base_speed * effective * variation * state.effects.spawn_speed_boost();

    let fall_angle = state.rng.random_range(state.fall_angle_min..=state.fall_angle_max);
    let vel = Vec2::new(
        fall_angle.sin() * speed * state.horizontal_drift,
        fall_angle.cos() * speed,
    );
    let rotation_speed = state.rng.random_range(-physics.spin_range..=physics.spin_range);

    let id = state.next_entity_id();
    state.drops.push(DropEntity {
        id,
        definition_id: def.id.clone(),
        category: def.category,
        payload: def.payload,
        pos: Vec2::new(x, y),
        size,
        vel,
        base_speed: speed,
        rotation: 0.0,
        rotation_speed,
        fall_angle,
        reverse: ReverseState::Normal,
        fate: DropFate::Falling,
    });
    state.record_spawn(&def.id);
    state.push_event(GameEvent::Spawned { id, definition: def.id, category: def.category });
    id
}

/// Advance one entity by a (time-scaled) step. Fate transitions happen
/// here; removal is the tick loop's job.
pub fn advance(drop: &mut DropEntity, state: &mut GameState, config: &GameConfig, dt_secs: f32) {
    if drop.fate != DropFate::Falling {
        return;
    }

    let field = &config.field;
    let physics = &config.physics;
    let reverse_active = state.effects.is_active(EffectKind::ReverseGravity);

    if reverse_active && drop.reverse == ReverseState::Normal {
        enter_reverse(drop, &mut state.rng, physics);
    }

    // A normal-gravity entity drifting upward is a sign error; re-normalize
    if drop.reverse != ReverseState::ReversedActive && drop.vel.y < 0.0 && drop.pos.y > 0.0 {
        log::warn!("drop {} rising under normal gravity, flipping", drop.id);
        drop.vel.y = -drop.vel.y;
    }

    // Fast path: well inside the field, falling near-vertically, barely
    // spinning. Skips spin, air resistance and boundary checks.
    let inside = drop.pos.x > physics.edge_margin
        && drop.pos.x + drop.size.x < field.width - physics.edge_margin;
    if inside
        && drop.vel.x.abs() < physics.drift_epsilon
        && drop.rotation_speed.abs() < physics.spin_threshold
        && drop.reverse != ReverseState::ReversedActive
    {
        drop.pos += drop.vel * dt_secs;
        check_bottom_exit(drop, field.height);
        return;
    }

    if drop.rotation_speed.abs() > physics.spin_threshold {
        drop.rotation += drop.rotation_speed * dt_secs;
    }
    if drop.vel.x.abs() > physics.air_resistance_threshold {
        let reference_ticks = dt_secs * REFERENCE_TICK_RATE;
        drop.vel.x *= physics.air_resistance.powf(reference_ticks);
    }

    drop.pos += drop.vel * dt_secs;

    if drop.reverse == ReverseState::ReversedActive {
        bounce_reversed(drop, physics, field.width);
    } else {
        bounce_normal(drop, physics, field.width);
        check_bottom_exit(drop, field.height);
    }
}

/// First pull into reverse mode: dramatic random angle off straight-up,
/// reduced speed so the player has time to react.
fn enter_reverse(drop: &mut DropEntity, rng: &mut Pcg32, physics: &PhysicsConfig) {
    let angle = rng.random_range(-physics.reverse_max_angle..=physics.reverse_max_angle);
    let mut speed = drop.vel.length();
    if speed < 1.0 {
        speed = drop.base_speed;
    }
    speed *= physics.reverse_speed_factor;

    drop.fall_angle = angle;
    drop.vel = Vec2::new(angle.sin() * speed, -angle.cos() * speed);
    drop.reverse = ReverseState::ReversedActive;
}

/// Wall and top response under normal gravity
fn bounce_normal(drop: &mut DropEntity, physics: &PhysicsConfig, field_width: f32) {
    let params = physics.bounce_params(drop.category);

    if drop.pos.x < 0.0 && drop.vel.x < 0.0 {
        drop.pos.x = 0.0;
        reflect_horizontal(drop, &params);
    } else if drop.pos.x + drop.size.x > field_width && drop.vel.x > 0.0 {
        drop.pos.x = field_width - drop.size.x;
        reflect_horizontal(drop, &params);
    }

    // Top collision is only reachable with upward drift (post-reverse falls)
    if drop.pos.y < 0.0 && drop.vel.y < 0.0 && drop.reverse == ReverseState::ReversedExempt {
        drop.pos.y = 0.0;
        drop.vel.y = -drop.vel.y * params.restitution;
    }
}

fn reflect_horizontal(drop: &mut DropEntity, params: &BounceParams) {
    let reflected = -drop.vel.x * params.restitution;
    drop.vel.x = if reflected.abs() < params.min_bounce_speed { 0.0 } else { reflected };
    drop.vel.y *= params.friction;
    drop.rotation_speed =
        drop.rotation_speed * params.spin_damping + drop.vel.x * params.spin_transfer;
}

/// Boundary response while being pulled upward. The top bounce flips the
/// vertical sign with slight loss, keeps the horizontal component exactly,
/// and exempts the entity until the mode deactivates.
fn bounce_reversed(drop: &mut DropEntity, physics: &PhysicsConfig, field_width: f32) {
    if drop.pos.y <= 0.0 && drop.vel.y < 0.0 {
        drop.pos.y = 0.0;
        drop.vel.y = -drop.vel.y * physics.reverse_top_restitution;
        drop.reverse = ReverseState::ReversedExempt;
    }

    if drop.pos.x < 0.0 && drop.vel.x < 0.0 {
        drop.pos.x = 0.0;
        drop.vel.x = -drop.vel.x * physics.reverse_side_restitution;
    } else if drop.pos.x + drop.size.x > field_width && drop.vel.x > 0.0 {
        drop.pos.x = field_width - drop.size.x;
        drop.vel.x = -drop.vel.x * physics.reverse_side_restitution;
    }
}

/// Normal gravity only: leaving the bottom edge settles the entity
fn check_bottom_exit(drop: &mut DropEntity, field_height: f32) {
    if drop.pos.y > field_height {
        drop.fate = DropFate::Missed;
    }
}

/// Reverse-gravity activation hook: entities still staged above the view
/// are purged (no visual pop), previously exempt entities become eligible
/// again.
pub fn begin_reverse_gravity(state: &mut GameState) {
    for drop in &mut state.drops {
        if drop.fate != DropFate::Falling {
            continue;
        }
        if drop.pos.y + drop.size.y < 0.0 {
            drop.fate = DropFate::Purged;
        } else if drop.reverse == ReverseState::ReversedExempt {
            drop.reverse = ReverseState::Normal;
        }
    }
}

/// Reverse-gravity deactivation hook: entities still rising get a fresh
/// downward fall angle; exempt entities just lose the mark.
pub fn end_reverse_gravity(state: &mut GameState) {
    let (angle_min, angle_max) = (state.fall_angle_min, state.fall_angle_max);
    let drift = state.horizontal_drift;

    for i in 0..state.drops.len() {
        match state.drops[i].reverse {
            ReverseState::Normal => {}
            ReverseState::ReversedExempt => {
                state.drops[i].reverse = ReverseState::Normal;
            }
            ReverseState::ReversedActive => {
                let angle = state.rng.random_range(angle_min..=angle_max);
                let drop = &mut state.drops[i];
                drop.fall_angle = angle;
                drop.vel = Vec2::new(
                    angle.sin() * drop.base_speed * drift,
                    angle.cos() * drop.base_speed,
                );
                drop.reverse = ReverseState::Normal;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::sim::effects::apply_effect;
    use proptest::prelude::*;

    fn setup() -> (GameState, GameConfig) {
        let config = GameConfig::default();
        let state = GameState::new(77, &config);
        (state, config)
    }

    fn test_drop(pos: Vec2, vel: Vec2) -> DropEntity {
        DropEntity {
            id: 1,
            definition_id: "coin".into(),
            category: EntityCategory::Item,
            payload: crate::sim::state::EffectPayload::Score { points: 10 },
            pos,
            size: Vec2::new(40.0, 40.0),
            vel,
            base_speed: vel.length(),
            rotation: 0.0,
            rotation_speed: 0.0,
            fall_angle: 0.0,
            reverse: ReverseState::Normal,
            fate: DropFate::Falling,
        }
    }

    #[test]
    fn test_spawns_stay_in_bounds() {
        let (mut state, config) = setup();
        for i in 0..200 {
            let idx = i % state.pool.len();
            spawn_drop(&mut state, &config, idx);
        }
        for drop in &state.drops {
            assert!(drop.pos.x >= 0.0, "{} at {}", drop.definition_id, drop.pos.x);
            assert!(drop.pos.x + drop.size.x <= config.field.width + 0.01);
            assert!(drop.pos.y < 0.0, "spawns stage above the field");
        }
    }

    #[test]
    fn test_spawn_history_is_pruned() {
        let (mut state, config) = setup();
        for _ in 0..100 {
            spawn_drop(&mut state, &config, 0);
        }
        assert_eq!(state.recent_spawn_ys.len(), config.physics.spawn_history);
    }

    #[test]
    fn test_consecutive_spawns_are_spaced() {
        let (mut state, config) = setup();
        let y1 = stage_spawn_y(&mut state, &config.physics, 40.0);
        let y2 = stage_spawn_y(&mut state, &config.physics, 40.0);
        assert!((y1 - y2).abs() >= config.physics.spawn_spacing);
    }

    #[test]
    fn test_wall_bounce_reflects_with_restitution() {
        let (mut state, mut config) = setup();
        config.physics.item_bounce = BounceParams {
            restitution: 0.6,
            friction: 1.0,
            spin_transfer: 0.0,
            spin_damping: 1.0,
            min_bounce_speed: 0.5,
        };

        let mut drop = test_drop(Vec2::new(-5.0, 100.0), Vec2::new(-3.0, 50.0));
        advance(&mut drop, &mut state, &config, 0.0);

        assert!(drop.pos.x >= 0.0);
        assert!((drop.vel.x - 1.8).abs() < 1e-5);
    }

    #[test]
    fn test_bounce_below_floor_speed_stops() {
        let (mut state, config) = setup();
        let mut drop = test_drop(Vec2::new(-5.0, 100.0), Vec2::new(-3.0, 50.0));
        // Default item floor is well above 3 * 0.6
        advance(&mut drop, &mut state, &config, 0.0);
        assert_eq!(drop.vel.x, 0.0);
    }

    #[test]
    fn test_reverse_entry_reduces_speed_and_aims_up() {
        let (mut state, config) = setup();
        apply_effect(&mut state, EffectKind::ReverseGravity, 0.0, 6.0, None);

        let mut drop = test_drop(Vec2::new(400.0, 300.0), Vec2::new(10.0, 200.0));
        let pre_speed = drop.vel.length();
        advance(&mut drop, &mut state, &config, 0.0);

        assert_eq!(drop.reverse, ReverseState::ReversedActive);
        assert!(drop.vel.y < 0.0, "pulled upward");
        let post_speed = drop.vel.length();
        assert!((post_speed - pre_speed * config.physics.reverse_speed_factor).abs() < 0.01);
        assert!(drop.fall_angle.abs() <= config.physics.reverse_max_angle);
    }

    #[test]
    fn test_top_bounce_preserves_horizontal_exactly() {
        let (mut state, config) = setup();
        apply_effect(&mut state, EffectKind::ReverseGravity, 0.0, 6.0, None);

        let mut drop = test_drop(Vec2::new(400.0, -1.0), Vec2::new(37.5, -100.0));
        drop.reverse = ReverseState::ReversedActive;
        advance(&mut drop, &mut state, &config, 0.0);

        assert_eq!(drop.reverse, ReverseState::ReversedExempt);
        assert_eq!(drop.vel.x, 37.5);
        assert!(drop.vel.y > 0.0, "vertical sign flipped");
        assert!(
            (drop.vel.y - 100.0 * config.physics.reverse_top_restitution).abs() < 1e-4
        );
        assert_eq!(drop.pos.y, 0.0);
    }

    #[test]
    fn test_exempt_entities_ignore_active_reverse_mode() {
        let (mut state, config) = setup();
        apply_effect(&mut state, EffectKind::ReverseGravity, 0.0, 6.0, None);

        let mut drop = test_drop(Vec2::new(400.0, 50.0), Vec2::new(0.0, 120.0));
        drop.reverse = ReverseState::ReversedExempt;
        advance(&mut drop, &mut state, &config, 0.1);

        assert_eq!(drop.reverse, ReverseState::ReversedExempt);
        assert!(drop.vel.y > 0.0, "still falling");
    }

    #[test]
    fn test_reversed_entities_never_exit_the_top() {
        let (mut state, config) = setup();
        apply_effect(&mut state, EffectKind::ReverseGravity, 0.0, 6.0, None);

        let mut drop = test_drop(Vec2::new(400.0, 5.0), Vec2::new(0.0, 200.0));
        let mut bounced = false;
        for _ in 0..600 {
            advance(&mut drop, &mut state, &config, 1.0 / 60.0);
            if drop.reverse == ReverseState::ReversedActive {
                // While rising it may only clamp or bounce, never vanish
                assert_eq!(drop.fate, DropFate::Falling);
                assert!(drop.pos.y >= 0.0);
            } else {
                bounced = true;
            }
            if drop.fate != DropFate::Falling {
                break;
            }
        }
        assert!(bounced, "entity should have bounced off the top");
    }

    #[test]
    fn test_deactivation_resets_to_fresh_downward_fall() {
        let (mut state, config) = setup();
        state.drops.push(test_drop(Vec2::new(400.0, 200.0), Vec2::new(5.0, -80.0)));
        state.drops[0].reverse = ReverseState::ReversedActive;
        state.drops.push(test_drop(Vec2::new(100.0, 300.0), Vec2::new(0.0, 90.0)));
        state.drops[1].reverse = ReverseState::ReversedExempt;

        end_reverse_gravity(&mut state);

        assert_eq!(state.drops[0].reverse, ReverseState::Normal);
        assert!(state.drops[0].vel.y > 0.0, "falls again");
        assert!(state.drops[0].fall_angle >= config.physics.fall_angle_min);
        assert!(state.drops[0].fall_angle <= config.physics.fall_angle_max);
        assert_eq!(state.drops[1].reverse, ReverseState::Normal);
    }

    #[test]
    fn test_activation_purges_staged_entities() {
        let (mut state, _config) = setup();
        state.drops.push(test_drop(Vec2::new(400.0, -200.0), Vec2::new(0.0, 100.0)));
        state.drops.push(test_drop(Vec2::new(400.0, 300.0), Vec2::new(0.0, 100.0)));
        state.drops.push(test_drop(Vec2::new(100.0, 200.0), Vec2::new(0.0, 100.0)));
        state.drops[2].reverse = ReverseState::ReversedExempt;

        begin_reverse_gravity(&mut state);

        assert_eq!(state.drops[0].fate, DropFate::Purged);
        assert_eq!(state.drops[1].fate, DropFate::Falling);
        // Stale exemption cleared, eligible for the new activation
        assert_eq!(state.drops[2].reverse, ReverseState::Normal);
    }

    #[test]
    fn test_bottom_exit_marks_missed() {
        let (mut state, config) = setup();
        let mut drop = test_drop(Vec2::new(400.0, 595.0), Vec2::new(0.0, 200.0));
        advance(&mut drop, &mut state, &config, 0.1);
        assert_eq!(drop.fate, DropFate::Missed);
    }

    #[test]
    fn test_rising_under_normal_gravity_is_renormalized() {
        let (mut state, config) = setup();
        let mut drop = test_drop(Vec2::new(400.0, 300.0), Vec2::new(0.0, -50.0));
        advance(&mut drop, &mut state, &config, 0.0);
        assert!(drop.vel.y > 0.0);
    }

    #[test]
    fn test_fast_path_still_detects_bottom_exit() {
        let (mut state, config) = setup();
        // Dead-center, purely vertical: fast path territory
        let mut drop = test_drop(Vec2::new(380.0, 590.0), Vec2::new(0.0, 300.0));
        advance(&mut drop, &mut state, &config, 0.1);
        assert_eq!(drop.fate, DropFate::Missed);
    }

    #[test]
    fn test_projectile_spawns_cluster_near_center() {
        let (mut state, config) = setup();
        let rock = state.pool.iter().position(|d| d.id == "rock").unwrap();
        let mut total = 0.0;
        let n = 300;
        for _ in 0..n {
            spawn_drop(&mut state, &config, rock);
        }
        for drop in &state.drops {
            total += drop.pos.x + drop.size.x / 2.0;
        }
        let mean = total / n as f32;
        let center = config.field.width / 2.0;
        // Gaussian around center, sigma 25% of width: mean lands close
        assert!((mean - center).abs() < 40.0, "mean {mean}");
    }

    proptest! {
        #[test]
        fn prop_bounce_never_gains_energy(
            speed in 30.0f32..500.0,
            restitution in 0.1f32..0.95,
        ) {
            let (mut state, mut config) = setup();
            config.physics.item_bounce = BounceParams {
                restitution,
                friction: 1.0,
                spin_transfer: 0.0,
                spin_damping: 1.0,
                min_bounce_speed: 0.0,
            };
            let mut drop = test_drop(Vec2::new(-2.0, 100.0), Vec2::new(-speed, 50.0));
            advance(&mut drop, &mut state, &config, 0.0);
            prop_assert!(drop.vel.x.abs() <= speed * restitution + 1e-3);
        }
    }
}
