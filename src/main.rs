//! Skydrop headless demo
//!
//! Drives the simulation core with a simple chase AI at the reference
//! tick rate and logs the outcome. Useful for smoke-testing tuning
//! changes without a renderer.

use skydrop::config::GameConfig;
use skydrop::consts::REFERENCE_DT;
use skydrop::sim::{EntityCategory, GameEvent, GamePhase, GameState, TickInput, tick};

fn main() {
    env_logger::init();

    let config = GameConfig::default();
    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(0xC0FFEE);
    let mut state = GameState::new(seed, &config);
    log::info!("demo run, seed {seed}");

    let mut input = TickInput::default();
    // Ten minutes at the reference rate, or until the run ends
    for tick_index in 0..36_000u32 {
        input.target_x = pick_target(&state, config.field.width);
        input.cast = (tick_index % 600 == 0).then(|| "stoneskin".to_string());

        tick(&mut state, &input, &config, REFERENCE_DT);

        for event in state.drain_events() {
            match event {
                GameEvent::LevelUp { level } => log::info!("level {level}"),
                GameEvent::PhaseChanged { phase } => log::info!("phase: {phase:?}"),
                GameEvent::SetCompleted { count } => log::info!("item set {count} complete"),
                GameEvent::EffectActivated { kind } => log::debug!("effect on: {kind:?}"),
                GameEvent::EffectExpired { kind } => log::debug!("effect off: {kind:?}"),
                _ => {}
            }
        }

        if state.phase != GamePhase::Playing {
            break;
        }
    }

    log::info!(
        "run over: score {} level {} health {:.0} misses {}",
        state.score,
        state.current_level,
        state.health,
        state.miss_count
    );
}

/// Chase the lowest catchable drop; with nothing worth catching, sidestep
/// away from the nearest projectile.
fn pick_target(state: &GameState, field_width: f32) -> Option<f32> {
    let mut best: Option<(f32, f32)> = None;
    for drop in &state.drops {
        if drop.category == EntityCategory::Projectile || drop.vel.y <= 0.0 {
            continue;
        }
        if best.is_none_or(|(y, _)| drop.pos.y > y) {
            best = Some((drop.pos.y, drop.center_x()));
        }
    }
    if let Some((_, x)) = best {
        return Some(x);
    }

    let threat = state
        .drops
        .iter()
        .filter(|d| d.category == EntityCategory::Projectile)
        .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y));
    threat.map(|t| {
        if t.center_x() < field_width / 2.0 {
            field_width * 0.85
        } else {
            field_width * 0.15
        }
    })
}
