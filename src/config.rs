//! Game tuning supplied by the host at startup
//!
//! Every tunable constant lives here. The simulation treats the config as
//! read-only; hosts may deserialize a full `GameConfig` from JSON or start
//! from `Default` and override fields.

use serde::{Deserialize, Serialize};

use crate::sim::state::{EffectKind, EffectPayload, EntityCategory, SpawnDefinition};

/// Play field and catcher geometry (pixels, y grows downward)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub width: f32,
    pub height: f32,
    /// Square edge length of an unscaled drop entity
    pub entity_base_size: f32,
    pub catcher_width: f32,
    pub catcher_height: f32,
    /// Horizontal catcher speed cap (pixels/sec)
    pub catcher_max_speed: f32,
    pub max_health: f32,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 600.0,
            entity_base_size: 48.0,
            catcher_width: 110.0,
            catcher_height: 28.0,
            catcher_max_speed: 900.0,
            max_health: 100.0,
        }
    }
}

/// How the current level is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DifficultyMode {
    /// Level follows accumulated score thresholds
    #[default]
    Points,
    /// Each level runs for a duration adjusted by player activity
    Timed,
}

/// A contiguous level range with its own per-level speed increment
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelTier {
    pub from_level: u32,
    pub to_level: u32,
    pub increment: f32,
}

/// Difficulty progression tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub mode: DifficultyMode,

    // === Points mode ===
    /// Score required to reach each level; index 0 is level 0
    pub score_thresholds: Vec<u32>,
    /// Points per extra level once past the last threshold
    pub extra_level_interval: u32,
    /// Reaching this score wins the run (None = endless)
    pub target_score: Option<u32>,

    // === Timed mode ===
    pub base_level_secs: f32,
    /// Floor for the computed level duration
    pub min_level_secs: f32,
    pub collection_bonus_secs: f32,
    pub collection_bonus_cap_secs: f32,
    pub power_up_bonus_secs: f32,
    pub power_up_bonus_cap_secs: f32,
    pub miss_penalty_secs: f32,
    pub miss_penalty_cap_secs: f32,
    pub damage_penalty_secs: f32,
    pub damage_penalty_cap_secs: f32,

    // === Speed formula ===
    pub base_speed_multiplier: f32,
    pub tiers: Vec<LevelTier>,
    /// Exact multiplier overrides for specific low levels
    pub precision_adjustments: Vec<(u32, f32)>,
    /// Cap applied from `high_level_cap_from` upward
    pub high_level_cap: Option<f32>,
    pub high_level_cap_from: u32,
    pub max_multiplier: f32,
    /// Effective multiplier never drops below this, whatever the reductions
    pub multiplier_floor: f32,
    pub permanent_reduction_cap: f32,
    pub set_reduction_cap: f32,
    /// Reduction granted per completed item set
    pub set_reduction_step: f32,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            mode: DifficultyMode::Points,

            score_thresholds: vec![0, 50, 125, 225, 350, 500, 675, 875, 1100, 1350],
            extra_level_interval: 300,
            target_score: None,

            base_level_secs: 45.0,
            min_level_secs: 10.0,
            collection_bonus_secs: 0.25,
            collection_bonus_cap_secs: 10.0,
            power_up_bonus_secs: 2.0,
            power_up_bonus_cap_secs: 6.0,
            miss_penalty_secs: 0.5,
            miss_penalty_cap_secs: 8.0,
            damage_penalty_secs: 1.0,
            damage_penalty_cap_secs: 10.0,

            base_speed_multiplier: 1.0,
            // Fast early ramp, plateau, second ramp, long tail
            tiers: vec![
                LevelTier { from_level: 1, to_level: 10, increment: 0.2 },
                LevelTier { from_level: 11, to_level: 20, increment: 0.1 },
                LevelTier { from_level: 21, to_level: 35, increment: 0.15 },
                LevelTier { from_level: 36, to_level: 50, increment: 0.05 },
                LevelTier { from_level: 51, to_level: u32::MAX, increment: 0.02 },
            ],
            precision_adjustments: vec![(1, 1.1), (2, 1.3), (4, 1.7)],
            high_level_cap: Some(8.0),
            high_level_cap_from: 60,
            max_multiplier: 8.5,
            multiplier_floor: 0.3,
            permanent_reduction_cap: 2.0,
            set_reduction_cap: 1.5,
            set_reduction_step: 0.5,
        }
    }
}

/// Spawn cadence and power-up gating
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Seconds between regular drops at 1.0x speed
    pub drop_interval_secs: f32,
    /// Score milestone interval for power-up spawns
    pub power_up_interval: u32,
    /// Extra one-off power-up spawn scores
    pub custom_power_up_scores: Vec<u32>,
    /// Chance a crossed milestone actually produces a power-up
    pub power_up_chance: f64,
    /// Live-entity cap
    pub max_live_entities: usize,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            drop_interval_secs: 0.9,
            power_up_interval: 100,
            custom_power_up_scores: vec![30, 170],
            power_up_chance: 0.6,
            max_live_entities: 48,
        }
    }
}

/// Per-category boundary bounce response
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BounceParams {
    /// Fraction of speed retained after a bounce
    pub restitution: f32,
    /// Decay applied to the non-reflected velocity component
    pub friction: f32,
    /// Spin imparted per unit of reflected speed
    pub spin_transfer: f32,
    pub spin_damping: f32,
    /// Below this reflected speed the bounce kills the component
    pub min_bounce_speed: f32,
}

/// Trajectory physics tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Base fall speed at 1.0x multipliers (pixels/sec)
    pub global_base_speed: f32,
    /// Default fall-angle bounds (radians off vertical, effects may override)
    pub fall_angle_min: f32,
    pub fall_angle_max: f32,
    /// Default horizontal drift factor (effects may override)
    pub horizontal_drift: f32,
    /// Spawn rotation speed magnitude cap (radians/sec)
    pub spin_range: f32,
    /// Below this rotation speed spin updates are skipped
    pub spin_threshold: f32,
    /// Per-reference-tick horizontal decay factor
    pub air_resistance: f32,
    /// Horizontal speed above which air resistance applies (pixels/sec)
    pub air_resistance_threshold: f32,
    /// Distance from the side walls inside which full physics runs
    pub edge_margin: f32,
    /// Horizontal speed below which an inner entity takes the fast path
    pub drift_epsilon: f32,
    /// Minimum vertical gap between recent spawn staging positions
    pub spawn_spacing: f32,
    /// How many recent staging Y positions are remembered
    pub spawn_history: usize,

    pub item_bounce: BounceParams,
    pub projectile_bounce: BounceParams,
    pub power_up_bounce: BounceParams,

    // === Reverse gravity ===
    /// Speed retained when an entity is first pulled upward
    pub reverse_speed_factor: f32,
    /// Max deviation from straight-up for the entry angle (radians)
    pub reverse_max_angle: f32,
    /// Vertical energy retained bouncing off the top
    pub reverse_top_restitution: f32,
    /// Energy retained reflecting off the side walls while reversed
    pub reverse_side_restitution: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            global_base_speed: 160.0,
            fall_angle_min: -0.44,
            fall_angle_max: 0.44,
            horizontal_drift: 1.0,
            spin_range: 2.5,
            spin_threshold: 0.05,
            air_resistance: 0.985,
            air_resistance_threshold: 20.0,
            edge_margin: 16.0,
            drift_epsilon: 8.0,
            spawn_spacing: 40.0,
            spawn_history: 20,

            item_bounce: BounceParams {
                restitution: 0.6,
                friction: 0.97,
                spin_transfer: 0.015,
                spin_damping: 0.7,
                min_bounce_speed: 25.0,
            },
            projectile_bounce: BounceParams {
                restitution: 0.45,
                friction: 0.9,
                spin_transfer: 0.03,
                spin_damping: 0.55,
                min_bounce_speed: 40.0,
            },
            power_up_bounce: BounceParams {
                restitution: 0.65,
                friction: 0.97,
                spin_transfer: 0.012,
                spin_damping: 0.7,
                min_bounce_speed: 25.0,
            },

            reverse_speed_factor: 0.65,
            reverse_max_angle: 0.7,
            reverse_top_restitution: 0.92,
            reverse_side_restitution: 0.85,
        }
    }
}

impl PhysicsConfig {
    /// Bounce response constants for an entity category
    pub fn bounce_params(&self, category: EntityCategory) -> BounceParams {
        match category {
            EntityCategory::Item => self.item_bounce,
            EntityCategory::Projectile => self.projectile_bounce,
            EntityCategory::PowerUp => self.power_up_bounce,
        }
    }
}

/// Effect scheduler tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectConfig {
    /// Shared damage-over-time tick interval
    pub dot_tick_secs: f32,
    /// Shared heal-over-time tick interval
    pub hot_tick_secs: f32,
    /// Dodge rating cap (percentage points)
    pub dodge_cap: f32,
    /// Dodge granted when a duration spell with an aftereffect expires
    pub aftereffect_dodge_bonus: f32,
    pub aftereffect_dodge_secs: f32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            dot_tick_secs: 1.0,
            hot_tick_secs: 1.0,
            dodge_cap: 75.0,
            aftereffect_dodge_bonus: 30.0,
            aftereffect_dodge_secs: 8.0,
        }
    }
}

/// A player-castable ability gated by a cooldown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilityDef {
    pub id: String,
    pub cooldown_secs: f32,
    pub effect: EffectKind,
    pub magnitude: f32,
    pub duration_secs: f32,
    /// Dodge bonus granted when the effect expires (trance-style spells)
    pub expiry_dodge_bonus: Option<f32>,
}

/// Complete simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub field: FieldConfig,
    pub difficulty: DifficultyConfig,
    pub spawn: SpawnConfig,
    pub physics: PhysicsConfig,
    pub effects: EffectConfig,
    pub abilities: Vec<AbilityDef>,
    pub pool: Vec<SpawnDefinition>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field: FieldConfig::default(),
            difficulty: DifficultyConfig::default(),
            spawn: SpawnConfig::default(),
            physics: PhysicsConfig::default(),
            effects: EffectConfig::default(),
            abilities: default_abilities(),
            pool: default_pool(),
        }
    }
}

fn default_abilities() -> Vec<AbilityDef> {
    vec![
        // Risk spell: drops fall faster, but expiry leaves a dodge window
        AbilityDef {
            id: "battle_trance".into(),
            cooldown_secs: 45.0,
            effect: EffectKind::SpeedBoost,
            magnitude: 1.5,
            duration_secs: 10.0,
            expiry_dodge_bonus: Some(30.0),
        },
        AbilityDef {
            id: "stoneskin".into(),
            cooldown_secs: 30.0,
            effect: EffectKind::Shield,
            magnitude: 0.0,
            duration_secs: 6.0,
            expiry_dodge_bonus: None,
        },
        AbilityDef {
            id: "slow_fall".into(),
            cooldown_secs: 25.0,
            effect: EffectKind::TimeSlow,
            magnitude: 0.5,
            duration_secs: 5.0,
            expiry_dodge_bonus: None,
        },
    ]
}

/// The stock spawn pool. Hosts usually replace this wholesale.
fn default_pool() -> Vec<SpawnDefinition> {
    use EffectKind::*;
    use EffectPayload::*;
    use EntityCategory::*;

    let def = |id: &str, category, base_probability, size_multiplier, speed_variation, payload| {
        SpawnDefinition {
            id: id.into(),
            category,
            base_probability,
            size_multiplier,
            speed_variation,
            level_scaling: true,
            health_scaling: false,
            speed_scaling: true,
            one_shot: false,
            payload,
        }
    };

    let mut pool = vec![
        def("coin", Item, 1.0, 0.8, (0.85, 1.15), Score { points: 10 }),
        def("gem", Item, 0.25, 0.7, (0.9, 1.25), Score { points: 50 }),
        def("rock", Projectile, 0.55, 1.0, (0.7, 1.3), Damage { amount: 10.0 }),
        def(
            "firebolt",
            Projectile,
            0.2,
            0.9,
            (0.8, 1.3),
            Dot { impact: 6.0, per_tick: 2.0, duration_secs: 6.0 },
        ),
        def(
            "hourglass",
            PowerUp,
            0.35,
            1.0,
            (0.6, 0.9),
            Buff { kind: TimeSlow, magnitude: 0.45, duration_secs: 8.0 },
        ),
        def(
            "frost_sigil",
            PowerUp,
            0.15,
            1.0,
            (0.6, 0.9),
            Buff { kind: Freeze, magnitude: 0.0, duration_secs: 3.0 },
        ),
        def(
            "aegis",
            PowerUp,
            0.3,
            1.0,
            (0.6, 1.0),
            Buff { kind: Shield, magnitude: 0.0, duration_secs: 10.0 },
        ),
        def(
            "updraft",
            PowerUp,
            0.2,
            1.0,
            (0.6, 1.0),
            Buff { kind: ReverseGravity, magnitude: 0.0, duration_secs: 6.0 },
        ),
        def(
            "plumb_weight",
            PowerUp,
            0.2,
            1.0,
            (0.6, 1.0),
            Buff { kind: SteepFall, magnitude: 0.25, duration_secs: 12.0 },
        ),
        def(
            "calm_air",
            PowerUp,
            0.2,
            1.0,
            (0.6, 1.0),
            Buff { kind: DriftDamp, magnitude: 0.4, duration_secs: 12.0 },
        ),
    ];

    // Healing drops pull ahead when health runs low
    let mut health_pack = def("health_pack", PowerUp, 0.5, 1.0, (0.6, 1.0), Heal { amount: 25.0 });
    health_pack.health_scaling = true;
    pool.push(health_pack);

    let mut feast = def(
        "mending_feast",
        PowerUp,
        0.3,
        1.0,
        (0.6, 1.0),
        Hot { per_tick: 3.0, duration_secs: 10.0 },
    );
    feast.health_scaling = true;
    pool.push(feast);

    // One-shot rarities
    let mut idol = def("golden_idol", Item, 0.05, 0.7, (0.9, 1.2), Score { points: 250 });
    idol.one_shot = true;
    pool.push(idol);

    let mut anchor = def(
        "anchor_charm",
        PowerUp,
        0.08,
        1.0,
        (0.6, 0.9),
        PermanentSlow { amount: 0.5 },
    );
    anchor.one_shot = true;
    pool.push(anchor);

    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let config = GameConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.pool.len(), config.pool.len());
        assert_eq!(back.difficulty.score_thresholds, config.difficulty.score_thresholds);
    }

    #[test]
    fn test_default_pool_is_well_formed() {
        for def in default_pool() {
            assert!(def.base_probability > 0.0, "{}", def.id);
            assert!(def.speed_variation.0 <= def.speed_variation.1, "{}", def.id);
            assert!(def.size_multiplier > 0.0, "{}", def.id);
        }
    }

    #[test]
    fn test_tiers_cover_all_levels() {
        let cfg = DifficultyConfig::default();
        let mut next = 1;
        for tier in &cfg.tiers {
            assert_eq!(tier.from_level, next);
            next = tier.to_level.saturating_add(1);
        }
    }
}
