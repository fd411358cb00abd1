// Tunables for the minigame, loaded from an optional TOML file.
// Every field has a default, so an empty file (or no file) is a valid config.

use std::path::Path;

use bevy_ecs::prelude::*;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Hexagon floor layout.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArenaConfig {
    /// Rings around the centre tile; 0 = a single tile.
    pub rings: u32,
    /// Centre-to-centre spacing basis (circumradius of the layout grid).
    pub tile_size: f32,
    /// Shrink applied to each tile's circumradius to leave a visible seam.
    pub tile_gap: f32,
    pub tile_height: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            rings: 4,
            tile_size: 1.5,
            tile_gap: 0.06,
            tile_height: 0.4,
        }
    }
}

/// Round manager timings (seconds).
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoundConfig {
    pub start_delay: f32,
    pub selection_duration: f32,
    /// Warning length in round 1.
    pub warning_duration: f32,
    /// Shaved off the warning every round after the first.
    pub warning_decrement: f32,
    pub min_warning_duration: f32,
    pub drop_duration: f32,
    /// Minimum time spent waiting for regeneration before the next round.
    pub intermission: f32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            start_delay: 3.0,
            selection_duration: 1.5,
            warning_duration: 4.0,
            warning_decrement: 0.25,
            min_warning_duration: 1.5,
            drop_duration: 1.0,
            intermission: 1.0,
        }
    }
}

impl RoundConfig {
    /// Warning length for a 1-based round number.
    pub fn warning_for_round(&self, round: u32) -> f32 {
        let ramp = self.warning_decrement * round.saturating_sub(1) as f32;
        (self.warning_duration - ramp).max(self.min_warning_duration)
    }
}

/// Hexagon fall/regeneration tunables.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TileConfig {
    /// Seconds after the fall starts before the collider goes inert.
    pub collider_disable_delay: f32,
    /// Seconds after the fall starts before the tile is restored.
    pub regeneration_delay: f32,
    /// Material applied while falling.
    pub falling_tint: [f32; 3],
    /// Blink half-period for tiles about to drop during the warning.
    pub blink_period: f32,
    /// Maximum tumble speed (radians/sec) given to a falling tile.
    pub tumble: f32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            collider_disable_delay: 0.5,
            regeneration_delay: 3.0,
            falling_tint: [0.25, 0.25, 0.28],
            blink_period: 0.25,
            tumble: 0.6,
        }
    }
}

/// NPC wander/fall tunables.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NpcConfig {
    pub count: u32,
    pub speed: f32,
    pub radius: f32,
    pub height: f32,
    pub wander_radius: f32,
    pub wander_interval: f32,
    pub stopping_distance: f32,
    /// Probe length below the feet for the grounded check.
    pub ground_check_distance: f32,
    /// Downward speed past which an ungrounded NPC counts as fallen.
    pub fall_velocity_threshold: f32,
    pub despawn_delay: f32,
    /// Chance an NPC runs for a safe tile when the warning starts.
    pub seek_safe_chance: f32,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            count: 16,
            speed: 3.5,
            radius: 0.3,
            height: 1.2,
            wander_radius: 6.0,
            wander_interval: 4.0,
            stopping_distance: 0.2,
            ground_check_distance: 0.3,
            fall_velocity_threshold: 2.0,
            despawn_delay: 3.0,
            seek_safe_chance: 0.6,
        }
    }
}

/// Flag prop tunables.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlagConfig {
    pub raise_duration: f32,
    pub roulette_interval: f32,
    pub pole_height: f32,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            raise_duration: 0.4,
            roulette_interval: 0.12,
            pole_height: 4.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhysicsConfig {
    pub gravity: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self { gravity: 9.81 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    /// Fixed RNG seed; random per run when unset.
    pub seed: Option<u64>,
    /// Frames longer than this are clamped (seconds).
    pub max_frame_delta: f32,
    pub arena: ArenaConfig,
    pub round: RoundConfig,
    pub tile: TileConfig,
    pub npc: NpcConfig,
    pub flag: FlagConfig,
    pub physics: PhysicsConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: None,
            max_frame_delta: 0.1,
            arena: ArenaConfig::default(),
            round: RoundConfig::default(),
            tile: TileConfig::default(),
            npc: NpcConfig::default(),
            flag: FlagConfig::default(),
            physics: PhysicsConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            log::info!("loading config from {}", path.display());
            Self::load(path)
        } else {
            log::info!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("max_frame_delta", self.max_frame_delta)?;

        positive("arena.tile_size", self.arena.tile_size)?;
        positive("arena.tile_height", self.arena.tile_height)?;
        if self.arena.tile_gap < 0.0 || self.arena.tile_gap >= self.arena.tile_size {
            return Err(invalid("arena.tile_gap", "must be in [0, tile_size)"));
        }

        non_negative("round.start_delay", self.round.start_delay)?;
        positive("round.selection_duration", self.round.selection_duration)?;
        positive("round.warning_duration", self.round.warning_duration)?;
        non_negative("round.warning_decrement", self.round.warning_decrement)?;
        positive("round.min_warning_duration", self.round.min_warning_duration)?;
        positive("round.drop_duration", self.round.drop_duration)?;
        non_negative("round.intermission", self.round.intermission)?;

        positive("tile.collider_disable_delay", self.tile.collider_disable_delay)?;
        if self.tile.regeneration_delay <= self.tile.collider_disable_delay {
            return Err(invalid(
                "tile.regeneration_delay",
                "must be greater than tile.collider_disable_delay",
            ));
        }
        positive("tile.blink_period", self.tile.blink_period)?;
        non_negative("tile.tumble", self.tile.tumble)?;

        positive("npc.speed", self.npc.speed)?;
        positive("npc.radius", self.npc.radius)?;
        positive("npc.height", self.npc.height)?;
        positive("npc.wander_radius", self.npc.wander_radius)?;
        positive("npc.wander_interval", self.npc.wander_interval)?;
        non_negative("npc.stopping_distance", self.npc.stopping_distance)?;
        positive("npc.ground_check_distance", self.npc.ground_check_distance)?;
        positive("npc.fall_velocity_threshold", self.npc.fall_velocity_threshold)?;
        non_negative("npc.despawn_delay", self.npc.despawn_delay)?;
        if !(0.0..=1.0).contains(&self.npc.seek_safe_chance) {
            return Err(invalid("npc.seek_safe_chance", "must be in [0, 1]"));
        }

        positive("flag.raise_duration", self.flag.raise_duration)?;
        positive("flag.roulette_interval", self.flag.roulette_interval)?;
        positive("flag.pole_height", self.flag.pole_height)?;

        positive("physics.gravity", self.physics.gravity)?;

        // One clamped frame must not skip a whole drop or collider window.
        let shortest = self.round.drop_duration.min(self.tile.collider_disable_delay);
        if self.max_frame_delta >= shortest {
            return Err(ConfigError::Invalid {
                field: "max_frame_delta",
                reason: format!(
                    "must be less than round.drop_duration and tile.collider_disable_delay ({shortest})"
                ),
            });
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.to_string() }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be > 0, got {value}") })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid { field, reason: format!("must be >= 0, got {value}") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn defaults_validate() {
        GameConfig::default().validate().unwrap();
        GameConfig::from_toml_str("").unwrap();
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config = GameConfig::from_toml_str(
            "seed = 42\n[arena]\nrings = 2\n[npc]\ncount = 3\n",
        )
        .unwrap();
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.arena.rings, 2);
        assert_eq!(config.npc.count, 3);
        assert_relative_eq!(config.tile.collider_disable_delay, 0.5);
    }

    #[rstest]
    #[case("[tile]\nregeneration_delay = 0.2\n", "tile.regeneration_delay")]
    #[case("[arena]\ntile_gap = 2.0\n", "arena.tile_gap")]
    #[case("[npc]\nseek_safe_chance = 1.5\n", "npc.seek_safe_chance")]
    #[case("[round]\nwarning_duration = 0.0\n", "round.warning_duration")]
    #[case("[physics]\ngravity = -1.0\n", "physics.gravity")]
    #[case("max_frame_delta = 0.6\n", "max_frame_delta")]
    #[case("max_frame_delta = 0.3\n[round]\ndrop_duration = 0.25\n", "max_frame_delta")]
    fn rejects_invalid_values(#[case] text: &str, #[case] expected: &str) {
        match GameConfig::from_toml_str(text) {
            Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
            other => panic!("expected Invalid({expected}), got {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        assert!(matches!(
            GameConfig::from_toml_str("[npc]\nwander = 1\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = GameConfig::load_or_default(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.arena.rings, ArenaConfig::default().rings);
    }

    #[rstest]
    #[case(1, 4.0)]
    #[case(2, 3.75)]
    #[case(5, 3.0)]
    #[case(50, 1.5)]
    fn warning_ramps_down_to_floor(#[case] round: u32, #[case] expected: f32) {
        assert_relative_eq!(RoundConfig::default().warning_for_round(round), expected);
    }
}
