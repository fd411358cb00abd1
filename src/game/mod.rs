// Game module - the musical-hexagons behaviours built on the engine layer

pub mod arena;
pub mod config;
pub mod flag;
pub mod hex_color;
pub mod hexagon;
pub mod npc;
pub mod round;
pub mod simulation;

use bevy_ecs::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

pub use config::GameConfig;
pub use hex_color::HexColor;
pub use simulation::Simulation;

/// Shared random source so a fixed seed replays the same game.
#[derive(Resource)]
pub struct GameRng(pub StdRng);

impl GameRng {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(StdRng::seed_from_u64(seed)),
            None => Self(StdRng::from_entropy()),
        }
    }
}
