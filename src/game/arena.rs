// Scene setup: the hexagon floor, the NPC crowd and the flag prop.

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec3};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::engine::{Animator, Collider, ColliderShape, Material, NavAgent, RigidBody, Transform};
use super::config::{ArenaConfig, FlagConfig, NpcConfig};
use super::flag::Flag;
use super::hex_color::HexColor;
use super::hexagon::HexTile;
use super::npc::Npc;
use super::round::RoundEvent;

/// Survivor bookkeeping shared by the round manager and the HUD.
#[derive(Resource, Debug, Clone, Default)]
pub struct ArenaStats {
    pub alive: u32,
    pub eliminated_total: u32,
    pub eliminated_this_round: u32,
    pub last_survivors: Option<u32>,
}

impl ArenaStats {
    pub fn record_elimination(&mut self) {
        self.eliminated_total += 1;
        self.eliminated_this_round += 1;
    }
}

/// Axial coordinates of every tile in a hexagon of `rings` rings.
pub fn axial_coords(rings: u32) -> Vec<IVec2> {
    let n = rings as i32;
    let mut coords = Vec::with_capacity(tile_count(rings));
    for q in -n..=n {
        let r_min = (-n).max(-q - n);
        let r_max = n.min(-q + n);
        for r in r_min..=r_max {
            coords.push(IVec2::new(q, r));
        }
    }
    coords
}

pub fn tile_count(rings: u32) -> usize {
    let r = rings as usize;
    3 * r * (r + 1) + 1
}

/// Flat-top axial → world XZ (y = 0).
pub fn axial_to_world(coord: IVec2, size: f32) -> Vec3 {
    let q = coord.x as f32;
    let r = coord.y as f32;
    Vec3::new(size * 1.5 * q, 0.0, size * 3.0_f32.sqrt() * (r + q * 0.5))
}

/// Distance from the arena centre to the outermost tile corner.
pub fn arena_radius(config: &ArenaConfig) -> f32 {
    config.tile_size * (3.0_f32.sqrt() * config.rings as f32 + 1.0)
}

/// Deal colours round-robin (so each appears when there are enough tiles),
/// then shuffle their placement.
pub fn deal_colors(count: usize, rng: &mut impl Rng) -> Vec<HexColor> {
    let mut colors: Vec<HexColor> = (0..count).map(|i| HexColor::ALL[i % HexColor::ALL.len()]).collect();
    colors.shuffle(rng);
    colors
}

pub fn spawn_tiles(world: &mut World, config: &ArenaConfig, rng: &mut impl Rng) -> Vec<Entity> {
    let coords = axial_coords(config.rings);
    let colors = deal_colors(coords.len(), rng);
    let circumradius = config.tile_size - config.tile_gap;

    let entities: Vec<Entity> = coords
        .into_iter()
        .zip(colors)
        .map(|(coord, color)| {
            let transform = Transform::from_position(axial_to_world(coord, config.tile_size))
                .with_scale(Vec3::new(circumradius, config.tile_height, circumradius));
            world
                .spawn((
                    HexTile::new(color, coord, transform),
                    transform,
                    RigidBody::kinematic(),
                    Collider::hex_prism(circumradius, config.tile_height),
                    color.rgb(),
                ))
                .id()
        })
        .collect();

    log::info!("spawned {} tiles ({} rings)", entities.len(), config.rings);
    entities
}

/// Place NPCs on random, distinct tiles.
pub fn spawn_npcs(world: &mut World, config: &NpcConfig, rng: &mut impl Rng) -> Vec<Entity> {
    let mut spots: Vec<(Vec3, f32)> = world
        .query::<(&HexTile, &Collider)>()
        .iter(world)
        .map(|(tile, collider)| {
            let radius = match collider.shape {
                ColliderShape::HexPrism(prism) => prism.circumradius,
                ColliderShape::Capsule { radius, .. } => radius,
            };
            (tile.original_transform().position, radius)
        })
        .collect();
    spots.shuffle(rng);

    let count = config.count as usize;
    if count > spots.len() {
        log::warn!("{} NPCs requested but only {} tiles; spawning {}", count, spots.len(), spots.len());
    }

    let entities: Vec<Entity> = spots
        .into_iter()
        .take(count)
        .map(|(center, tile_radius)| {
            // Jitter inside the hexagon's inscribed circle.
            let reach = (tile_radius * 0.5).max(0.0);
            let offset = Vec3::new(rng.gen_range(-reach..=reach), 0.0, rng.gen_range(-reach..=reach));
            world
                .spawn((
                    Npc::new(rng.gen_range(0.0..config.wander_interval)),
                    NavAgent::new(config.speed, config.stopping_distance),
                    Transform::from_position(center + offset),
                    RigidBody::dynamic(),
                    Collider::capsule(config.radius, config.height),
                    Animator::default(),
                    Material::rgb(0.92, 0.92, 0.88),
                ))
                .id()
        })
        .collect();

    log::info!("spawned {} NPCs", entities.len());
    entities
}

/// Flag pole just outside the arena edge.
pub fn spawn_flag(world: &mut World, arena: &ArenaConfig, flag: &FlagConfig) -> Entity {
    let position = Vec3::new(0.0, 0.0, -(arena_radius(arena) + 1.5));
    world
        .spawn((
            Flag::new(),
            Transform::from_position(position).with_scale(Vec3::new(1.0, flag.pole_height, 1.0)),
            Material::rgb(0.8, 0.8, 0.8),
        ))
        .id()
}

/// Recount survivors and roll per-round counters.
pub fn arena_stats_system(
    mut events: EventReader<RoundEvent>,
    mut stats: ResMut<ArenaStats>,
    npcs: Query<&Npc>,
) {
    for event in events.read() {
        match *event {
            RoundEvent::SelectionStarted { .. } => stats.eliminated_this_round = 0,
            RoundEvent::RoundCompleted { survivors, .. } => stats.last_survivors = Some(survivors),
            _ => {}
        }
    }
    let alive = npcs.iter().filter(|npc| !npc.is_fallen()).count() as u32;
    if stats.alive != alive {
        stats.alive = alive;
    }
}
