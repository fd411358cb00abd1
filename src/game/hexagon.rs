// Hexagon controller: per-tile fall / regenerate lifecycle.
//
//   Standing ─start_falling()─▶ Falling ─+collider_disable_delay─▶ Regenerating ─+regeneration_delay─▶ Standing
//
// Both delays are measured from the moment the fall starts. The collider is
// always inert before the tile is put back.

use bevy_ecs::prelude::*;
use glam::{IVec2, Vec3};
use rand::Rng;

use crate::engine::{Collider, ColliderShape, Material, NavCell, NavMesh, RigidBody, Time, Transform};
use super::config::TileConfig;
use super::hex_color::HexColor;
use super::round::{RoundEvent, RoundManager, RoundPhase};
use super::GameRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// Solid and walkable.
    Standing,
    /// Dropping with its collider still live.
    Falling,
    /// Collider inert, waiting to be restored.
    Regenerating,
}

#[derive(Component, Debug, Clone)]
pub struct HexTile {
    pub color: HexColor,
    /// Axial grid coordinate (q, r).
    pub coord: IVec2,
    /// True when `color` is this round's safe colour.
    pub safe: bool,
    state: TileState,
    fall_elapsed: f32,
    original: Transform,
    original_material: Material,
}

impl HexTile {
    pub fn new(color: HexColor, coord: IVec2, original: Transform) -> Self {
        Self {
            color,
            coord,
            safe: false,
            state: TileState::Standing,
            fall_elapsed: 0.0,
            original,
            original_material: color.rgb(),
        }
    }

    pub fn state(&self) -> TileState { self.state }
    pub fn is_standing(&self) -> bool { self.state == TileState::Standing }
    pub fn original_transform(&self) -> Transform { self.original }
    pub fn original_material(&self) -> Material { self.original_material }

    /// Drop the tile. Ignored unless the tile is standing.
    pub fn start_falling(
        &mut self,
        body: &mut RigidBody,
        material: Option<&mut Material>,
        falling_tint: Material,
        tumble: Vec3,
    ) -> bool {
        if self.state != TileState::Standing {
            log::debug!("tile {:?} is already {:?}, ignoring drop", self.coord, self.state);
            return false;
        }
        self.state = TileState::Falling;
        self.fall_elapsed = 0.0;
        body.kinematic = false;
        body.velocity = Vec3::ZERO;
        body.angular_velocity = tumble;
        match material {
            Some(material) => *material = falling_tint,
            None => log::debug!("tile {:?} has no material, skipping tint", self.coord),
        }
        true
    }

    /// Advance the fall timers. Returns the new state when it changed.
    pub fn tick(
        &mut self,
        dt: f32,
        config: &TileConfig,
        transform: &mut Transform,
        body: &mut RigidBody,
        collider: &mut Collider,
        material: Option<&mut Material>,
    ) -> Option<TileState> {
        if self.state == TileState::Standing {
            return None;
        }
        self.fall_elapsed += dt;

        if self.fall_elapsed >= config.regeneration_delay {
            // Also covers a frame long enough to skip the Regenerating step.
            collider.enabled = false;
            self.regenerate(transform, body, collider, material);
            return Some(TileState::Standing);
        }
        if self.state == TileState::Falling && self.fall_elapsed >= config.collider_disable_delay {
            collider.enabled = false;
            self.state = TileState::Regenerating;
            return Some(TileState::Regenerating);
        }
        None
    }

    /// Put the tile back exactly as it was spawned.
    pub fn regenerate(
        &mut self,
        transform: &mut Transform,
        body: &mut RigidBody,
        collider: &mut Collider,
        material: Option<&mut Material>,
    ) {
        *transform = self.original;
        body.freeze();
        collider.enabled = true;
        if let Some(material) = material {
            *material = self.original_material;
        }
        self.state = TileState::Standing;
        self.fall_elapsed = 0.0;
    }
}

fn random_tumble(rng: &mut impl Rng, max: f32) -> Vec3 {
    if max <= 0.0 {
        return Vec3::ZERO;
    }
    Vec3::new(rng.gen_range(-max..max), 0.0, rng.gen_range(-max..max))
}

/// Apply round events: mark safe tiles, drop the rest.
pub fn hexagon_round_events_system(
    mut events: EventReader<RoundEvent>,
    config: Res<TileConfig>,
    mut rng: ResMut<GameRng>,
    mut tiles: Query<(&mut HexTile, &mut RigidBody, Option<&mut Material>)>,
) {
    let tint = Material::rgb(config.falling_tint[0], config.falling_tint[1], config.falling_tint[2]);
    for event in events.read() {
        match *event {
            RoundEvent::SelectionStarted { .. } => {
                for (mut tile, _, _) in tiles.iter_mut() {
                    tile.safe = false;
                }
            }
            RoundEvent::SafeColorChosen { color, .. } => {
                for (mut tile, _, _) in tiles.iter_mut() {
                    tile.safe = tile.color == color;
                }
            }
            RoundEvent::TilesDropped { color, .. } => {
                let mut dropped = 0;
                for (mut tile, mut body, mut material) in tiles.iter_mut() {
                    if tile.color == color {
                        continue;
                    }
                    // Undo any warning blink before the tint goes on.
                    if let Some(material) = material.as_deref_mut() {
                        *material = tile.original_material();
                    }
                    let tumble = random_tumble(&mut rng.0, config.tumble);
                    if tile.start_falling(&mut body, material.as_deref_mut(), tint, tumble) {
                        dropped += 1;
                    }
                }
                log::debug!("{} tiles dropped", dropped);
            }
            _ => {}
        }
    }
}

/// Blink tiles that are about to drop while the warning runs.
pub fn hexagon_blink_system(
    manager: Res<RoundManager>,
    config: Res<TileConfig>,
    mut tiles: Query<(&HexTile, &mut Material)>,
) {
    let warning = manager.phase() == RoundPhase::Warning;
    let blink_on = warning && ((manager.phase_remaining() / config.blink_period) as u32) % 2 == 0;
    let tint = Material::rgb(config.falling_tint[0], config.falling_tint[1], config.falling_tint[2]);

    for (tile, mut material) in tiles.iter_mut() {
        if !tile.is_standing() {
            continue;
        }
        let target = if warning && !tile.safe && blink_on {
            tile.original_material().lerp(tint, 0.6)
        } else {
            tile.original_material()
        };
        // Avoid tripping change detection on every tile every frame.
        if *material != target {
            *material = target;
        }
    }
}

/// Run every tile's fall timers.
pub fn hexagon_lifecycle_system(
    time: Res<Time>,
    config: Res<TileConfig>,
    mut tiles: Query<(
        &mut HexTile,
        &mut Transform,
        &mut RigidBody,
        &mut Collider,
        Option<&mut Material>,
    )>,
) {
    for (mut tile, mut transform, mut body, mut collider, mut material) in tiles.iter_mut() {
        if let Some(state) = tile.tick(
            time.delta,
            &config,
            &mut transform,
            &mut body,
            &mut collider,
            material.as_deref_mut(),
        ) {
            log::trace!("tile {:?} -> {:?}", tile.coord, state);
        }
    }
}

/// Publish the standing tiles as this frame's walkable floor.
pub fn rebuild_nav_mesh_system(
    mut navmesh: ResMut<NavMesh>,
    tiles: Query<(Entity, &HexTile, &Transform, &Collider)>,
) {
    navmesh.clear();
    for (entity, tile, transform, collider) in tiles.iter() {
        if !tile.is_standing() || !collider.enabled {
            continue;
        }
        if let ColliderShape::HexPrism(prism) = collider.shape {
            navmesh.push(NavCell { entity, center: transform.position, prism });
        }
    }
}
