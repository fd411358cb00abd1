// NPC controller: wander the floor, notice when the floor is gone.
//
//   IdleAtDestination ⇄ Moving ──(ungrounded and dropping fast)──▶ Fallen ──despawn_delay──▶ despawned
//
// The brain runs before steering and physics; grounding runs after physics
// so the next frame's brain sees where the body actually ended up.

use bevy_ecs::prelude::*;
use glam::Vec3;
use rand::Rng;

use crate::engine::{
    AnimationClip, Animator, Collider, Lifetime, NavAgent, NavMesh, RigidBody, Time, Transform,
    raycast_down,
};
use super::arena::ArenaStats;
use super::config::NpcConfig;
use super::hex_color::HexColor;
use super::hexagon::HexTile;
use super::round::RoundEvent;
use super::GameRng;

/// Height above the feet the ground probe starts from.
const PROBE_LIFT: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcState {
    IdleAtDestination,
    Moving,
    Fallen,
}

#[derive(Component, Debug, Clone)]
pub struct Npc {
    state: NpcState,
    wander_timer: f32,
    grounded: bool,
    /// Heading for a safe tile; wander re-rolls wait until arrival.
    seeking_safe: bool,
}

impl Npc {
    /// `wander_timer` staggers the crowd so they don't all re-roll together.
    pub fn new(wander_timer: f32) -> Self {
        Self {
            state: NpcState::IdleAtDestination,
            wander_timer,
            grounded: false,
            seeking_safe: false,
        }
    }

    pub fn state(&self) -> NpcState { self.state }
    pub fn is_grounded(&self) -> bool { self.grounded }
    pub fn is_fallen(&self) -> bool { self.state == NpcState::Fallen }
    pub fn is_seeking_safe(&self) -> bool { self.seeking_safe }

    /// Falling-velocity heuristic: off the ground and dropping fast.
    pub fn should_fall(&self, body: &RigidBody, threshold: f32) -> bool {
        !self.grounded && body.velocity.y < -threshold
    }

    fn fall(&mut self, agent: &mut NavAgent, animator: Option<&mut Animator>) {
        self.state = NpcState::Fallen;
        self.seeking_safe = false;
        agent.enabled = false;
        agent.stop();
        if let Some(animator) = animator {
            animator.play(AnimationClip::Fall);
            animator.set_speed(0.0);
        }
    }
}

/// Nearest standing tile of `color` on the nav mesh.
fn nearest_safe_point(
    navmesh: &NavMesh,
    from: Vec3,
    color: HexColor,
    tiles: &Query<&HexTile>,
) -> Option<Vec3> {
    navmesh
        .nearest_cell(from, |cell| {
            tiles.get(cell.entity).is_ok_and(|tile| tile.color == color)
        })
        .map(|cell| cell.center)
}

/// Decide what every NPC does this frame: fall, run for safety, or wander.
pub fn npc_brain_system(
    mut commands: Commands,
    mut events: EventReader<RoundEvent>,
    time: Res<Time>,
    config: Res<NpcConfig>,
    navmesh: Res<NavMesh>,
    mut rng: ResMut<GameRng>,
    mut stats: ResMut<ArenaStats>,
    tiles: Query<&HexTile>,
    mut npcs: Query<(Entity, &mut Npc, &mut NavAgent, &Transform, &RigidBody, Option<&mut Animator>)>,
) {
    let mut seek_color = None;
    for event in events.read() {
        if let RoundEvent::WarningStarted { color, .. } = *event {
            seek_color = Some(color);
        }
    }

    for (entity, mut npc, mut agent, transform, body, mut animator) in npcs.iter_mut() {
        if npc.is_fallen() {
            continue;
        }
        let pos = transform.position;

        if npc.should_fall(body, config.fall_velocity_threshold) {
            npc.fall(&mut agent, animator.as_deref_mut());
            commands.entity(entity).insert(Lifetime::new(config.despawn_delay));
            stats.record_elimination();
            log::info!("NPC {:?} fell at ({:.1}, {:.1})", entity, pos.x, pos.z);
            continue;
        }

        npc.wander_timer += time.delta;

        if let Some(color) = seek_color {
            if npc.grounded && rng.0.gen_bool(config.seek_safe_chance as f64) {
                match nearest_safe_point(&navmesh, pos, color, &tiles) {
                    Some(target) => {
                        agent.set_destination(target);
                        npc.seeking_safe = true;
                        npc.wander_timer = 0.0;
                    }
                    None => log::debug!("NPC {:?}: no {} tile to run to", entity, color),
                }
            }
        }

        if !navmesh.contains(pos) {
            log::debug!("NPC {:?} is off the nav mesh, skipping wander", entity);
        } else {
            // Steering drops the destination at the mesh edge; a seek that lost
            // its target is over.
            if agent.destination.is_none() {
                npc.seeking_safe = false;
            }
            let arrived = agent.destination.is_some() && agent.has_arrived(pos);
            if arrived {
                npc.seeking_safe = false;
            }
            let wants_new = agent.destination.is_none()
                || (!npc.seeking_safe && npc.wander_timer >= config.wander_interval);
            if wants_new {
                match navmesh.random_point(pos, config.wander_radius, &mut rng.0) {
                    Some(target) => {
                        agent.set_destination(target);
                        npc.wander_timer = 0.0;
                    }
                    None => log::debug!("NPC {:?}: no nav point within {}", entity, config.wander_radius),
                }
            }
        }

        let moving = agent.destination.is_some() && !agent.has_arrived(pos);
        npc.state = if moving { NpcState::Moving } else { NpcState::IdleAtDestination };

        if let Some(animator) = animator.as_deref_mut() {
            animator.set_speed(agent.velocity.length());
            animator.play(if moving { AnimationClip::Run } else { AnimationClip::Idle });
        }
    }
}

/// Probe for ground under every live NPC and stand it on whatever it finds.
pub fn npc_grounding_system(
    config: Res<NpcConfig>,
    tiles: Query<(Entity, &Transform, &Collider), (With<HexTile>, Without<Npc>)>,
    mut npcs: Query<(&mut Npc, &mut Transform, &mut RigidBody, &mut NavAgent)>,
) {
    let margin = config.radius * 0.5;
    for (mut npc, mut transform, mut body, mut agent) in npcs.iter_mut() {
        if npc.is_fallen() {
            npc.grounded = false;
            agent.grounded = false;
            continue;
        }
        let origin = transform.position + Vec3::Y * PROBE_LIFT;
        let hit = raycast_down(
            origin,
            PROBE_LIFT + config.ground_check_distance,
            margin,
            tiles.iter(),
        );
        match hit {
            Some(hit) => {
                transform.position.y = hit.point.y;
                if body.velocity.y < 0.0 {
                    body.velocity.y = 0.0;
                }
                npc.grounded = true;
            }
            None => npc.grounded = false,
        }
        agent.grounded = npc.grounded;
    }
}
