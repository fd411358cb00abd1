// Owns the ECS world and the per-frame schedule.

use bevy_ecs::event::Events;
use bevy_ecs::prelude::*;

use crate::engine::{Gravity, NavMesh, Time, gravity_system, lifetime_system, nav_agent_system};
use super::arena::{self, ArenaStats, arena_stats_system};
use super::config::GameConfig;
use super::flag::flag_system;
use super::hexagon::{
    hexagon_blink_system, hexagon_lifecycle_system, hexagon_round_events_system,
    rebuild_nav_mesh_system,
};
use super::npc::{npc_brain_system, npc_grounding_system};
use super::round::{RoundEvent, RoundManager, round_manager_system};
use super::GameRng;

pub struct Simulation {
    world: World,
    schedule: Schedule,
    max_frame_delta: f32,
}

/// Swap the event double-buffer once per frame.
fn update_round_events(mut events: ResMut<Events<RoundEvent>>) {
    events.update();
}

impl Simulation {
    /// Build the scene and the schedule. `config` is expected to be validated.
    pub fn new(config: &GameConfig) -> Self {
        let mut world = World::new();
        let mut rng = GameRng::new(config.seed);

        world.init_resource::<Time>();
        world.init_resource::<Events<RoundEvent>>();
        world.init_resource::<ArenaStats>();
        world.insert_resource(Gravity(config.physics.gravity));
        world.insert_resource(NavMesh::new(config.npc.radius * 0.5));
        world.insert_resource(RoundManager::new(config.round.clone()));
        world.insert_resource(config.arena.clone());
        world.insert_resource(config.tile.clone());
        world.insert_resource(config.npc.clone());
        world.insert_resource(config.flag.clone());

        arena::spawn_tiles(&mut world, &config.arena, &mut rng.0);
        arena::spawn_npcs(&mut world, &config.npc, &mut rng.0);
        arena::spawn_flag(&mut world, &config.arena, &config.flag);
        world.insert_resource(rng);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                update_round_events,
                round_manager_system,
                hexagon_round_events_system,
                hexagon_blink_system,
                hexagon_lifecycle_system,
                flag_system,
                rebuild_nav_mesh_system,
                npc_brain_system,
                nav_agent_system,
                gravity_system,
                npc_grounding_system,
                arena_stats_system,
                lifetime_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            max_frame_delta: config.max_frame_delta,
        }
    }

    /// Advance one frame of `dt` seconds (clamped to `max_frame_delta`).
    pub fn step(&mut self, dt: f32) {
        let dt = dt.clamp(0.0, self.max_frame_delta);
        let paused = {
            let mut time = self.world.resource_mut::<Time>();
            time.advance(dt);
            time.paused
        };
        if !paused {
            self.schedule.run(&mut self.world);
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.world.resource_mut::<Time>().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.world.resource::<Time>().paused
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn round(&self) -> &RoundManager {
        self.world.resource::<RoundManager>()
    }

    pub fn stats(&self) -> &ArenaStats {
        self.world.resource::<ArenaStats>()
    }

    pub fn elapsed(&self) -> f32 {
        self.world.resource::<Time>().elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Collider, Lifetime, Material, RigidBody, Transform};
    use crate::game::flag::Flag;
    use crate::game::hex_color::HexColor;
    use crate::game::hexagon::{HexTile, TileState};
    use crate::engine::navigation::planar_distance;
    use crate::game::npc::{Npc, NpcState};
    use crate::game::round::RoundPhase;
    use glam::Vec3;
    use std::collections::HashMap;

    const DT: f32 = 1.0 / 60.0;

    fn config(seed: u64) -> GameConfig {
        let mut config = GameConfig::from_toml_str("").unwrap();
        config.seed = Some(seed);
        config.arena.rings = 2;
        config.npc.count = 10;
        config.round.start_delay = 0.5;
        config
    }

    fn run_until(sim: &mut Simulation, max_seconds: f32, mut done: impl FnMut(&Simulation) -> bool) {
        let mut t = 0.0;
        while !done(sim) {
            assert!(t < max_seconds, "condition not reached within {max_seconds}s");
            sim.step(DT);
            t += DT;
        }
    }

    fn tiles(sim: &mut Simulation) -> Vec<(HexTile, Collider, Transform)> {
        sim.world_mut()
            .query::<(&HexTile, &Collider, &Transform)>()
            .iter(sim.world())
            .map(|(t, c, tr)| (t.clone(), *c, *tr))
            .collect()
    }

    #[test]
    fn safe_flags_match_chosen_colour_and_flag_shows_it() {
        let mut sim = Simulation::new(&config(1));
        run_until(&mut sim, 10.0, |s| s.round().phase() == RoundPhase::Warning);
        // One more frame so the flag has applied its events.
        sim.step(DT);

        let safe = sim.round().safe_color().unwrap();
        for (tile, _, _) in tiles(&mut sim) {
            assert_eq!(tile.safe, tile.color == safe, "tile {:?}", tile.coord);
        }

        let flag = sim.world_mut().query::<&Flag>().single(sim.world()).clone();
        assert!(flag.is_visible());
        assert_eq!(flag.displayed(), Some(safe));
        let material = *sim.world_mut().query_filtered::<&Material, With<Flag>>().single(sim.world());
        assert_eq!(material, safe.rgb());
    }

    #[test]
    fn only_safe_tiles_stand_after_a_drop_and_all_return() {
        let mut sim = Simulation::new(&config(2));
        run_until(&mut sim, 20.0, |s| s.round().phase() == RoundPhase::Dropping);
        sim.step(DT);

        let safe = sim.round().safe_color().unwrap();
        for (tile, _, _) in tiles(&mut sim) {
            assert_eq!(tile.is_standing(), tile.color == safe, "tile {:?}", tile.coord);
        }

        // Colliders go inert before anything regenerates.
        run_until(&mut sim, 5.0, |s| {
            let world = s.world();
            world
                .iter_entities()
                .filter_map(|e| e.get::<HexTile>())
                .any(|t| t.state() == TileState::Regenerating)
        });
        for (tile, collider, _) in tiles(&mut sim) {
            if tile.state() == TileState::Regenerating {
                assert!(!collider.enabled);
            }
        }

        run_until(&mut sim, 10.0, |s| s.round().round() == 2);
        for (tile, collider, transform) in tiles(&mut sim) {
            assert!(tile.is_standing());
            assert!(collider.enabled);
            assert_eq!(transform, tile.original_transform());
        }
        let flag = sim.world_mut().query::<&Flag>().single(sim.world()).clone();
        assert!(flag.displayed().is_some());
    }

    #[test]
    fn npc_on_dropped_tile_falls_and_is_despawned() {
        let mut cfg = config(3);
        cfg.npc.count = 0;
        cfg.npc.seek_safe_chance = 0.0;
        let mut sim = Simulation::new(&cfg);

        // Choose a tile, wait for the colour, then stand an NPC on an unsafe tile
        // and one on a safe tile.
        run_until(&mut sim, 10.0, |s| s.round().phase() == RoundPhase::Warning);
        let safe = sim.round().safe_color().unwrap();
        let all = tiles(&mut sim);
        let doomed_at = all.iter().find(|(t, _, _)| t.color != safe).unwrap().2.position;
        let lucky_at = all.iter().find(|(t, _, _)| t.color == safe).unwrap().2.position;

        let spawn = |sim: &mut Simulation, at: Vec3| {
            sim.world_mut()
                .spawn((
                    Npc::new(0.0),
                    crate::engine::NavAgent::new(0.0, 0.1),
                    Transform::from_position(at),
                    RigidBody::dynamic(),
                    crate::engine::Animator::default(),
                ))
                .id()
        };
        let doomed = spawn(&mut sim, doomed_at);
        let lucky = spawn(&mut sim, lucky_at);

        run_until(&mut sim, 10.0, |s| s.round().phase() == RoundPhase::WaitingRegeneration);

        let world = sim.world();
        let doomed_npc = world.get::<Npc>(doomed).unwrap();
        assert!(doomed_npc.is_fallen());
        assert!(world.get::<Lifetime>(doomed).is_some());
        assert!(!world.get::<Npc>(lucky).unwrap().is_fallen());
        assert!(sim.stats().eliminated_total >= 1);
        assert_eq!(sim.stats().alive, 1);

        for _ in 0..(4.0 / DT) as usize {
            sim.step(DT);
        }
        assert!(sim.world().get::<Npc>(doomed).is_none());
        assert!(sim.world().get::<Npc>(lucky).is_some());
    }

    #[test]
    fn wandering_npcs_stay_on_the_floor_between_rounds() {
        let mut cfg = config(4);
        cfg.round.start_delay = 30.0;
        let mut sim = Simulation::new(&cfg);
        let start: HashMap<Entity, Vec3> = sim
            .world_mut()
            .query_filtered::<(Entity, &Transform), With<Npc>>()
            .iter(sim.world())
            .map(|(e, t)| (e, t.position))
            .collect();

        let mut saw_moving = false;
        for _ in 0..(10.0 / DT) as usize {
            sim.step(DT);
            saw_moving |= sim
                .world_mut()
                .query::<&Npc>()
                .iter(sim.world())
                .any(|npc| npc.state() == NpcState::Moving);
        }
        assert!(saw_moving);
        assert_eq!(sim.stats().alive, 10);

        let npcs: Vec<(bool, f32)> = sim
            .world_mut()
            .query::<(Entity, &Npc, &Transform)>()
            .iter(sim.world())
            .map(|(e, npc, t)| (npc.is_grounded(), planar_distance(start[&e], t.position)))
            .collect();
        assert_eq!(npcs.len(), 10);
        assert!(npcs.iter().all(|(grounded, _)| *grounded));
        let moved = npcs.iter().filter(|(_, displacement)| *displacement > 0.5).count();
        assert!(moved >= 5, "only {moved} of 10 NPCs wandered");
    }

    #[test]
    fn pause_freezes_the_round_clock() {
        let mut sim = Simulation::new(&config(5));
        sim.step(0.05);
        sim.set_paused(true);
        for _ in 0..100 {
            sim.step(0.1);
        }
        assert!(!sim.round().is_started());
        sim.set_paused(false);
        run_until(&mut sim, 2.0, |s| s.round().is_started());
    }

    #[test]
    fn rounds_keep_cycling() {
        let mut sim = Simulation::new(&config(6));
        let mut chosen = Vec::new();
        let mut t = 0.0;
        while sim.round().round() < 4 {
            assert!(t < 60.0, "stalled in round {}", sim.round().round());
            sim.step(DT);
            t += DT;
            if let Some(color) = sim.round().safe_color() {
                if chosen.last() != Some(&(sim.round().round(), color)) {
                    chosen.push((sim.round().round(), color));
                }
            }
        }
        let rounds: Vec<u32> = chosen.iter().map(|(r, _)| *r).collect();
        assert_eq!(rounds, vec![1, 2, 3]);
        assert!(chosen.iter().all(|(_, c)| HexColor::ALL.contains(c)));
    }
}
