// Navigation over the tile floor.
//
// Layer 1: NavMesh — walkable tile tops, rebuilt every frame from whichever
//          tiles are standing with an enabled collider.
// Layer 2: NavAgent — per-character destination + straight-line steering.
//
// The floor is a single open plane with holes, so agents steer directly at
// their destination; picking destinations that are on the mesh is the
// caller's job (`sample_position` / `random_point`).

use bevy_ecs::prelude::*;
use glam::{Vec2, Vec3};
use rand::Rng;
use super::components::{HexPrism, Transform, Time};

// ============================================================================
// NAV MESH
// ============================================================================

/// One walkable hexagon top.
#[derive(Debug, Clone, Copy)]
pub struct NavCell {
    pub entity: Entity,
    /// Centre of the top face.
    pub center: Vec3,
    pub prism: HexPrism,
}

impl NavCell {
    fn contains(&self, pos: Vec3, margin: f32) -> bool {
        let local = Vec2::new(pos.x - self.center.x, pos.z - self.center.z);
        self.prism.contains_xz(local, margin)
    }
}

/// Walkable surface built from the standing tiles.
#[derive(Resource, Debug, Default, Clone)]
pub struct NavMesh {
    pub cells: Vec<NavCell>,
    /// Extra footprint granted to every cell so that seams between adjacent
    /// tiles stay walkable.
    pub margin: f32,
}

impl NavMesh {
    pub fn new(margin: f32) -> Self {
        Self { cells: Vec::new(), margin }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn push(&mut self, cell: NavCell) {
        self.cells.push(cell);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell under `pos` on the XZ plane, if any.
    pub fn cell_at(&self, pos: Vec3) -> Option<&NavCell> {
        self.cells.iter().find(|c| c.contains(pos, self.margin))
    }

    /// True if `pos` is over a walkable cell.
    pub fn contains(&self, pos: Vec3) -> bool {
        self.cell_at(pos).is_some()
    }

    /// Snap `pos` onto the mesh.
    ///
    /// A point over a cell is projected onto that cell's top. Otherwise the
    /// nearest cell centre within `max_distance` (XZ distance) is returned.
    pub fn sample_position(&self, pos: Vec3, max_distance: f32) -> Option<Vec3> {
        if let Some(cell) = self.cell_at(pos) {
            return Some(Vec3::new(pos.x, cell.center.y, pos.z));
        }
        self.nearest_cell(pos, |_| true)
            .filter(|cell| planar_distance(cell.center, pos) <= max_distance)
            .map(|cell| cell.center)
    }

    /// Nearest cell to `pos` (XZ distance) accepted by `filter`.
    pub fn nearest_cell(&self, pos: Vec3, filter: impl Fn(&NavCell) -> bool) -> Option<&NavCell> {
        self.cells
            .iter()
            .filter(|c| filter(c))
            .min_by(|a, b| {
                planar_distance(a.center, pos).total_cmp(&planar_distance(b.center, pos))
            })
    }

    /// Random walkable point within `radius` of `origin`.
    ///
    /// Picks a random offset inside the disc and samples the mesh around it,
    /// searching as far as `radius` from the offset point.
    pub fn random_point(&self, origin: Vec3, radius: f32, rng: &mut impl Rng) -> Option<Vec3> {
        if self.is_empty() || radius <= 0.0 {
            return None;
        }
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = radius * rng.gen_range(0.0f32..1.0).sqrt();
        let candidate = origin + Vec3::new(angle.cos() * dist, 0.0, angle.sin() * dist);
        self.sample_position(candidate, radius)
    }
}

#[inline]
pub fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    Vec2::new(a.x - b.x, a.z - b.z).length()
}

// ============================================================================
// NAV AGENT
// ============================================================================

/// Steers an entity toward `destination` across the nav mesh.
#[derive(Component, Debug, Clone, Copy)]
pub struct NavAgent {
    pub destination: Option<Vec3>,
    /// Maximum planar speed in world units/sec.
    pub speed: f32,
    /// Distance at which the agent counts as arrived.
    pub stopping_distance: f32,
    /// Disabled agents neither steer nor report arrival.
    pub enabled: bool,
    /// Planar velocity applied this frame.
    pub velocity: Vec3,
    /// Cleared by the owner each frame; steering only runs while set.
    pub grounded: bool,
}

impl NavAgent {
    pub fn new(speed: f32, stopping_distance: f32) -> Self {
        Self {
            destination: None,
            speed,
            stopping_distance,
            enabled: true,
            velocity: Vec3::ZERO,
            grounded: false,
        }
    }

    pub fn set_destination(&mut self, destination: Vec3) {
        self.destination = Some(destination);
    }

    pub fn stop(&mut self) {
        self.destination = None;
        self.velocity = Vec3::ZERO;
    }

    /// Planar distance left to travel; 0 with no destination.
    pub fn remaining_distance(&self, position: Vec3) -> f32 {
        self.destination
            .map(|d| planar_distance(d, position))
            .unwrap_or(0.0)
    }

    pub fn has_arrived(&self, position: Vec3) -> bool {
        self.remaining_distance(position) <= self.stopping_distance
    }
}

/// Move grounded, enabled agents in a straight line toward their destination.
///
/// A step that would leave the nav mesh is refused and the agent stops, so
/// its owner can pick a new destination.
pub fn nav_agent_system(
    time: Res<Time>,
    navmesh: Res<NavMesh>,
    mut query: Query<(&mut Transform, &mut NavAgent)>,
) {
    let dt = time.delta;
    for (mut transform, mut agent) in query.iter_mut() {
        if !agent.enabled || !agent.grounded {
            agent.velocity = Vec3::ZERO;
            continue;
        }
        let Some(destination) = agent.destination else {
            agent.velocity = Vec3::ZERO;
            continue;
        };

        let to_target = Vec3::new(
            destination.x - transform.position.x,
            0.0,
            destination.z - transform.position.z,
        );
        let distance = to_target.length();
        if distance <= agent.stopping_distance || dt <= 0.0 {
            agent.velocity = Vec3::ZERO;
            continue;
        }

        // Never overshoot the target in one frame.
        let step = (agent.speed * dt).min(distance);
        let dir = to_target / distance;
        let next = transform.position + dir * step;
        if !navmesh.contains(next) {
            log::trace!("nav agent blocked at mesh edge");
            agent.stop();
            continue;
        }
        transform.position = next;
        agent.velocity = dir * (step / dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mesh_with_cells(centers: &[Vec3]) -> NavMesh {
        let mut world = World::new();
        let mut mesh = NavMesh::new(0.05);
        for &center in centers {
            mesh.push(NavCell {
                entity: world.spawn_empty().id(),
                center,
                prism: HexPrism { circumradius: 1.0, height: 0.5 },
            });
        }
        mesh
    }

    #[test]
    fn sample_projects_points_over_cells() {
        let mesh = mesh_with_cells(&[Vec3::new(0.0, 1.0, 0.0)]);
        let hit = mesh.sample_position(Vec3::new(0.3, 5.0, 0.2), 1.0).unwrap();
        assert_relative_eq!(hit.y, 1.0);
        assert_relative_eq!(hit.x, 0.3);
    }

    #[test]
    fn sample_falls_back_to_nearest_centre_within_range() {
        let mesh = mesh_with_cells(&[Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]);
        let hit = mesh.sample_position(Vec3::new(7.0, 0.0, 0.0), 4.0).unwrap();
        assert_eq!(hit, Vec3::new(10.0, 0.0, 0.0));
        assert!(mesh.sample_position(Vec3::new(5.0, 0.0, 0.0), 2.0).is_none());
    }

    #[test]
    fn random_points_stay_on_mesh() {
        let mesh = mesh_with_cells(&[Vec3::ZERO, Vec3::new(1.5, 0.0, 0.87)]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            if let Some(p) = mesh.random_point(Vec3::ZERO, 3.0, &mut rng) {
                assert!(mesh.contains(p), "{p:?} is off the mesh");
            }
        }
        assert!(!mesh.is_empty());
        assert!(NavMesh::default().is_empty());
        assert!(NavMesh::default().random_point(Vec3::ZERO, 3.0, &mut rng).is_none());
    }

    fn run_agents(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(nav_agent_system);
        schedule.run(world);
    }

    #[test]
    fn agent_steers_without_overshooting() {
        let mut world = World::new();
        world.insert_resource(Time { delta: 1.0, ..Default::default() });
        world.insert_resource(mesh_with_cells(&[Vec3::ZERO, Vec3::new(1.5, 0.0, 0.87)]));
        let mut agent = NavAgent::new(3.0, 0.1);
        agent.grounded = true;
        agent.set_destination(Vec3::new(2.0, 0.0, 0.0));
        let e = world.spawn((Transform::default(), agent)).id();

        run_agents(&mut world);

        let pos = world.get::<Transform>(e).unwrap().position;
        assert_relative_eq!(pos.x, 2.0);
        assert!(world.get::<NavAgent>(e).unwrap().has_arrived(pos));
    }

    #[test]
    fn ungrounded_agent_does_not_steer() {
        let mut world = World::new();
        world.insert_resource(Time { delta: 1.0, ..Default::default() });
        world.insert_resource(mesh_with_cells(&[Vec3::ZERO]));
        let mut agent = NavAgent::new(0.5, 0.1);
        agent.set_destination(Vec3::new(0.5, 0.0, 0.0));
        let e = world.spawn((Transform::default(), agent)).id();

        run_agents(&mut world);

        assert_eq!(world.get::<Transform>(e).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn agent_refuses_to_step_off_the_mesh() {
        let mut world = World::new();
        world.insert_resource(Time { delta: 1.0, ..Default::default() });
        world.insert_resource(mesh_with_cells(&[Vec3::ZERO]));
        let mut agent = NavAgent::new(5.0, 0.1);
        agent.grounded = true;
        agent.set_destination(Vec3::new(5.0, 0.0, 0.0));
        let e = world.spawn((Transform::default(), agent)).id();

        run_agents(&mut world);

        assert_eq!(world.get::<Transform>(e).unwrap().position, Vec3::ZERO);
        assert!(world.get::<NavAgent>(e).unwrap().destination.is_none());
    }
}
