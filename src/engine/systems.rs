// ECS systems for the engine layer: rigid-body integration, lifetimes and
// the physics queries gameplay code runs against colliders.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec2, Vec3};
use super::components::*;

/// Downward acceleration applied to non-kinematic bodies (units/sec²).
#[derive(Resource, Debug, Clone, Copy)]
pub struct Gravity(pub f32);

impl Default for Gravity {
    fn default() -> Self {
        Self(9.81)
    }
}

/// Integrate every non-kinematic rigid body under gravity.
/// Kinematic bodies are left for gameplay code to move.
pub fn gravity_system(
    time: Res<Time>,
    gravity: Res<Gravity>,
    mut query: Query<(&mut Transform, &mut RigidBody)>,
) {
    let dt = time.delta;
    if dt <= 0.0 {
        return;
    }
    for (mut transform, mut body) in query.iter_mut() {
        if body.kinematic {
            continue;
        }
        body.velocity.y -= gravity.0 * dt;
        transform.position += body.velocity * dt;

        if body.angular_velocity != Vec3::ZERO {
            let spin = Quat::from_scaled_axis(body.angular_velocity * dt);
            transform.rotation = (spin * transform.rotation).normalize();
        }
    }
}

/// Decrease lifetime and despawn entities when lifetime expires
pub fn lifetime_system(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut Lifetime)>,
) {
    for (entity, mut lifetime) in query.iter_mut() {
        lifetime.remaining -= time.delta;
        if lifetime.remaining <= 0.0 {
            log::debug!("lifetime expired, despawning {:?}", entity);
            commands.entity(entity).despawn();
        }
    }
}

/// Result of a successful downward probe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub entity: Entity,
    /// World-space point on the top face.
    pub point: Vec3,
    pub distance: f32,
}

/// Cast a ray straight down from `origin` and return the closest enabled
/// hexagon top face within `max_distance`.
///
/// `margin` grows each hexagon's footprint, so probes standing on the seam
/// between two tiles still register a hit.
pub fn raycast_down<'a>(
    origin: Vec3,
    max_distance: f32,
    margin: f32,
    colliders: impl IntoIterator<Item = (Entity, &'a Transform, &'a Collider)>,
) -> Option<RayHit> {
    let mut best: Option<RayHit> = None;
    for (entity, transform, collider) in colliders {
        if !collider.enabled {
            continue;
        }
        let ColliderShape::HexPrism(prism) = collider.shape else {
            continue;
        };
        let top = transform.position.y;
        let distance = origin.y - top;
        if distance < 0.0 || distance > max_distance {
            continue;
        }
        let local = Vec2::new(
            origin.x - transform.position.x,
            origin.z - transform.position.z,
        );
        if !prism.contains_xz(local, margin) {
            continue;
        }
        if best.is_none_or(|hit| distance < hit.distance) {
            best = Some(RayHit {
                entity,
                point: Vec3::new(origin.x, top, origin.z),
                distance,
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn step(world: &mut World, dt: f32) {
        world.resource_mut::<Time>().advance(dt);
        let mut schedule = Schedule::default();
        schedule.add_systems((gravity_system, lifetime_system).chain());
        schedule.run(world);
    }

    #[test]
    fn gravity_moves_only_dynamic_bodies() {
        let mut world = World::new();
        world.init_resource::<Time>();
        world.init_resource::<Gravity>();
        let still = world
            .spawn((Transform::default(), RigidBody::kinematic()))
            .id();
        let falling = world
            .spawn((Transform::default(), RigidBody::dynamic()))
            .id();

        step(&mut world, 0.5);

        assert_relative_eq!(world.get::<Transform>(still).unwrap().position.y, 0.0);
        let body = world.get::<RigidBody>(falling).unwrap();
        assert_relative_eq!(body.velocity.y, -9.81 * 0.5, epsilon = 1e-4);
        assert!(world.get::<Transform>(falling).unwrap().position.y < 0.0);
    }

    #[test]
    fn lifetime_despawns_when_expired() {
        let mut world = World::new();
        world.init_resource::<Time>();
        world.init_resource::<Gravity>();
        let entity = world.spawn(Lifetime::new(1.0)).id();

        step(&mut world, 0.6);
        assert!(world.get::<Lifetime>(entity).is_some());
        step(&mut world, 0.6);
        assert!(world.get::<Lifetime>(entity).is_none());
    }

    #[test]
    fn raycast_picks_nearest_enabled_top() {
        let mut world = World::new();
        let low = world
            .spawn((Transform::from_position(Vec3::new(0.0, -1.0, 0.0)), Collider::hex_prism(1.0, 0.5)))
            .id();
        let high = world
            .spawn((Transform::from_position(Vec3::ZERO), Collider::hex_prism(1.0, 0.5)))
            .id();

        let mut query = world.query::<(Entity, &Transform, &Collider)>();
        let hit = raycast_down(Vec3::new(0.2, 0.1, 0.0), 5.0, 0.0, query.iter(&world)).unwrap();
        assert_eq!(hit.entity, high);
        assert_relative_eq!(hit.point.y, 0.0);

        world.get_mut::<Collider>(high).unwrap().enabled = false;
        let hit = raycast_down(Vec3::new(0.2, 0.1, 0.0), 5.0, 0.0, query.iter(&world)).unwrap();
        assert_eq!(hit.entity, low);

        assert!(raycast_down(Vec3::new(0.2, 0.1, 0.0), 0.5, 0.0, query.iter(&world)).is_none());
        assert!(raycast_down(Vec3::new(3.0, 0.1, 0.0), 5.0, 0.0, query.iter(&world)).is_none());
    }
}
