// Core ECS components for the engine
// These are the scene-object primitives the gameplay behaviours mutate

use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};

/// Position, orientation and scale of an entity in 3D space
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self { position, ..Default::default() }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix for rendering (scale, then rotate, then translate).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// RGB material colour. Stands in for a renderer's material slot.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Material {
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    /// Linear blend toward `other` by `t` in [0, 1].
    pub fn lerp(self, other: Material, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
        }
    }
}

/// Simulated body. Kinematic bodies are moved by gameplay code only;
/// non-kinematic bodies are integrated under gravity by `gravity_system`.
#[derive(Component, Debug, Clone, Copy)]
pub struct RigidBody {
    pub kinematic: bool,
    /// Linear velocity in world units/sec.
    pub velocity: Vec3,
    /// Angular velocity as a scaled axis (radians/sec).
    pub angular_velocity: Vec3,
}

impl RigidBody {
    pub fn kinematic() -> Self {
        Self {
            kinematic: true,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
        }
    }

    pub fn dynamic() -> Self {
        Self { kinematic: false, ..Self::kinematic() }
    }

    /// Zero all motion and hand the body back to gameplay code.
    pub fn freeze(&mut self) {
        self.kinematic = true;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }
}

/// Upright hexagonal prism, flat-top in the XZ plane.
/// The transform position is the centre of the top face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexPrism {
    /// Centre-to-corner distance on the XZ plane.
    pub circumradius: f32,
    pub height: f32,
}

impl HexPrism {
    /// True if the XZ offset `local` (relative to the prism centre) lies
    /// inside the hexagon grown by `margin`.
    pub fn contains_xz(&self, local: glam::Vec2, margin: f32) -> bool {
        let s = self.circumradius + margin;
        let sqrt3 = 3.0_f32.sqrt();
        let ax = local.x.abs();
        let az = local.y.abs();
        az <= s * sqrt3 * 0.5 && sqrt3 * ax + az <= sqrt3 * s
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    HexPrism(HexPrism),
    /// Upright capsule; position is the feet.
    Capsule { radius: f32, height: f32 },
}

/// Physics query shape. Disabled colliders are invisible to ray probes.
#[derive(Component, Debug, Clone, Copy)]
pub struct Collider {
    pub shape: ColliderShape,
    pub enabled: bool,
}

impl Collider {
    pub fn hex_prism(circumradius: f32, height: f32) -> Self {
        Self {
            shape: ColliderShape::HexPrism(HexPrism { circumradius, height }),
            enabled: true,
        }
    }

    pub fn capsule(radius: f32, height: f32) -> Self {
        Self {
            shape: ColliderShape::Capsule { radius, height },
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnimationClip {
    #[default]
    Idle,
    Run,
    Fall,
}

/// Animator parameters: current clip plus the `Speed` float.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Animator {
    pub clip: AnimationClip,
    pub speed: f32,
}

impl Animator {
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    pub fn play(&mut self, clip: AnimationClip) {
        if self.clip != clip {
            log::trace!("animator: {:?} -> {:?}", self.clip, clip);
            self.clip = clip;
        }
    }
}

/// Despawn the entity once `remaining` reaches zero.
#[derive(Component, Debug, Clone, Copy)]
pub struct Lifetime {
    pub remaining: f32,
}

impl Lifetime {
    pub fn new(seconds: f32) -> Self {
        Self { remaining: seconds }
    }
}

/// Frame timing, refreshed once per schedule run.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct Time {
    /// Seconds since the previous frame (0 while paused).
    pub delta: f32,
    /// Unpaused seconds since startup.
    pub elapsed: f32,
    pub paused: bool,
}

impl Time {
    pub fn advance(&mut self, dt: f32) {
        self.delta = if self.paused { 0.0 } else { dt };
        self.elapsed += self.delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec2;

    #[test]
    fn hex_prism_contains_centre_and_corners() {
        let prism = HexPrism { circumradius: 1.0, height: 0.5 };
        assert!(prism.contains_xz(Vec2::ZERO, 0.0));
        assert!(prism.contains_xz(Vec2::new(0.99, 0.0), 0.0));
        assert!(!prism.contains_xz(Vec2::new(1.01, 0.0), 0.0));
        // Flat edge sits at sqrt(3)/2 on Z.
        assert!(prism.contains_xz(Vec2::new(0.0, 0.86), 0.0));
        assert!(!prism.contains_xz(Vec2::new(0.0, 0.9), 0.0));
        assert!(prism.contains_xz(Vec2::new(0.0, 0.9), 0.1));
    }

    #[test]
    fn paused_time_does_not_advance() {
        let mut time = Time::default();
        time.advance(0.5);
        time.paused = true;
        time.advance(0.5);
        assert_relative_eq!(time.delta, 0.0);
        assert_relative_eq!(time.elapsed, 0.5);
    }

    #[test]
    fn material_lerp_clamps() {
        let a = Material::rgb(0.0, 0.0, 0.0);
        let b = Material::rgb(1.0, 0.5, 0.25);
        assert_eq!(a.lerp(b, 2.0), b);
        assert_relative_eq!(a.lerp(b, 0.5).g, 0.25);
    }
}
