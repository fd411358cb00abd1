// Orbit camera for watching the arena.
//
// Camera model:
//   - A "target" point on the XZ plane at floor height that the camera looks at
//   - Fixed pitch (elevation angle), yaw rotated with Q/E
//   - Zoom by adjusting distance along the look vector (mouse wheel)
//   - WASD pans the target relative to camera facing, clamped to the arena

use glam::{Mat4, Vec2, Vec3};
use super::input::InputState;
use winit::keyboard::KeyCode;

pub struct OrbitCamera {
    /// Point on the floor the camera orbits around.
    /// Private: always clamped in update(). Use target() to read.
    target: Vec2,

    /// Distance from target along the look direction.
    distance: f32,
    pub min_distance: f32,
    pub max_distance: f32,

    /// Elevation angle in radians (0 = horizontal, PI/2 = straight down)
    pub pitch: f32,

    /// Horizontal rotation in radians (0 = looking along -Z axis)
    pub yaw: f32,

    pub fov: f32,
    pub near: f32,
    pub far: f32,

    /// WASD pan speed in world units per second
    pub move_speed: f32,
    /// Q/E rotation speed in radians per second
    pub turn_speed: f32,
    /// Zoom change (in distance units) per scroll line
    pub zoom_speed: f32,

    /// Target is kept within this distance of the origin.
    pub bounds_radius: f32,
}

impl OrbitCamera {
    /// Camera framing an arena of the given radius.
    pub fn framing(arena_radius: f32) -> Self {
        let distance = (arena_radius * 2.6).max(12.0);
        Self {
            target: Vec2::ZERO,
            distance,
            min_distance: 6.0,
            max_distance: distance * 2.0,
            pitch: 50.0_f32.to_radians(),
            yaw: 0.0,
            fov: 45.0_f32.to_radians(),
            near: 0.1,
            far: 500.0,
            move_speed: 12.0,
            turn_speed: 1.5,
            zoom_speed: 1.5,
            bounds_radius: arena_radius,
        }
    }

    /// Update camera position based on input. Call once per frame before rendering.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        // yaw=0 means camera faces along -Z, so forward is (0, -1) in (X, Z).
        let forward = Vec2::new(-self.yaw.sin(), -self.yaw.cos());
        let right = Vec2::new(self.yaw.cos(), -self.yaw.sin());

        let mut move_dir = Vec2::ZERO;
        if input.is_key_held(KeyCode::KeyW) { move_dir += forward; }
        if input.is_key_held(KeyCode::KeyS) { move_dir -= forward; }
        if input.is_key_held(KeyCode::KeyD) { move_dir += right; }
        if input.is_key_held(KeyCode::KeyA) { move_dir -= right; }
        if move_dir != Vec2::ZERO {
            self.target += move_dir.normalize() * self.move_speed * dt;
        }

        if input.is_key_held(KeyCode::KeyQ) { self.yaw -= self.turn_speed * dt; }
        if input.is_key_held(KeyCode::KeyE) { self.yaw += self.turn_speed * dt; }

        // Scroll up (positive delta) zooms in
        self.distance -= input.scroll_delta * self.zoom_speed;
        self.distance = self.distance.clamp(self.min_distance, self.max_distance);

        if self.target.length() > self.bounds_radius {
            self.target = self.target.normalize() * self.bounds_radius;
        }
    }

    pub fn camera_position(&self) -> Vec3 {
        Vec3::new(self.target.x, 0.0, self.target.y) + self.eye_offset()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.camera_position(), Vec3::new(self.target.x, 0.0, self.target.y), Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov, aspect, self.near, self.far)
    }

    /// Combined view-projection matrix ready to upload to the GPU.
    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    pub fn target(&self) -> Vec2 { self.target }
    pub fn distance(&self) -> f32 { self.distance }

    // Offset from target to camera eye based on pitch, yaw, and distance.
    fn eye_offset(&self) -> Vec3 {
        Vec3::new(
            self.yaw.sin() * self.pitch.cos() * self.distance,
            self.pitch.sin() * self.distance,
            self.yaw.cos() * self.pitch.cos() * self.distance,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn eye_sits_above_and_behind_target() {
        let cam = OrbitCamera::framing(10.0);
        let eye = cam.camera_position();
        assert!(eye.y > 0.0);
        assert!(eye.z > 0.0);
        assert_relative_eq!(eye.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!((eye - Vec3::ZERO).length(), cam.distance(), epsilon = 1e-3);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = OrbitCamera::framing(10.0);
        let mut input = InputState::new();
        input.scroll_delta = 1000.0;
        cam.update(&input, 0.016);
        assert_relative_eq!(cam.distance(), cam.min_distance);
        input.scroll_delta = -1000.0;
        cam.update(&input, 0.016);
        assert_relative_eq!(cam.distance(), cam.max_distance);
    }
}
