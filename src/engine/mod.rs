// Engine module - reusable pieces the game is built on: components, physics
// and navigation systems, plus the presentation helpers used by the window.

pub mod camera;
pub mod components;
pub mod hud;
pub mod input;
pub mod mesh;
pub mod navigation;
pub mod systems;

// Re-export commonly used items
pub use components::*;
pub use navigation::{NavAgent, NavCell, NavMesh, nav_agent_system};
pub use systems::{Gravity, RayHit, gravity_system, lifetime_system, raycast_down};
