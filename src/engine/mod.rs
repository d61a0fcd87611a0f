// Engine module - grid navigation, steering and formation control
// Leaf-first: navigation -> astar -> steering -> formation

pub mod astar;
pub mod components;
pub mod formation;
pub mod navigation;
pub mod scene;
pub mod steering;
pub mod systems;

// Re-export commonly used items
pub use astar::find_path;
pub use components::*;
pub use formation::{AgentSnapshot, FormationManager, SlotSpec};
pub use navigation::{Cell, GridMap};
pub use scene::{
    Obstacle, ObstacleField, ObstaclePlacer, ObstacleProbe, ObstacleSet, ObstacleTag, RayHit,
};
pub use steering::AgentController;
