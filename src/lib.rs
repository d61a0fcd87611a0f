// Formation movement over a walkability grid.
//
// A* search over `engine::navigation::GridMap` produces the leader's waypoints;
// `engine::formation::FormationManager` keeps the followers in their slots and
// drives every agent's steering controller once per fixed tick.

pub mod config;
pub mod engine;

pub use config::SimConfig;
pub use engine::{
    AgentSnapshot, AgentController, FormationManager, GridMap, MotionState, ObstacleSet,
    SlotSpec, find_path,
};

/// Errors surfaced to callers of the navigation and formation commands.
#[derive(thiserror::Error, Debug)]
pub enum NavError {
    /// A world point mapped outside the grid extent.
    #[error("point ({x}, {z}) lies outside the navigation grid")]
    OutOfBounds { x: f32, z: f32 },

    /// Reading a configuration file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration parsed but is unusable
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Result type used throughout the crate.
pub type NavResult<T> = Result<T, NavError>;

/// Fixed simulation step in seconds.
pub const FIXED_DT: f32 = 0.02;
