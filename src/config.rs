// TOML configuration for the grid, the steering controller and the formation tables.
// Every field has a default so partial files are fine.

use std::fs;
use std::path::Path;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::{NavError, NavResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub formation: FormationConfig,
    #[serde(default)]
    pub obstacles: ObstacleConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// World-space centre of the grid.
    #[serde(default = "default_grid_center")]
    pub center: Vec3,
    /// Extent along X and Z.
    #[serde(default = "default_world_size")]
    pub world_size: Vec2,
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteeringConfig {
    #[serde(default = "default_max_speed")]
    pub max_speed: f32,
    /// Slerp rate in 1/s; the per-tick factor is `rotation_speed * dt`.
    #[serde(default = "default_rotation_speed")]
    pub rotation_speed: f32,
    /// Distance below which arrival damping scales the speed down.
    #[serde(default = "default_slowing_radius")]
    pub slowing_radius: f32,
    /// Distance at which a waypoint or slot target counts as reached.
    #[serde(default = "default_waypoint_threshold")]
    pub waypoint_threshold: f32,
    /// Length of the forward obstacle probe.
    #[serde(default = "default_ray_distance")]
    pub ray_distance: f32,
    #[serde(default = "default_avoidance_strength")]
    pub avoidance_strength: f32,
}

/// One formation slot: displacement from the leader and resting facing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub offset: Vec3,
    pub facing: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormationConfig {
    #[serde(default = "default_leader_slot")]
    pub leader_slot: usize,
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleConfig {
    /// Radius of bodies created by `insert_obstacle`.
    #[serde(default = "default_obstacle_radius")]
    pub radius: f32,
}

// Default values
fn default_grid_center() -> Vec3 {
    Vec3::ZERO
}

fn default_world_size() -> Vec2 {
    Vec2::new(20.0, 20.0)
}

fn default_cell_size() -> f32 {
    1.0
}

fn default_max_speed() -> f32 {
    5.0
}

fn default_rotation_speed() -> f32 {
    5.0
}

fn default_slowing_radius() -> f32 {
    2.0
}

fn default_waypoint_threshold() -> f32 {
    0.5
}

fn default_ray_distance() -> f32 {
    2.0
}

fn default_avoidance_strength() -> f32 {
    1.0
}

fn default_leader_slot() -> usize {
    1
}

fn default_obstacle_radius() -> f32 {
    0.5
}

/// Finger-four: left wing, leader, right wing, trailing right.
fn default_slots() -> Vec<SlotConfig> {
    vec![
        SlotConfig {
            offset: Vec3::new(-3.0, 0.0, -1.5),
            facing: Vec3::NEG_X,
        },
        SlotConfig {
            offset: Vec3::ZERO,
            facing: Vec3::Z,
        },
        SlotConfig {
            offset: Vec3::new(3.0, 0.0, -1.5),
            facing: Vec3::new(1.0, 0.0, 1.0),
        },
        SlotConfig {
            offset: Vec3::new(4.0, 0.0, -3.5),
            facing: Vec3::NEG_Z,
        },
    ]
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            center: default_grid_center(),
            world_size: default_world_size(),
            cell_size: default_cell_size(),
        }
    }
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            max_speed: default_max_speed(),
            rotation_speed: default_rotation_speed(),
            slowing_radius: default_slowing_radius(),
            waypoint_threshold: default_waypoint_threshold(),
            ray_distance: default_ray_distance(),
            avoidance_strength: default_avoidance_strength(),
        }
    }
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            leader_slot: default_leader_slot(),
            slots: default_slots(),
        }
    }
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            radius: default_obstacle_radius(),
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> NavResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> NavResult<Self> {
        let config: SimConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> NavResult<()> {
        let invalid = |msg: String| Err(NavError::InvalidConfig(msg));

        if !(self.grid.cell_size > 0.0) {
            return invalid(format!(
                "grid.cell_size must be positive, got {}",
                self.grid.cell_size
            ));
        }
        if !(self.grid.world_size.x > 0.0 && self.grid.world_size.y > 0.0) {
            return invalid(format!(
                "grid.world_size must be positive, got {}",
                self.grid.world_size
            ));
        }
        let s = &self.steering;
        if !(s.max_speed > 0.0) {
            return invalid(format!("steering.max_speed must be positive, got {}", s.max_speed));
        }
        if !(s.ray_distance > 0.0) {
            return invalid(format!(
                "steering.ray_distance must be positive, got {}",
                s.ray_distance
            ));
        }
        if s.slowing_radius < 0.0 || s.waypoint_threshold < 0.0 || s.rotation_speed < 0.0 {
            return invalid("steering radii and rates must not be negative".to_string());
        }
        if self.formation.slots.is_empty() {
            return invalid("formation.slots must contain at least the leader slot".to_string());
        }
        if self.formation.leader_slot >= self.formation.slots.len() {
            return invalid(format!(
                "formation.leader_slot {} out of range for {} slots",
                self.formation.leader_slot,
                self.formation.slots.len()
            ));
        }
        if let Some(i) = self
            .formation
            .slots
            .iter()
            .position(|slot| Vec2::new(slot.facing.x, slot.facing.z).length_squared() == 0.0)
        {
            return invalid(format!("formation.slots[{i}].facing has no horizontal component"));
        }
        if !(self.obstacles.radius > 0.0) {
            return invalid(format!(
                "obstacles.radius must be positive, got {}",
                self.obstacles.radius
            ));
        }
        Ok(())
    }
}
