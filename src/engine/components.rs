// Core ECS components for formation agents
// One entity per agent; the roster lives on FormationManager

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};

/// Position and facing of an agent. Facing is `rotation * Vec3::Z`.
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Unit forward vector.
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// Velocity of an entity in 3D space (units per second)
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Velocity {
    pub linear: Vec3,
}

/// Steering state of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    /// Reached its target; velocity is zero and it turns to its slot orientation.
    Idle,
    /// Actively steering toward a target.
    Moving,
}

/// Waypoints produced by one search plus the index of the next one to reach.
/// Never edited after creation; a new request replaces it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    waypoints: Vec<Vec3>,
    cursor: usize,
}

impl Path {
    pub fn new(waypoints: Vec<Vec3>) -> Self {
        Self { waypoints, cursor: 0 }
    }

    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Waypoint under the cursor, `None` once every waypoint was reached.
    pub fn current(&self) -> Option<Vec3> {
        self.waypoints.get(self.cursor).copied()
    }

    pub fn advance(&mut self) {
        if self.cursor < self.waypoints.len() {
            self.cursor += 1;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }
}

/// Leader follows its own path; followers chase their formation slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Leader { path: Path },
    Follower,
}

impl Role {
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader { .. })
    }
}

/// Formation membership and controller state.
#[derive(Component, Debug, Clone)]
pub struct Agent {
    /// Index into the formation's slot tables.
    pub slot: usize,
    pub role: Role,
    pub state: MotionState,
}

impl Agent {
    pub fn leader(slot: usize) -> Self {
        Self {
            slot,
            role: Role::Leader {
                path: Path::default(),
            },
            state: MotionState::Moving,
        }
    }

    pub fn follower(slot: usize) -> Self {
        Self {
            slot,
            role: Role::Follower,
            state: MotionState::Moving,
        }
    }

    #[inline]
    pub fn has_reached_target(&self) -> bool {
        self.state == MotionState::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_cursor_stops_at_end() {
        let mut path = Path::new(vec![Vec3::X, Vec3::Z]);
        assert_eq!(path.current(), Some(Vec3::X));
        path.advance();
        assert_eq!(path.current(), Some(Vec3::Z));
        path.advance();
        path.advance();
        assert!(path.is_finished());
        assert_eq!(path.cursor(), 2);
        assert_eq!(path.current(), None);
    }

    #[test]
    fn default_transform_faces_forward() {
        let t = Transform::from_position(Vec3::new(1.0, 0.0, 2.0));
        assert!((t.forward() - Vec3::Z).length() < 1e-6);
    }
}
