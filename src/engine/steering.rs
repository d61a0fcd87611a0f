// Per-agent steering controller.
//
// Arrival: full speed outside `slowing_radius`, linear ramp to zero inside it,
// stop once within `waypoint_threshold`.
// Avoidance: one forward ray; a hit on an `Obstacle`-tagged body adds the
// forward direction reflected off the surface, weighted by proximity.
// Everything happens on the XZ plane; Y of targets and velocities is dropped.

use glam::{Quat, Vec3};
use log::trace;

use super::components::{Agent, MotionState, Role, Transform, Velocity};
use super::scene::{ObstacleProbe, ObstacleTag};
use crate::config::SteeringConfig;

/// Squared planar speed above which an agent turns to face its motion.
pub const MOVING_SPEED_SQ: f32 = 0.01;

// ============================================================================
// HELPERS
// ============================================================================

#[inline]
pub fn planar(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Yaw-only rotation whose forward (+Z) points along `dir` projected on XZ.
/// `None` for a vertical or zero direction.
pub fn look_rotation(dir: Vec3) -> Option<Quat> {
    let flat = planar(dir);
    if flat.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(Quat::from_rotation_y(flat.x.atan2(flat.z)))
}

/// Desired speed for a target `distance` away.
pub fn arrival_speed(distance: f32, max_speed: f32, slowing_radius: f32) -> f32 {
    if distance > slowing_radius || slowing_radius <= 0.0 {
        max_speed
    } else {
        max_speed * (distance / slowing_radius)
    }
}

/// Mirror `v` about the plane with unit normal `n`.
#[inline]
pub fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

/// Avoidance contribution from the forward probe. Zero when nothing tagged is hit.
pub fn obstacle_avoidance(
    probe: &dyn ObstacleProbe,
    position: Vec3,
    forward: Vec3,
    ray_distance: f32,
    strength: f32,
) -> Vec3 {
    let Some(hit) = probe.raycast(position, forward, ray_distance) else {
        return Vec3::ZERO;
    };
    if hit.tag != ObstacleTag::Obstacle {
        return Vec3::ZERO;
    }
    let proximity = ((ray_distance - hit.distance) / ray_distance).clamp(0.0, 1.0);
    reflect(forward, hit.normal).normalize_or_zero() * strength * proximity
}

/// Spherical step from `current` toward `target`; factor `rate * dt` clamped to [0, 1].
pub fn rotate_towards(current: Quat, target: Quat, rate: f32, dt: f32) -> Quat {
    current.slerp(target, (rate * dt).clamp(0.0, 1.0))
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Shared steering parameters; one instance drives every agent of a formation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentController {
    pub params: SteeringConfig,
}

impl AgentController {
    pub fn new(params: SteeringConfig) -> Self {
        Self { params }
    }

    /// Velocity that moves from `position` toward `target`, or `None` once
    /// within the arrival threshold. The result never exceeds `max_speed`.
    pub fn steer_towards(
        &self,
        position: Vec3,
        forward: Vec3,
        target: Vec3,
        probe: &dyn ObstacleProbe,
    ) -> Option<Vec3> {
        let p = &self.params;
        let direction = planar(target - position);
        let distance = direction.length();
        if distance < p.waypoint_threshold {
            return None;
        }

        let speed = arrival_speed(distance, p.max_speed, p.slowing_radius);
        let desired = direction.normalize_or_zero() * speed;
        let avoidance = planar(obstacle_avoidance(
            probe,
            position,
            forward,
            p.ray_distance,
            p.avoidance_strength,
        ));

        Some((desired + avoidance).clamp_length_max(p.max_speed))
    }

    /// One tick for one agent: pick the target from the role, steer, then turn.
    ///
    /// `slot_target` is only read for followers. `slot_rotation` is the resting
    /// orientation used while idle.
    pub fn update(
        &self,
        agent: &mut Agent,
        transform: &mut Transform,
        velocity: &mut Velocity,
        slot_target: Vec3,
        slot_rotation: Quat,
        probe: &dyn ObstacleProbe,
        dt: f32,
    ) {
        let threshold = self.params.waypoint_threshold;
        let position = transform.position;

        let target = match &mut agent.role {
            Role::Leader { path } => {
                while let Some(wp) = path.current() {
                    if planar(wp - position).length() < threshold {
                        path.advance();
                    } else {
                        break;
                    }
                }
                path.current()
            }
            Role::Follower => Some(slot_target),
        };

        let forward = transform.forward();
        let steered = target.and_then(|t| self.steer_towards(position, forward, t, probe));
        match steered {
            Some(v) => {
                velocity.linear = v;
                agent.state = MotionState::Moving;
            }
            None => {
                velocity.linear = Vec3::ZERO;
                agent.state = MotionState::Idle;
            }
        }

        let flat = planar(velocity.linear);
        if flat.length_squared() > MOVING_SPEED_SQ {
            if let Some(facing) = look_rotation(flat) {
                transform.rotation =
                    rotate_towards(transform.rotation, facing, self.params.rotation_speed, dt);
            }
        } else if agent.state == MotionState::Idle {
            transform.rotation =
                rotate_towards(transform.rotation, slot_rotation, self.params.rotation_speed, dt);
        }

        trace!(
            "slot {} {:?}: pos {} vel {} target {:?}",
            agent.slot, agent.state, transform.position, velocity.linear, target
        );
    }
}
