// ECS systems for the formation tick
// Steering writes velocity and rotation, movement then integrates position

use bevy_ecs::prelude::*;
use glam::Vec3;

use super::components::*;
use super::formation::SlotSpec;
use super::scene::ObstacleProbe;
use super::steering::AgentController;

/// Run the controller once for every agent.
///
/// Slot targets are computed from `leader_position`, captured before any agent
/// moves, so the result does not depend on query order.
pub fn steering_system(
    world: &mut World,
    controller: &AgentController,
    slots: &[SlotSpec],
    leader_position: Vec3,
    probe: &dyn ObstacleProbe,
    delta_time: f32,
) {
    let mut query = world.query::<(&mut Agent, &mut Transform, &mut Velocity)>();
    for (mut agent, mut transform, mut velocity) in query.iter_mut(world) {
        assert!(agent.slot < slots.len(), "agent slot {} outside formation table", agent.slot);
        let slot = &slots[agent.slot];
        controller.update(
            &mut agent,
            &mut transform,
            &mut velocity,
            leader_position + slot.offset,
            slot.rotation,
            probe,
            delta_time,
        );
    }
}

/// Update entity positions based on velocity
/// Movement is planar: the Y coordinate never changes
pub fn movement_system(world: &mut World, delta_time: f32) {
    let mut query = world.query::<(&mut Transform, &Velocity)>();
    for (mut transform, velocity) in query.iter_mut(world) {
        let step = velocity.linear * delta_time;
        transform.position += Vec3::new(step.x, 0.0, step.z);
    }
}
