// Formation manager: roster, slot tables and the leader's commands.
//
// Slot targets are the leader's live position plus a fixed world-space offset.
// Offsets are NOT rotated with the leader's heading, so the formation keeps
// the same axis-aligned shape whichever way the leader travels.

use bevy_ecs::prelude::*;
use glam::{Quat, Vec3};
use log::{debug, info, warn};

use super::astar::find_path;
use super::components::{Agent, MotionState, Path, Role, Transform, Velocity};
use super::navigation::GridMap;
use super::scene::{ObstacleField, ObstaclePlacer, ObstacleProbe, ObstacleSet};
use super::steering::{AgentController, look_rotation};
use super::systems::{movement_system, steering_system};
use crate::NavResult;
use crate::config::SimConfig;

// ============================================================================
// SLOTS
// ============================================================================

/// Fixed identity of a formation position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotSpec {
    /// World-space displacement from the leader.
    pub offset: Vec3,
    /// Orientation an idle agent in this slot turns to.
    pub rotation: Quat,
}

impl SlotSpec {
    /// Slot whose resting orientation looks along `facing` (XZ plane).
    pub fn new(offset: Vec3, facing: Vec3) -> Self {
        Self {
            offset,
            rotation: look_rotation(facing).unwrap_or(Quat::IDENTITY),
        }
    }
}

/// Read-only view of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSnapshot {
    pub entity: Entity,
    pub slot: usize,
    pub is_leader: bool,
    pub position: Vec3,
    pub velocity: Vec3,
    pub rotation: Quat,
    pub state: MotionState,
}

impl AgentSnapshot {
    pub fn has_reached_target(&self) -> bool {
        self.state == MotionState::Idle
    }
}

// ============================================================================
// FORMATION MANAGER
// ============================================================================

/// Owns the grid, the scene backend and every agent.
pub struct FormationManager<S = ObstacleSet> {
    world: World,
    /// Agent entities indexed by slot.
    roster: Vec<Entity>,
    leader_slot: usize,
    slots: Vec<SlotSpec>,
    grid: GridMap,
    scene: S,
    controller: AgentController,
    ticks: u64,
}

impl<S> FormationManager<S>
where
    S: ObstacleField + ObstacleProbe + ObstaclePlacer,
{
    /// Spawn the leader in `leader_slot` and the followers, in order, in the
    /// remaining slots. Every agent starts facing +Z with zero velocity.
    ///
    /// The grid is scanned against `scene` once before the first search.
    pub fn create(
        mut grid: GridMap,
        scene: S,
        controller: AgentController,
        leader_slot: usize,
        slots: Vec<SlotSpec>,
        leader_spawn: Vec3,
        follower_spawns: &[Vec3],
    ) -> Self {
        assert!(
            leader_slot < slots.len(),
            "leader slot {leader_slot} outside {} slots",
            slots.len()
        );
        assert_eq!(
            follower_spawns.len() + 1,
            slots.len(),
            "need one spawn point per follower slot"
        );

        grid.update_grid(&scene);

        let mut world = World::new();
        let mut followers = follower_spawns.iter();
        let mut roster = Vec::with_capacity(slots.len());
        for slot in 0..slots.len() {
            let (agent, spawn) = if slot == leader_slot {
                (Agent::leader(slot), leader_spawn)
            } else {
                let spawn = *followers.next().expect("spawn count checked above");
                (Agent::follower(slot), spawn)
            };
            let entity = world
                .spawn((Transform::from_position(spawn), Velocity::default(), agent))
                .id();
            roster.push(entity);
        }

        info!(
            "formation created: {} agents, leader in slot {leader_slot}, grid {}x{}",
            roster.len(),
            grid.width(),
            grid.height()
        );

        Self {
            world,
            roster,
            leader_slot,
            slots,
            grid,
            scene,
            controller,
            ticks: 0,
        }
    }

    /// Build everything from configuration; each agent spawns at
    /// `anchor + its slot offset`.
    ///
    /// The configuration is validated first, so a hand-built `SimConfig`
    /// gets the same checks as one read from TOML.
    pub fn from_config(config: &SimConfig, scene: S, anchor: Vec3) -> NavResult<Self> {
        config.validate()?;
        let grid =
            GridMap::centered(config.grid.center, config.grid.world_size, config.grid.cell_size);
        let slots: Vec<SlotSpec> = config
            .formation
            .slots
            .iter()
            .map(|s| SlotSpec::new(s.offset, s.facing))
            .collect();
        let leader_slot = config.formation.leader_slot;
        let leader_spawn = anchor + slots[leader_slot].offset;
        let follower_spawns: Vec<Vec3> = slots
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != leader_slot)
            .map(|(_, s)| anchor + s.offset)
            .collect();

        Ok(Self::create(
            grid,
            scene,
            AgentController::new(config.steering.clone()),
            leader_slot,
            slots,
            leader_spawn,
            &follower_spawns,
        ))
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Plan from the leader's current position to `destination` and hand the
    /// path to the leader, replacing any previous one.
    ///
    /// Returns the number of waypoints; 0 means no route and the leader idles.
    /// On `OutOfBounds` nothing changes.
    pub fn request_leader_path(&mut self, destination: Vec3) -> NavResult<usize> {
        let origin = self.leader_position();
        let waypoints = match find_path(&mut self.grid, origin, destination) {
            Ok(w) => w,
            Err(e) => {
                warn!("leader path request rejected: {e}");
                return Err(e);
            }
        };
        let count = waypoints.len();
        if count == 0 {
            warn!("no walkable route from {origin} to {destination}");
        } else {
            info!("leader path to {destination}: {count} waypoints");
        }

        let leader = self.roster[self.leader_slot];
        let mut agent = self
            .world
            .get_mut::<Agent>(leader)
            .expect("leader entity carries an Agent");
        agent.role = Role::Leader {
            path: Path::new(waypoints),
        };
        agent.state = MotionState::Moving;
        Ok(count)
    }

    /// Spawn an obstacle body at `point` and rescan the grid.
    /// The leader's current path is not replanned.
    ///
    /// Returns the number of cells whose walkability changed.
    pub fn insert_obstacle(&mut self, point: Vec3) -> NavResult<usize> {
        if let Err(e) = self.grid.cell_at(point) {
            warn!("obstacle insertion rejected: {e}");
            return Err(e);
        }
        self.scene.place_obstacle(point);
        let changed = self.grid.update_grid(&self.scene);
        debug!("obstacle at {point}: {changed} cells blocked");
        Ok(changed)
    }

    /// Rescan the scene without adding anything.
    pub fn update_grid(&mut self) -> usize {
        self.grid.update_grid(&self.scene)
    }

    /// Advance every agent one step: steer all, then integrate all.
    pub fn tick(&mut self, delta_time: f32) {
        let leader_position = self.leader_position();
        steering_system(
            &mut self.world,
            &self.controller,
            &self.slots,
            leader_position,
            &self.scene,
            delta_time,
        );
        movement_system(&mut self.world, delta_time);
        self.ticks += 1;
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Where the agent in `slot` should be right now.
    pub fn target_position_for(&self, slot: usize) -> Vec3 {
        self.assert_slot(slot);
        self.leader_position() + self.slots[slot].offset
    }

    /// Resting orientation of `slot`; independent of the leader.
    pub fn target_orientation_for(&self, slot: usize) -> Quat {
        self.assert_slot(slot);
        self.slots[slot].rotation
    }

    pub fn leader_slot(&self) -> usize {
        self.leader_slot
    }

    pub fn leader_position(&self) -> Vec3 {
        self.transform(self.roster[self.leader_slot]).position
    }

    /// The leader's current waypoints (empty when it has none).
    pub fn leader_path(&self) -> &Path {
        let agent = self
            .world
            .get::<Agent>(self.roster[self.leader_slot])
            .expect("leader entity carries an Agent");
        match &agent.role {
            Role::Leader { path } => path,
            Role::Follower => unreachable!("leader slot holds a follower"),
        }
    }

    pub fn agent(&self, slot: usize) -> AgentSnapshot {
        self.assert_slot(slot);
        let entity = self.roster[slot];
        let agent = self.world.get::<Agent>(entity).expect("roster entity carries an Agent");
        let transform = self.transform(entity);
        let velocity = self
            .world
            .get::<Velocity>(entity)
            .expect("roster entity carries a Velocity");
        AgentSnapshot {
            entity,
            slot,
            is_leader: agent.role.is_leader(),
            position: transform.position,
            velocity: velocity.linear,
            rotation: transform.rotation,
            state: agent.state,
        }
    }

    /// Snapshots of the whole roster in slot order.
    pub fn agents(&self) -> Vec<AgentSnapshot> {
        (0..self.roster.len()).map(|slot| self.agent(slot)).collect()
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// True once every agent is idle.
    pub fn is_settled(&self) -> bool {
        self.agents().iter().all(AgentSnapshot::has_reached_target)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn grid(&self) -> &GridMap {
        &self.grid
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn controller(&self) -> &AgentController {
        &self.controller
    }

    fn transform(&self, entity: Entity) -> &Transform {
        self.world
            .get::<Transform>(entity)
            .expect("roster entity carries a Transform")
    }

    fn assert_slot(&self, slot: usize) {
        assert!(slot < self.slots.len(), "slot {slot} outside formation of {}", self.slots.len());
    }
}

impl FormationManager<ObstacleSet> {
    /// `from_config` over an empty `ObstacleSet` whose inserted bodies take
    /// `config.obstacles.radius`.
    pub fn with_default_scene(config: &SimConfig, anchor: Vec3) -> NavResult<Self> {
        let scene = ObstacleSet::with_placed_radius(config.obstacles.radius);
        Self::from_config(config, scene, anchor)
    }
}
