use flume_formation::config::SteeringConfig;
use flume_formation::engine::scene::{ObstacleSet, ObstacleTag};
use flume_formation::engine::steering::planar;
use flume_formation::engine::{Agent, MotionState, Transform, Velocity};
use flume_formation::{AgentController, FIXED_DT, FormationManager, NavError, SimConfig};
use glam::{Quat, Vec3};
use proptest::prelude::*;

const EPS: f32 = 1e-4;

fn formation() -> FormationManager {
    FormationManager::with_default_scene(&SimConfig::default(), Vec3::ZERO).unwrap()
}

/// Tick until every agent idles or `max_ticks` pass; checks the speed bound on every tick.
fn run_until_settled(fm: &mut FormationManager, max_ticks: u32) -> bool {
    let max_speed = fm.controller().params.max_speed;
    for _ in 0..max_ticks {
        fm.tick(FIXED_DT);
        for agent in fm.agents() {
            assert!(
                agent.velocity.length() <= max_speed + EPS,
                "slot {} moving at {}",
                agent.slot,
                agent.velocity.length()
            );
        }
        if fm.leader_path().is_finished() && fm.is_settled() {
            return true;
        }
    }
    false
}

#[test]
fn group_travels_and_settles_in_formation() {
    let mut fm = formation();
    let destination = Vec3::new(-2.5, 0.0, 4.5);
    let waypoints = fm.request_leader_path(destination).unwrap();
    assert!(waypoints > 0);

    assert!(run_until_settled(&mut fm, 3000), "formation never settled");

    let threshold = fm.controller().params.waypoint_threshold;
    let leader = fm.leader_position();
    let final_wp = *fm.leader_path().waypoints().last().unwrap();
    assert!(planar(final_wp - leader).length() < threshold);

    for agent in fm.agents() {
        assert_eq!(agent.state, MotionState::Idle);
        assert_eq!(agent.velocity, Vec3::ZERO);
        if !agent.is_leader {
            let target = fm.target_position_for(agent.slot);
            assert!(planar(target - agent.position).length() < threshold + EPS);
        }
    }
}

#[test]
fn settled_agents_face_their_slot_orientation() {
    let mut fm = formation();
    fm.request_leader_path(Vec3::new(3.5, 0.0, 3.5)).unwrap();
    assert!(run_until_settled(&mut fm, 3000));
    for _ in 0..300 {
        fm.tick(FIXED_DT);
    }
    for agent in fm.agents() {
        let want = fm.target_orientation_for(agent.slot);
        assert!(agent.rotation.angle_between(want) < 1e-2, "slot {}", agent.slot);
    }
}

#[test]
fn no_route_leaves_leader_idle() {
    let mut fm = formation();
    // Ring of bodies around cell (5, 5) -> world (-4.5, -4.5).
    for dx in -1..=1 {
        for dz in -1..=1 {
            if (dx, dz) != (0, 0) {
                fm.insert_obstacle(Vec3::new(-4.5 + dx as f32, 0.0, -4.5 + dz as f32))
                    .unwrap();
            }
        }
    }
    assert_eq!(fm.request_leader_path(Vec3::new(-4.5, 0.0, -4.5)).unwrap(), 0);

    fm.tick(FIXED_DT);
    let leader = fm.agent(fm.leader_slot());
    assert!(leader.has_reached_target());
    assert_eq!(leader.velocity, Vec3::ZERO);
}

#[test]
fn obstacle_insertion_keeps_current_path() {
    let mut fm = formation();
    fm.request_leader_path(Vec3::new(8.5, 0.0, 0.5)).unwrap();
    let before = fm.leader_path().clone();

    let on_path = before.waypoints()[4];
    let changed = fm.insert_obstacle(on_path).unwrap();
    assert!(changed > 0);
    assert!(!fm.grid().cell_at(on_path).unwrap().walkable);
    assert_eq!(fm.leader_path(), &before);
    assert_eq!(fm.scene().len(), 1);
}

#[test]
fn new_request_replaces_path() {
    let mut fm = formation();
    fm.request_leader_path(Vec3::new(8.5, 0.0, 0.5)).unwrap();
    for _ in 0..100 {
        fm.tick(FIXED_DT);
    }
    assert!(fm.leader_path().cursor() > 0);

    fm.request_leader_path(Vec3::new(-8.5, 0.0, -8.5)).unwrap();
    assert_eq!(fm.leader_path().cursor(), 0);
    assert_eq!(fm.agent(fm.leader_slot()).state, MotionState::Moving);
}

#[test]
fn body_near_cell_corner_blocks_the_cell() {
    let mut config = SimConfig::default();
    config.obstacles.radius = 0.1;
    let mut fm = FormationManager::with_default_scene(&config, Vec3::ZERO).unwrap();

    let point = Vec3::new(2.99, 0.0, 2.99);
    assert!(fm.insert_obstacle(point).unwrap() > 0);
    assert!(!fm.grid().cell_at(point).unwrap().walkable);
    assert_eq!(fm.request_leader_path(point).unwrap(), 0);
}

#[test]
fn out_of_bounds_request_reports_error() {
    let mut fm = formation();
    let err = fm.request_leader_path(Vec3::new(30.0, 0.0, 0.0)).unwrap_err();
    assert!(matches!(err, NavError::OutOfBounds { .. }));
}

#[test]
fn leader_steers_away_from_tagged_obstacle() {
    let mut scene = ObstacleSet::new();
    // Off-grid-cell body that sits right in front of the leader.
    scene.add_circle(Vec3::new(0.2, 0.0, 1.2), 0.3, ObstacleTag::Obstacle);
    let controller = AgentController::new(SteeringConfig::default());

    let plain = controller
        .steer_towards(Vec3::ZERO, Vec3::Z, Vec3::new(0.0, 0.0, 6.0), &ObstacleSet::new())
        .unwrap();
    let avoided = controller
        .steer_towards(Vec3::ZERO, Vec3::Z, Vec3::new(0.0, 0.0, 6.0), &scene)
        .unwrap();
    assert!(avoided.x < plain.x);
    assert!(avoided.length() <= controller.params.max_speed + EPS);
}

proptest! {
    #[test]
    fn follower_approaches_stationary_target_monotonically(
        dist in 0.6f32..15.0,
        angle in 0.0f32..std::f32::consts::TAU,
        heading in 0.0f32..std::f32::consts::TAU,
    ) {
        let controller = AgentController::default();
        let scene = ObstacleSet::new();
        let target = Vec3::new(1.0, 0.0, -2.0);

        let mut agent = Agent::follower(0);
        let mut transform = Transform {
            position: target + Vec3::new(angle.cos(), 0.0, angle.sin()) * dist,
            rotation: Quat::from_rotation_y(heading),
        };
        let mut velocity = Velocity::default();
        let mut last = planar(target - transform.position).length();
        let mut arrived = false;

        for _ in 0..5000 {
            controller.update(
                &mut agent,
                &mut transform,
                &mut velocity,
                target,
                Quat::IDENTITY,
                &scene,
                FIXED_DT,
            );
            prop_assert!(velocity.linear.length() <= controller.params.max_speed + EPS);
            if agent.state == MotionState::Idle {
                prop_assert_eq!(velocity.linear, Vec3::ZERO);
                prop_assert!(last < controller.params.waypoint_threshold);
                arrived = true;
                break;
            }
            transform.position += velocity.linear * FIXED_DT;
            let now = planar(target - transform.position).length();
            prop_assert!(now < last, "distance grew from {} to {}", last, now);
            last = now;
        }
        prop_assert!(arrived);
    }

    #[test]
    fn steering_output_is_speed_bounded(
        px in -5.0f32..5.0, pz in -5.0f32..5.0,
        tx in -20.0f32..20.0, tz in -20.0f32..20.0,
        heading in 0.0f32..std::f32::consts::TAU,
        strength in 0.0f32..50.0,
    ) {
        let mut scene = ObstacleSet::new();
        scene.add_circle(Vec3::new(0.0, 0.0, 0.0), 0.8, ObstacleTag::Obstacle);
        scene.add_circle(Vec3::new(3.0, 0.0, -2.0), 1.2, ObstacleTag::Obstacle);
        let mut params = SteeringConfig::default();
        params.avoidance_strength = strength;
        let controller = AgentController::new(params);

        let forward = Quat::from_rotation_y(heading) * Vec3::Z;
        let position = Vec3::new(px, 0.0, pz);
        let target = Vec3::new(tx, 0.0, tz);
        if let Some(v) = controller.steer_towards(position, forward, target, &scene) {
            prop_assert!(v.length() <= controller.params.max_speed + EPS);
            prop_assert_eq!(v.y, 0.0);
        }
    }
}
