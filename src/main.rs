// Headless formation demo
// Plans a leader path across the grid and runs fixed ticks until the group settles

use clap::Parser;
use glam::Vec3;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use flume_formation::{FIXED_DT, FormationManager, NavResult, SimConfig};

/// Command line arguments for the formation demo.
#[derive(Parser, Debug)]
#[command(name = "flume_formation")]
#[command(about = "Leader/follower formation movement over an A* grid")]
#[command(version)]
struct Args {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<String>,

    /// Maximum number of fixed ticks to simulate
    #[arg(short, long, default_value_t = 1500)]
    ticks: u32,

    /// Leader destination on the XZ plane
    #[arg(
        long,
        num_args = 2,
        value_names = ["X", "Z"],
        allow_negative_numbers = true,
        default_values_t = [7.5, 7.5]
    )]
    dest: Vec<f32>,

    /// Obstacle to place before planning (repeatable)
    #[arg(
        long,
        num_args = 2,
        value_names = ["X", "Z"],
        allow_negative_numbers = true,
        action = clap::ArgAction::Append
    )]
    obstacle: Vec<f32>,

    /// Number of randomly scattered obstacles
    #[arg(long, default_value_t = 0)]
    random_obstacles: usize,

    /// Random seed for obstacle scattering
    #[arg(short, long, default_value_t = 7)]
    seed: u64,

    /// Print the grid with the planned path
    #[arg(long)]
    show_grid: bool,
}

fn main() {
    env_logger::init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> NavResult<()> {
    let config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };

    let mut formation = FormationManager::with_default_scene(&config, config.grid.center)?;

    for pair in args.obstacle.chunks_exact(2) {
        formation.insert_obstacle(Vec3::new(pair[0], 0.0, pair[1]))?;
    }

    if args.random_obstacles > 0 {
        let mut rng = StdRng::seed_from_u64(args.seed);
        let half = config.grid.world_size * 0.5;
        let center = config.grid.center;
        let mut placed = 0;
        while placed < args.random_obstacles {
            let point = Vec3::new(
                center.x + rng.gen_range(-half.x..half.x),
                0.0,
                center.z + rng.gen_range(-half.y..half.y),
            );
            // Keep the spawn area around the leader clear.
            if (point - formation.leader_position()).length() < 2.0 {
                continue;
            }
            formation.insert_obstacle(point)?;
            placed += 1;
        }
        info!("scattered {placed} obstacles (seed {})", args.seed);
    }

    let destination = Vec3::new(args.dest[0], 0.0, args.dest[1]);
    let waypoints = formation.request_leader_path(destination)?;
    if args.show_grid {
        println!("{}", formation.grid().ascii_map(formation.leader_path().waypoints()));
    }

    for _ in 0..args.ticks {
        formation.tick(FIXED_DT);
        if waypoints > 0 && formation.leader_path().is_finished() && formation.is_settled() {
            break;
        }
        if formation.ticks() % 50 == 0 {
            info!(
                "tick {}: leader at {} waypoint {}/{}",
                formation.ticks(),
                formation.leader_position(),
                formation.leader_path().cursor(),
                waypoints
            );
        }
    }

    info!(
        "stopped after {} ticks ({:.2}s simulated)",
        formation.ticks(),
        formation.ticks() as f32 * FIXED_DT
    );
    for agent in formation.agents() {
        println!(
            "slot {} {:<8} pos ({:6.2}, {:6.2}) reached {}",
            agent.slot,
            if agent.is_leader { "leader" } else { "follower" },
            agent.position.x,
            agent.position.z,
            agent.has_reached_target()
        );
    }
    Ok(())
}
