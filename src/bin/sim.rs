//! janet-nav-sim binary
//!
//! Runs the nav engine against a synthetic scene: a walled arena and a
//! lattice of agents crossing it. Tick events and periodic stats are logged
//! as JSON.
//!
//! ## Configuration (env / TOML via `config` crate)
//!
//! Engine tuning (`NavConfig`) is read from the optional `--config` TOML
//! file, then overridden by `NAV_*` environment variables
//! (`NAV_MAX_QUERIES`, `NAV_MAX_ITERATIONS`, `NAV_KEY_QUANTIZATION`, ...).
//!
//! | Key                  | Default | Description                         |
//! |----------------------|---------|-------------------------------------|
//! | `NAV_TICK_RATE_HZ`   | `30`    | Engine tick rate                    |
//! | `NAV_AGENTS`         | `64`    | Agents in the lattice               |
//! | `NAV_SPEED`          | `4.0`   | Agent speed (world units / second)  |
//! | `NAV_SEED`           | `42`    | Terrain seed                        |
//! | `NAV_CELL_SIZE`      | `0.5`   | Surface cell size                   |
//! | `NAV_STATS_EVERY`    | `60`    | Ticks between stats lines           |

use anyhow::{Context, Result};
use clap::Parser;
use janet_nav::{
    driver::{DriverConfig, NavDriver},
    AgentHandle, AreaMask, HeightField, NavConfig, NavEngine, ObstacleShape, PathStatus,
    SurfaceConfig, Transform, TraversalProfile, Vec3,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "janet-nav-sim", about = "Janet Nav Engine simulation", version)]
struct Args {
    /// Optional TOML file with engine settings
    #[arg(long, env = "NAV_CONFIG")]
    config: Option<PathBuf>,

    /// Tick rate (Hz)
    #[arg(long, env = "NAV_TICK_RATE_HZ", default_value_t = 30.0)]
    tick_rate_hz: f32,

    /// Number of agents
    #[arg(long, env = "NAV_AGENTS", default_value_t = 64)]
    agents: usize,

    /// Agent speed in world units per second
    #[arg(long, env = "NAV_SPEED", default_value_t = 4.0)]
    speed: f32,

    /// Terrain seed
    #[arg(long, env = "NAV_SEED", default_value_t = 42)]
    seed: u64,

    /// Surface cell size in world units
    #[arg(long, env = "NAV_CELL_SIZE", default_value_t = 0.5)]
    cell_size: f32,

    /// Ticks between stats lines
    #[arg(long, env = "NAV_STATS_EVERY", default_value_t = 60)]
    stats_every: u64,
}

fn load_nav_config(path: Option<&PathBuf>) -> Result<NavConfig> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path.as_path()).required(true));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix("NAV").try_parsing(true))
        .build()
        .context("Failed to read nav settings")?;
    let nav: NavConfig = settings
        .try_deserialize()
        .context("Invalid nav settings")?;
    Ok(nav)
}

// ---------------------------------------------------------------------------
// Scene
// ---------------------------------------------------------------------------

fn build_scene(engine: &mut NavEngine, args: &Args) -> Result<Vec<AgentHandle>> {
    // Rolling terrain over the whole arena.
    let terrain = HeightField::generated(args.seed, 128, 128, 0.5, 0.25)
        .context("Failed to generate terrain")?;
    engine.add_obstacle(
        ObstacleShape::HeightField(Arc::new(terrain)),
        AreaMask::WALKABLE,
        Transform::at(Vec3::new(32.0, 32.0, 0.0)),
    )?;

    // A wall down the middle with a gap at each end.
    engine.add_obstacle(
        ObstacleShape::Box {
            half_extents: Vec3::new(0.5, 24.0, 3.0),
        },
        AreaMask::NOT_WALKABLE,
        Transform::at(Vec3::new(32.0, 32.0, 0.0)),
    )?;

    let side = (args.agents as f32).sqrt().ceil().max(1.0) as usize;
    let mut handles = Vec::with_capacity(args.agents);
    for i in 0..args.agents {
        let (row, col) = (i / side, i % side);
        let y = 4.0 + 56.0 * (row as f32 + 0.5) / side as f32;
        let x = 4.0 + 20.0 * (col as f32 + 0.5) / side as f32;
        let handle = engine.register_agent(
            format!("agent-{}", i),
            TraversalProfile {
                area_mask: AreaMask::WALKABLE,
                position: Vec3::new(x, y, 0.0),
            },
        )?;
        // Cross to the mirrored spot behind the wall.
        engine.request_path(handle, Vec3::new(64.0 - x, 64.0 - y, 0.0), AreaMask::WALKABLE)?;
        handles.push(handle);
    }
    Ok(handles)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("janet_nav=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let nav_config = load_nav_config(args.config.as_ref())?;

    log::info!(
        "Starting janet-nav-sim (agents={}, slots={}, iterations={}, seed={})",
        args.agents,
        nav_config.max_queries,
        nav_config.max_iterations,
        args.seed,
    );

    let surface_config = SurfaceConfig {
        cell_size: args.cell_size,
        ..Default::default()
    };
    let mut engine = NavEngine::new(nav_config, surface_config).context("Failed to build engine")?;
    let handles = build_scene(&mut engine, &args)?;
    let engine = Arc::new(Mutex::new(engine));

    let (tx, mut rx) = tokio::sync::mpsc::channel(256);
    let driver = NavDriver::new(
        DriverConfig {
            tick_rate_hz: args.tick_rate_hz,
        },
        engine.clone(),
    )
    .with_events(tx);

    // Event log.
    let logger = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => log::debug!("{}", line),
                Err(e) => log::warn!("Failed to serialise tick event: {}", e),
            }
        }
    });

    // Host side: move agents at the tick rate and report progress.
    let step = args.speed / args.tick_rate_hz;
    let stats_every = args.stats_every.max(1);
    let period = std::time::Duration::from_secs_f32(1.0 / args.tick_rate_hz.max(1.0));
    let mover = tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        let mut frame: u64 = 0;
        loop {
            timer.tick().await;
            frame += 1;

            let mut engine = engine.lock();
            let mut arrived = 0;
            for &handle in &handles {
                if let Err(e) = engine.advance(handle, step) {
                    log::warn!("Advance failed for {}: {}", handle, e);
                    continue;
                }
                if engine.agent(handle).map(|a| a.arrived).unwrap_or(false) {
                    arrived += 1;
                }
                if let Ok(PathStatus::Failed) = engine.poll(handle) {
                    log::debug!("{} has no path", handle);
                }
            }

            if frame % stats_every == 0 {
                match serde_json::to_string(&engine.stats()) {
                    Ok(stats) => log::info!("stats {} arrived={}/{}", stats, arrived, handles.len()),
                    Err(e) => log::warn!("Failed to serialise stats: {}", e),
                }
            }
        }
    });

    // Run until shutdown
    let result = driver.run().await;
    mover.abort();
    logger.abort();
    result
}
