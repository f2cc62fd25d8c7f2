use anyhow::{Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use wildwood_core::{
    ControlCommand, SpeciesKind, World, WorldConfig, apply_control_command,
};

/// Headless driver: builds a world from the CLI arguments and advances it a
/// fixed number of ticks, reporting a census at a configurable cadence.
#[derive(Parser, Debug)]
#[command(name = "wildwood", about = "Run the wildwood ecosystem simulation headless")]
struct Args {
    /// RNG seed; omit for a fresh world every run.
    #[arg(long)]
    seed: Option<u64>,

    /// World width in world units.
    #[arg(long, default_value_t = 800.0)]
    width: f32,

    /// World height in world units.
    #[arg(long, default_value_t = 600.0)]
    height: f32,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 5_000)]
    ticks: u64,

    /// Timestep per tick, in simulated seconds.
    #[arg(long, default_value_t = 0.016)]
    dt: f32,

    /// Speed multiplier, clamped to the supported range.
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Emit a census every N ticks.
    #[arg(long, default_value_t = 500)]
    report_interval: u64,

    /// Species left out of the initial stocking. Repeatable.
    #[arg(long = "disable", value_name = "SPECIES")]
    disabled: Vec<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = WorldConfig {
        world_width: args.width,
        world_height: args.height,
        rng_seed: args.seed,
        ..WorldConfig::default()
    };
    let mut world = World::new(config)?;
    apply_control_command(&mut world, ControlCommand::SetSpeed(args.speed));

    if !args.disabled.is_empty() {
        for name in &args.disabled {
            let kind = SpeciesKind::from_name(name)
                .ok_or_else(|| anyhow!("unknown species: {name}"))?;
            apply_control_command(
                &mut world,
                ControlCommand::ToggleSpecies { kind, enabled: false },
            );
        }
        // Toggles bind at stocking time, so restock before the run starts.
        apply_control_command(&mut world, ControlCommand::Reset);
    }

    info!(
        animals = world.animal_count(),
        vegetation = world.vegetation_count(),
        speed = world.speed(),
        "simulation start"
    );

    let report_interval = args.report_interval.max(1);
    for step in 1..=args.ticks {
        world.tick(args.dt);
        if step.is_multiple_of(report_interval) {
            report(&world);
        }
        if world.animal_count() == 0 {
            warn!(tick = world.ticks().0, "population collapsed");
            break;
        }
    }

    report(&world);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn report(world: &World) {
    for tally in world.statistics() {
        if tally.total > 0 {
            info!(
                species = tally.name,
                total = tally.total,
                males = tally.males,
                females = tally.females,
                "census"
            );
        }
    }
    info!(
        tick = world.ticks().0,
        time = world.time(),
        animals = world.animal_count(),
        vegetation = world.vegetation_count(),
        "tick report"
    );
}
