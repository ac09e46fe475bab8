//! Disk target example
//!
//! Optimizes a disk toward a 250 nm target radius with the area surrogate,
//! writes per-iteration checkpoints, then starts a second, local-best run
//! from the best design of the first.
//!
//! Run: `cargo run -p photon-swarm --example disk_target`

use photon_swarm::artifacts::{load_checkpoint, CheckpointDirectory, CheckpointFormat, CheckpointNaming};
use photon_swarm::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    println!("PhotonSwarm Disk Target Example");
    println!("===============================");

    let stop = StopSignal::new();
    tokio::spawn(stop.clone().trigger_on_ctrl_c());

    let out_dir = std::env::temp_dir().join("photon_swarm_disk_target");
    let first = tokio::task::spawn_blocking({
        let stop = stop.clone();
        let out_dir = out_dir.clone();
        move || first_run(&out_dir, stop)
    })
    .await??;

    println!("\nFirst run:");
    println!("  Termination: {:?}", first.termination);
    println!("  Iterations: {}", first.iterations);
    println!("  Best cost: {:e}", first.best_cost);
    println!("  Sanity: {:?}", first.sanity);

    let checkpoint_path = out_dir.join(format!("checkpoint_iter_{:04}.json", first.iterations));
    let checkpoint = load_checkpoint(&checkpoint_path)?;
    let second = tokio::task::spawn_blocking(move || resumed_run(&checkpoint, stop)).await??;

    println!("\nResumed local-best run:");
    println!("  Termination: {:?}", second.termination);
    println!("  Best cost: {:e}", second.best_cost);
    if let Some(design) = &second.best_design {
        let radius = design.anchors.radii().next().unwrap_or_default();
        println!("  Radius: {:.1} nm", radius * 1e9);
        println!("  Period: {:.1} nm", design.layers.period * 1e9);
    }

    Ok(())
}

fn space() -> photon_swarm::Result<DesignSpace> {
    DesignSpace::new(&DesignConfig {
        topology: Topology::Disk,
        num_anchors: Some(64),
        resolution: 128,
        ..DesignConfig::default()
    })
}

fn first_run(
    out_dir: &std::path::Path,
    stop: StopSignal,
) -> Result<OptimizationResult, Box<dyn std::error::Error + Send + Sync>> {
    let space = space()?;
    let config = SwarmConfig::builder()
        .particle_count(space.suggested_particle_count())
        .bounds(space.bounds().clone())
        .velocity_clamp(Some(VelocityClamp::new(-50e-9, 50e-9)?))
        .max_iter(30)
        .seed(7)
        .build()?;

    let mut sink = CheckpointDirectory::create(out_dir, CheckpointFormat::Json, CheckpointNaming::PerIteration)?;
    let objective = TargetArea::for_radius(250e-9, Topology::Disk).with_resolution(128);
    let result = Optimizer::new(config, space)?
        .with_sink(&mut sink)
        .with_stop_signal(stop)
        .run(&objective)?;
    sink.validate_manifest()?;
    Ok(result)
}

fn resumed_run(
    checkpoint: &Checkpoint,
    stop: StopSignal,
) -> Result<OptimizationResult, Box<dyn std::error::Error + Send + Sync>> {
    let space = space()?;
    let config = SwarmConfig::builder()
        .particle_count(20)
        .bounds(space.bounds().clone())
        .best_topology(BestTopology::Local)
        .max_iter(20)
        .seed(8)
        .build()?;

    let objective = TargetArea::for_radius(250e-9, Topology::Disk).with_resolution(128);
    let mut optimizer = Optimizer::new(config, space)?.with_stop_signal(stop);
    optimizer.seed_design(0, &checkpoint.design())?;
    Ok(optimizer.run(&objective)?)
}
