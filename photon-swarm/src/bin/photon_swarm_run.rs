use std::path::{Path, PathBuf};

use photon_swarm::artifacts::CheckpointDirectory;
use photon_swarm::{OptimizationResult, Optimizer, RunConfig, StopSignal};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn usage() -> ! {
    eprintln!("Usage: photon_swarm_run <config.json> [out_dir]");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  RUST_LOG=debug photon_swarm_run disk.json runs/disk");
    std::process::exit(2);
}

fn main() {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        usage();
    }

    let config_path = PathBuf::from(args.remove(0));
    let out_dir = if args.is_empty() {
        PathBuf::from("runs")
    } else {
        PathBuf::from(args.remove(0))
    };

    if !args.is_empty() {
        usage();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(&config_path, &out_dir) {
        Ok(result) => {
            println!(
                "{:?} after {} iterations, best cost {:e}",
                result.termination, result.iterations, result.best_cost
            );
            println!("{}", out_dir.display());
        }
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

fn run(config_path: &Path, out_dir: &Path) -> Result<OptimizationResult, BoxError> {
    let json = std::fs::read_to_string(config_path)?;
    let config = RunConfig::from_json(&json)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let stop = StopSignal::new();
    runtime.spawn(stop.clone().trigger_on_ctrl_c());

    let out_dir = out_dir.to_path_buf();
    let result = runtime.block_on(async move {
        tokio::task::spawn_blocking(move || optimize(&config, &out_dir, stop)).await
    })??;
    Ok(result)
}

fn optimize(config: &RunConfig, out_dir: &Path, stop: StopSignal) -> Result<OptimizationResult, BoxError> {
    let (swarm, space) = config.prepare()?;
    let mut sink = CheckpointDirectory::create(out_dir, config.checkpoint.format, config.checkpoint.naming)?;
    sink.write_json("run_config.json", config)?;

    let objective = config.objective();
    let result = {
        let mut optimizer = Optimizer::new(swarm, space)?
            .with_sink(&mut sink)
            .with_stop_signal(stop);
        optimizer.run(&objective)?
    };

    sink.write_json("result.json", &result)?;
    sink.validate_manifest()?;
    Ok(result)
}
