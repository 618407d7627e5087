//! ready - load, inspect and run reaction-diffusion files

use clap::{Args, Parser, Subcommand};
use ready_core::{
    save_to_file, ComputeOptions, DataFormat, LoadedSystem, Properties, ReactionDiffusionSystem,
    ReadyConfig, SystemFactory,
};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ready")]
#[command(about = "Reaction-diffusion file loader and runner", long_about = None)]
struct Cli {
    /// Config TOML file (defaults to <config dir>/ready/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    compute: ComputeArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ComputeArgs {
    /// Refuse formula and kernel rules
    #[arg(long, global = true)]
    no_compute: bool,

    /// Compute platform index
    #[arg(long, global = true)]
    platform: Option<usize>,

    /// Compute device index
    #[arg(long, global = true)]
    device: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print what a file contains
    Info {
        /// RD file (.vti or .vtu)
        file: PathBuf,
    },
    /// Load a file, advance it and optionally save the result
    Run {
        /// RD file (.vti or .vtu)
        file: PathBuf,

        /// Timesteps to run (defaults to the configured runner.default_steps)
        #[arg(short, long)]
        steps: Option<usize>,

        /// Where to save the final state
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write data arrays as base64 binary
        #[arg(long)]
        binary: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = match &cli.config {
        Some(path) => ReadyConfig::load(path)?,
        None => ReadyConfig::load_default()?,
    };
    let options = compute_options(&config, &cli.compute);
    let factory = SystemFactory::default();
    let mut settings = config.render.render_settings();

    match cli.command {
        Commands::Info { file } => {
            let loaded = factory.create_from_file(&file, &options, &mut settings)?;
            print_info(&file, &loaded, &settings);
        }
        Commands::Run {
            file,
            steps,
            output,
            binary,
        } => {
            let LoadedSystem {
                mut system,
                warn_to_update,
            } = factory.create_from_file(&file, &options, &mut settings)?;
            if warn_to_update {
                tracing::warn!(file = %file.display(), "file uses an older format; re-save to update");
            }

            let steps = steps.unwrap_or(config.runner.default_steps);
            advance(system.as_mut(), steps, config.runner.report_every)?;

            if let Some(output) = output {
                let format = if binary {
                    DataFormat::Binary
                } else {
                    config.runner.data_format()
                };
                save_to_file(system.as_mut(), &output, &settings, format)?;
                tracing::info!(path = %output.display(), "saved");
            }
        }
    }
    Ok(())
}

fn compute_options(config: &ReadyConfig, args: &ComputeArgs) -> ComputeOptions {
    let mut options = config.compute.options();
    if args.no_compute {
        options.available = false;
    }
    if let Some(platform) = args.platform {
        options.platform = platform;
    }
    if let Some(device) = args.device {
        options.device = device;
    }
    options
}

fn advance(
    system: &mut dyn ReactionDiffusionSystem,
    steps: usize,
    report_every: usize,
) -> Result<(), Box<dyn Error>> {
    let chunk = report_every.max(1);
    let mut done = 0;
    while done < steps {
        let n = chunk.min(steps - done);
        system.update(n)?;
        done += n;
        if let Some((low, high)) = system.value_range() {
            tracing::info!(timesteps = system.timesteps_taken(), low, high, "progress");
        }
    }
    Ok(())
}

fn print_info(file: &Path, loaded: &LoadedSystem, settings: &Properties) {
    let system = loaded.system.as_ref();
    let [x, y, z] = system.dimensions();
    println!("file:        {}", file.display());
    println!("topology:    {}", system.topology().name());
    println!("rule:        {} ({})", system.rule_name(), system.rule_kind());
    println!("dimensions:  {} x {} x {}", x, y, z);
    println!("chemicals:   {}", system.number_of_chemicals());
    println!("scalar type: {}", system.scalar_type());
    if let Some(target) = system.compute_target() {
        println!("device:      platform {} device {}", target.platform, target.device);
    }
    if !system.description().is_empty() {
        println!("description: {}", system.description());
    }
    println!("parameters:");
    for (name, value) in system.parameters().iter() {
        println!("  {} = {}", name, value);
    }
    if let Some(chemical) = settings.get_chemical("active_chemical") {
        println!("active chemical: {}", chemical);
    }
    if loaded.warn_to_update {
        println!("warning: file uses another format version; re-save to update");
    }
}
