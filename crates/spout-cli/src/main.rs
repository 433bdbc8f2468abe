mod commands;
mod registry;

use clap::{Parser, Subcommand};
use commands::{args_to_value, parse_key_val, run_manifest, run_spout, state_from_flags};
use registry::build_registry;
use spout_config::{Manifest, OutputConfig, Settings};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "spout")]
#[command(about = "Pull data out of databases into batch outputs", long_about = None)]
struct Cli {
    /// Directory holding spout.yaml
    #[arg(short, long, default_value = "config", global = true)]
    config_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one spout from command-line arguments
    Rise {
        /// Spout name (see `spout list`)
        spout: String,

        /// Spout arguments as KEY=value pairs
        #[arg(long, num_args = 0.., value_parser = parse_key_val)]
        args: Vec<(String, String)>,

        /// Folder receiving one JSON file per batch
        #[arg(long)]
        output_folder: PathBuf,

        /// State store: memory, file, redis or postgres
        #[arg(long, default_value = "memory")]
        state: String,

        /// Directory (file) or connection URL (redis, postgres) of the state store
        #[arg(long)]
        state_url: Option<String>,

        /// Key the run state is stored under; defaults to the spout name
        #[arg(long)]
        run_id: Option<String>,
    },

    /// Run the spouts of a YAML manifest in order
    Run {
        manifest: PathBuf,

        /// Only run this manifest entry
        #[arg(long)]
        only: Option<String>,
    },

    /// List available spouts
    List,

    /// Validate a YAML manifest
    Validate { manifest: PathBuf },
}

fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let level = match settings.logging.level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if settings.logging.json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = Settings::load(&cli.config_dir)?;
    init_tracing(&settings)?;

    let registry = build_registry();

    match cli.command {
        Commands::Rise {
            spout,
            args,
            output_folder,
            state,
            state_url,
            run_id,
        } => {
            let state = state_from_flags(&state, state_url)?;
            let output = OutputConfig::Folder {
                path: output_folder,
            };
            let run_id = run_id.unwrap_or_else(|| spout.clone());

            run_spout(&registry, &run_id, &spout, args_to_value(args), &output, &state).await?;
        }

        Commands::Run { manifest, only } => {
            info!("Running manifest {}", manifest.display());
            let results = run_manifest(&registry, &manifest, only.as_deref()).await?;
            info!("{} spout(s) run", results.len());
        }

        Commands::List => {
            for name in registry.list_spouts() {
                println!("{}", name);
            }
        }

        Commands::Validate { manifest: path } => {
            let manifest = Manifest::from_file(&path)?;
            manifest.validate(&registry.list_spouts())?;
            println!(
                "{} is valid ({} spout(s))",
                path.display(),
                manifest.spouts.len()
            );
        }
    }

    Ok(())
}
