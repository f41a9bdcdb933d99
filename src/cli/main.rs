use anyhow::Context;
use aviation_severity::{
    config::Config,
    ml::{score_distribution, BundleHandle, ModelStore, Predictor, TrainingPipeline},
    models::{PredictionRequest, RawRecord},
};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "aviation-severity")]
#[command(about = "Train and query aviation accident severity models", long_about = None)]
#[command(version)]
struct Cli {
    /// Model directory (overrides model_store.path)
    #[arg(short, long, env = "AVSEV_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a new model bundle from a JSON array of records
    Train {
        #[arg(short, long, value_name = "FILE")]
        records: PathBuf,
    },

    /// Predict severity for a JSON request
    Predict {
        /// e.g. '{"weather_condition": "IMC", "flight_phase": "LANDING"}'
        #[arg(short, long, default_value = "{}")]
        input: String,
    },

    /// Print the stored performance metadata
    Metadata,

    /// Print the severity-score distribution of a record file
    Distribution {
        #[arg(short, long, value_name = "FILE")]
        records: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    init_tracing(&config.observability.log_level, cli.json_logs || config.observability.json_logs);

    let model_dir = cli.model_dir.unwrap_or_else(|| config.model_store.path.clone());
    let store = ModelStore::new(model_dir);

    match cli.command {
        Commands::Train { records } => {
            let records = read_records(&records)?;
            let outcome = TrainingPipeline::new(config.training.clone())
                .run_and_save(&records, &store)
                .context("training failed")?;

            println!("{}", serde_json::to_string_pretty(&outcome.metadata)?);
        }

        Commands::Predict { input } => {
            let request: PredictionRequest =
                serde_json::from_str(&input).context("invalid prediction request")?;

            let handle = Arc::new(BundleHandle::empty());
            if let Err(e) = handle.load_from(&store) {
                tracing::warn!("Models unavailable: {}", e);
            }

            let result = Predictor::new(handle, config.prediction.clone()).predict(&request);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Metadata => {
            let metadata = store.load_metadata().context("no performance metadata")?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }

        Commands::Distribution { records } => {
            let records = read_records(&records)?;
            for entry in score_distribution(&records) {
                println!("{:<18} {}", entry.band.to_string(), entry.count);
            }
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("aviation_severity={}", default_level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn read_records(path: &Path) -> anyhow::Result<Vec<RawRecord>> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("{} is not a JSON array of records", path.display()))
}
