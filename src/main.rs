/// CLI и API сервер для модели рейтинга

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use player_rating::{
    preprocessing::RawTable, server, ArtifactStore, PipelineConfig, Predictor, RatingPipeline,
};

#[derive(Parser)]
#[command(name = "player-rating")]
#[command(about = "Train and serve a player overall rating model", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full training pipeline and write artifacts
    Train {
        /// Primary dataset (CSV)
        #[arg(long)]
        primary: PathBuf,

        /// Secondary dataset used for cross-dataset validation (CSV)
        #[arg(long)]
        secondary: PathBuf,

        /// Artifact directory
        #[arg(short, long)]
        output: PathBuf,

        /// Pipeline configuration (TOML)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print the feature importance ranking for a dataset
    Rank {
        #[arg(long)]
        primary: PathBuf,

        #[arg(short, long)]
        config: Option<String>,

        /// Number of ranking entries to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Predict a single rating from a JSON object of features
    Predict {
        #[arg(short, long)]
        artifacts: PathBuf,

        /// Feature values, e.g. '{"age": 25, "potential": 80, ...}'
        #[arg(short, long)]
        input: String,
    },

    /// Serve predictions over HTTP
    Serve {
        #[arg(short, long)]
        artifacts: PathBuf,

        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
    },
}

fn load_config(path: Option<&str>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading config {}", path)),
        None => Ok(PipelineConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            primary,
            secondary,
            output,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let pipeline = RatingPipeline::new(config)?;

            // Обучение занимает CPU надолго, уводим его из рантайма
            let result = tokio::task::spawn_blocking(move || pipeline.run_paths(&primary, &secondary))
                .await
                .context("training task panicked")??;

            ArtifactStore::new(&output).save_output(&result)?;

            for score in &result.report.scores {
                println!(
                    "{:<18} baseline {:.4}  test {:.4}  secondary {:.4}",
                    score.family.name(),
                    score.baseline_mae,
                    score.test_mae,
                    score.secondary_mae
                );
            }
            println!("Winner: {}", result.report.winner);
            println!("Features: {}", result.selected.names().join(", "));
        }

        Commands::Rank {
            primary,
            config,
            top,
        } => {
            let config = load_config(config.as_deref())?;
            let pipeline = RatingPipeline::new(config)?;
            let raw = RawTable::from_csv_path(&primary)
                .with_context(|| format!("reading {}", primary.display()))?;

            let (features, target) = pipeline.prepare_candidates(&raw)?;
            let (ranking, selected) = pipeline.rank(&features, &target)?;
            for (i, entry) in ranking.head(top).iter().enumerate() {
                println!("{:>3}. {:<28} {:.4}", i + 1, entry.name, entry.importance);
            }
            println!("Selected: {}", selected.names().join(", "));
        }

        Commands::Predict { artifacts, input } => {
            let predictor = Predictor::load(&artifacts)?;
            let request: serde_json::Value =
                serde_json::from_str(&input).context("input is not valid JSON")?;
            let response = predictor.predict_json(&request)?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        Commands::Serve { artifacts, addr } => {
            let predictor = Arc::new(Predictor::load(&artifacts)?);
            server::serve(predictor, addr).await?;
        }
    }

    Ok(())
}
