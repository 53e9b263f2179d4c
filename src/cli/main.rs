use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Client;
use serde_json::json;
use std::path::PathBuf;
use ticket_triage::config::Config;
use ticket_triage::ml::{
    validate_ticket_text, ArtifactStore, InferenceContext, ModelFamily, SelectionReport,
    TrainingService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ticket-triage-cli")]
#[command(about = "Ticket Triage training and prediction CLI", long_about = None)]
struct Cli {
    /// Prediction server for remote commands
    #[arg(short, long, default_value = "http://localhost:5001")]
    endpoint: String,

    /// Configuration file layered over the defaults
    #[arg(short, long, env = "TRIAGE_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Ticket corpus CSV, overrides `data.raw_path`
    #[arg(long)]
    data: Option<PathBuf>,

    /// Artifact directory, overrides `artifacts.dir`
    #[arg(long)]
    models: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: split, features, selection, tuning, evaluation
    Train,

    /// Fit and persist the vocabulary and label encoder
    Features,

    /// Train every configured family and keep the best
    Select,

    /// Cross-validated grid search and full-data refit
    Optimize {
        /// Family to tune instead of the configured one
        #[arg(short, long)]
        family: Option<ModelFamily>,
    },

    /// Latency and accuracy of the serving model on the test split
    Evaluate,

    /// Classify a ticket with local artifacts
    Predict {
        #[arg(short, long, default_value = "")]
        subject: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Classify a ticket through a running server
    RemotePredict {
        #[arg(short, long)]
        ticket_id: Option<String>,

        #[arg(short, long, default_value = "")]
        subject: String,

        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticket_triage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let client = Client::new();

    match cli.command {
        Commands::RemotePredict {
            ticket_id,
            subject,
            description,
        } => {
            let response = client
                .post(format!("{}/predict", cli.endpoint))
                .json(&json!({
                    "ticket_id": ticket_id,
                    "subject": subject,
                    "description": description,
                }))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        command => {
            let config = load_config(cli.config, cli.data, cli.models)?;
            let output = tokio::task::spawn_blocking(move || run_local(command, config))
                .await
                .context("training task panicked")??;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn load_config(
    path: Option<PathBuf>,
    data: Option<PathBuf>,
    models: Option<PathBuf>,
) -> Result<Config> {
    if let Some(path) = path {
        std::env::set_var("TRIAGE_CONFIG_PATH", path);
    }
    let mut config = Config::load().context("failed to load configuration")?;

    if let Some(data) = data {
        config.data.raw_path = data;
    }
    if let Some(models) = models {
        config.artifacts.dir = models;
    }
    Ok(config)
}

/// Commands that work on local files; returns the record to print
fn run_local(command: Commands, mut config: Config) -> Result<serde_json::Value> {
    if let Commands::Optimize { family: Some(family) } = &command {
        config.tuning.family = *family;
        config.tuning.tune_selected = false;
    }
    let service = TrainingService::new(config);

    let output = match command {
        Commands::Train => serde_json::to_value(service.run_all()?)?,

        Commands::Features => {
            let (train, test) = service.load_split()?;
            let features = service.build_features(&train, &test)?;
            json!({
                "vocabulary_size": features.extractor.vocab_size(),
                "categories": features.codec.classes(),
                "train_rows": features.train_x.nrows(),
                "test_rows": features.test_x.nrows(),
            })
        }

        Commands::Select => {
            let (train, test) = service.load_split()?;
            let features = service.load_features(&train, &test)?;
            serde_json::to_value(service.train_models(&features)?.report)?
        }

        Commands::Optimize { .. } => {
            let (train, test) = service.load_split()?;
            let features = service.load_features(&train, &test)?;
            let selected = previous_selection(service.store());
            serde_json::to_value(service.optimize(&features, selected)?.report)?
        }

        Commands::Evaluate => {
            let (train, test) = service.load_split()?;
            let features = service.load_features(&train, &test)?;
            serde_json::to_value(service.evaluate(&features)?)?
        }

        Commands::Predict {
            subject,
            description,
        } => {
            validate_ticket_text(Some(&subject), Some(&description))?;
            let context = InferenceContext::load(service.store())?;
            serde_json::to_value(context.predict(&subject, &description)?)?
        }

        Commands::RemotePredict { .. } | Commands::Health => {
            anyhow::bail!("remote commands are handled by the async client")
        }
    };

    Ok(output)
}

/// Best family recorded by the last selection run, if any
fn previous_selection(store: &ArtifactStore) -> Option<ModelFamily> {
    store
        .load_json::<SelectionReport>(store.results_path())
        .ok()
        .map(|report| report.best_family)
}
