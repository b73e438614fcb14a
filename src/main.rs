use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use futures::TryStreamExt;
use serving_rs::logging::{self, LogLevel};
use serving_rs::{EchoEngine, GenerationOptions, ServingConfig, ServingModel, TokenId};
use tracing::{debug, info};

/// `serve`: run one generation through the serving layer
#[derive(Parser, Debug)]
#[command(name = "serve", version, about = "Run a generation against the echo engine")]
struct Cli {
    /// Path to a TOML serving config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name, overriding the config
    #[arg(short, long)]
    model: Option<String>,

    /// Comma separated prompt token ids
    #[arg(short, long, value_delimiter = ',', required = true)]
    tokens: Vec<TokenId>,

    /// Generation options as a JSON object
    #[arg(long)]
    options: Option<String>,

    /// Print each output item as soon as it is produced
    #[arg(short, long)]
    stream: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "info")]
    log_level: LogLevel,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level);

    let config = match &cli.config {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            serving_rs::config::load(path).await?
        }
        None => ServingConfig::default(),
    };
    let options: GenerationOptions = match &cli.options {
        Some(json) => serde_json::from_str(json)?,
        None => GenerationOptions::default(),
    };
    let model_name = cli.model.clone().unwrap_or_else(|| config.model.clone());

    let engine = EchoEngine::new()
        .model(model_name.clone())
        .token_delay(Duration::from_millis(config.token_delay_ms));
    let serving = ServingModel::from_config(engine, &config)?;
    info!(workers = config.workers, model = %model_name, "serving");

    if cli.stream {
        let mut stream = serving
            .generate_streaming(&model_name, cli.tokens, &options)
            .await?;
        while let Some(step) = stream.try_next().await? {
            println!("{}", serde_json::to_string(&step)?);
        }
    } else {
        let output = serving.generate(&model_name, cli.tokens, &options).await?;
        println!("{}", serde_json::to_string(&output)?);
    }
    Ok(())
}
