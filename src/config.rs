use serde::Deserialize;
use std::path::Path;

use crate::request::GenerationOptions;
use crate::worker_pool::DEFAULT_WORKERS;

/// Settings for a serving process.
///
/// ```toml
/// workers = 64
/// model = "echo"
/// token_delay_ms = 5
///
/// [generation]
/// temperature = 0.7
/// stop_token_ids = [2]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Size of the blocking worker pool.
    pub workers: usize,
    /// Model served when a request does not name one.
    pub model: String,
    /// Per-token delay for the echo engine, in milliseconds.
    pub token_delay_ms: u64,
    /// Defaults for generation options left unset by callers.
    pub generation: GenerationOptions,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            model: "echo".into(),
            token_delay_ms: 0,
            generation: GenerationOptions::default(),
        }
    }
}

/// Load a [`ServingConfig`] from a TOML file.
///
/// # Examples
///
/// ```no_run
/// use serving_rs::config::load;
/// # tokio_test::block_on(async {
/// let cfg = load("serving.toml").await.unwrap();
/// assert!(cfg.workers > 0);
/// # });
/// ```
pub async fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<ServingConfig> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(toml::from_str(&text)?)
}
