use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Identifier of a vocabulary token.
pub type TokenId = u32;

/// Sampling parameters handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub num_beams: usize,
    pub top_k: usize,
    pub top_p: f32,
    pub temperature: f32,
    /// Upper bound on generated tokens. Non-positive lets the engine decide.
    pub max_new_tokens: i32,
    /// Number of log probabilities returned per token.
    pub logprobs_num: usize,
    pub num_return_sequences: usize,
    pub repetition_penalty: f32,
    pub length_penalty: f32,
    pub stop_token_ids: Vec<TokenId>,
    /// Return probabilities of the prompt tokens instead of generating.
    pub return_prompt_probs: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            num_beams: 1,
            top_k: 1,
            top_p: 0.0,
            temperature: 0.0,
            max_new_tokens: -1,
            logprobs_num: 0,
            num_return_sequences: 1,
            repetition_penalty: 1.0,
            length_penalty: 1.0,
            stop_token_ids: Vec::new(),
            return_prompt_probs: false,
        }
    }
}

/// Caller-facing generation options.
///
/// Every field is optional; a missing value falls back to the
/// [`SamplingConfig`] default. Options deserialize from JSON or TOML.
///
/// ```
/// use serving_rs::GenerationOptions;
/// let opts: GenerationOptions =
///     serde_json::from_str(r#"{"temperature": 0.7, "top_k": null}"#).unwrap();
/// let cfg = opts.sampling_config();
/// assert_eq!(cfg.temperature, 0.7);
/// assert_eq!(cfg.top_k, 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub num_beams: Option<usize>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    pub temperature: Option<f32>,
    pub max_new_tokens: Option<i32>,
    pub logprobs_num: Option<usize>,
    pub num_return_sequences: Option<usize>,
    pub repetition_penalty: Option<f32>,
    pub length_penalty: Option<f32>,
    pub stop_token_ids: Option<Vec<TokenId>>,
    /// Positions in the prompt where external embeddings are spliced in.
    pub subinput_pos: Option<Vec<usize>>,
    /// Embeddings matching `subinput_pos`, one per position.
    pub subinput_embedding: Option<Vec<Vec<f32>>>,
    /// Offset into the prompt from which prompt probabilities are returned.
    pub prompt_probs_offset: Option<usize>,
}

impl GenerationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn max_new_tokens(mut self, max_new_tokens: i32) -> Self {
        self.max_new_tokens = Some(max_new_tokens);
        self
    }

    pub fn num_return_sequences(mut self, n: usize) -> Self {
        self.num_return_sequences = Some(n);
        self
    }

    pub fn stop_token_ids(mut self, ids: Vec<TokenId>) -> Self {
        self.stop_token_ids = Some(ids);
        self
    }

    pub fn prompt_probs_offset(mut self, offset: usize) -> Self {
        self.prompt_probs_offset = Some(offset);
        self
    }

    /// Fill every unset field from `defaults`.
    pub fn or(self, defaults: &GenerationOptions) -> Self {
        let d = defaults.clone();
        Self {
            num_beams: self.num_beams.or(d.num_beams),
            top_k: self.top_k.or(d.top_k),
            top_p: self.top_p.or(d.top_p),
            temperature: self.temperature.or(d.temperature),
            max_new_tokens: self.max_new_tokens.or(d.max_new_tokens),
            logprobs_num: self.logprobs_num.or(d.logprobs_num),
            num_return_sequences: self.num_return_sequences.or(d.num_return_sequences),
            repetition_penalty: self.repetition_penalty.or(d.repetition_penalty),
            length_penalty: self.length_penalty.or(d.length_penalty),
            stop_token_ids: self.stop_token_ids.or(d.stop_token_ids),
            subinput_pos: self.subinput_pos.or(d.subinput_pos),
            subinput_embedding: self.subinput_embedding.or(d.subinput_embedding),
            prompt_probs_offset: self.prompt_probs_offset.or(d.prompt_probs_offset),
        }
    }

    /// Sampling configuration with defaults applied.
    pub fn sampling_config(&self) -> SamplingConfig {
        let d = SamplingConfig::default();
        SamplingConfig {
            num_beams: self.num_beams.unwrap_or(d.num_beams),
            top_k: self.top_k.unwrap_or(d.top_k),
            top_p: self.top_p.unwrap_or(d.top_p),
            temperature: self.temperature.unwrap_or(d.temperature),
            max_new_tokens: self.max_new_tokens.unwrap_or(d.max_new_tokens),
            logprobs_num: self.logprobs_num.unwrap_or(d.logprobs_num),
            num_return_sequences: self.num_return_sequences.unwrap_or(d.num_return_sequences),
            repetition_penalty: self.repetition_penalty.unwrap_or(d.repetition_penalty),
            length_penalty: self.length_penalty.unwrap_or(d.length_penalty),
            stop_token_ids: self.stop_token_ids.clone().unwrap_or(d.stop_token_ids),
            return_prompt_probs: d.return_prompt_probs,
        }
    }
}

/// A generation request as submitted to an [`Engine`](crate::Engine).
///
/// Built once from [`GenerationOptions`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    id: Uuid,
    submitted_at: DateTime<Utc>,
    model_name: String,
    input_tokens: Vec<TokenId>,
    sampling_config: SamplingConfig,
    subinput_pos: Vec<usize>,
    subinput_embedding: Vec<Vec<f32>>,
    prompt_probs_offset: Option<usize>,
}

impl GenerationRequest {
    /// Translate `options` into a request for `model_name`.
    ///
    /// Setting `prompt_probs_offset` switches the request to prompt
    /// probability extraction: exactly one new token is requested and
    /// `return_prompt_probs` is enabled.
    pub fn new(
        model_name: impl Into<String>,
        input_tokens: Vec<TokenId>,
        options: &GenerationOptions,
    ) -> Self {
        let mut sampling_config = options.sampling_config();
        if options.prompt_probs_offset.is_some() {
            sampling_config.max_new_tokens = 1;
            sampling_config.return_prompt_probs = true;
        }
        Self {
            id: Uuid::new_v4(),
            submitted_at: Utc::now(),
            model_name: model_name.into(),
            input_tokens,
            sampling_config,
            subinput_pos: options.subinput_pos.clone().unwrap_or_default(),
            subinput_embedding: options.subinput_embedding.clone().unwrap_or_default(),
            prompt_probs_offset: options.prompt_probs_offset,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn input_tokens(&self) -> &[TokenId] {
        &self.input_tokens
    }

    pub fn sampling_config(&self) -> &SamplingConfig {
        &self.sampling_config
    }

    pub fn subinput_pos(&self) -> &[usize] {
        &self.subinput_pos
    }

    pub fn subinput_embedding(&self) -> &[Vec<f32>] {
        &self.subinput_embedding
    }

    pub fn prompt_probs_offset(&self) -> Option<usize> {
        self.prompt_probs_offset
    }

    /// Reject requests the engine could never serve.
    pub fn validate(&self) -> Result<(), EngineError> {
        let cfg = &self.sampling_config;
        let invalid = |msg: &str| Err(EngineError::InvalidArgument(msg.to_string()));
        if self.model_name.trim().is_empty() {
            return invalid("model name is empty");
        }
        if self.input_tokens.is_empty() {
            return invalid("input tokens are empty");
        }
        if cfg.num_beams == 0 {
            return invalid("num_beams must be at least 1");
        }
        if cfg.num_return_sequences == 0 {
            return invalid("num_return_sequences must be at least 1");
        }
        if !(0.0..=1.0).contains(&cfg.top_p) {
            return invalid("top_p must lie in [0, 1]");
        }
        if cfg.temperature.is_nan() || cfg.temperature < 0.0 {
            return invalid("temperature must be a non-negative number");
        }
        if self.subinput_pos.len() != self.subinput_embedding.len() {
            return invalid("subinput_pos and subinput_embedding differ in length");
        }
        if let Some(offset) = self.prompt_probs_offset {
            if offset >= self.input_tokens.len() {
                return invalid("prompt_probs_offset is past the end of the prompt");
            }
        }
        Ok(())
    }
}
