use std::time::Duration;

use serde::Serialize;
use tracing::trace;

use crate::engine::{BlockingIterator, Engine};
use crate::request::{GenerationRequest, TokenId};
use crate::status::{RetCode, Status};

/// One streamed token from the [`EchoEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EchoStep {
    pub index: usize,
    pub token_id: TokenId,
}

/// In-process [`Engine`] that answers every prompt with the prompt itself.
///
/// Output stops before the first stop token and is cut to
/// `max_new_tokens` when that is positive. Streaming pulls sleep for the
/// configured per-token delay, which makes them genuinely blocking.
#[derive(Debug, Clone, Default)]
pub struct EchoEngine {
    model: Option<String>,
    token_delay: Duration,
}

impl EchoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only serve requests naming `model`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Block for `delay` before every streamed token.
    pub fn token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = delay;
        self
    }

    fn check_model(&self, request: &GenerationRequest) -> Result<(), Status> {
        match &self.model {
            Some(model) if model != request.model_name() => Err(Status::new(
                RetCode::InvalidArgument,
                format!("unknown model {}", request.model_name()),
            )),
            _ => Ok(()),
        }
    }

    fn echo(request: &GenerationRequest) -> Vec<TokenId> {
        let cfg = request.sampling_config();
        let mut out: Vec<TokenId> = request
            .input_tokens()
            .iter()
            .copied()
            .take_while(|t| !cfg.stop_token_ids.contains(t))
            .collect();
        if cfg.max_new_tokens > 0 {
            out.truncate(cfg.max_new_tokens as usize);
        }
        out
    }
}

impl Engine for EchoEngine {
    type Output = Vec<Vec<TokenId>>;
    type Iter = EchoIterator;

    fn generate(&self, request: &GenerationRequest) -> Result<Self::Output, Status> {
        self.check_model(request)?;
        let tokens = Self::echo(request);
        Ok(vec![tokens; request.sampling_config().num_return_sequences])
    }

    fn generate_streaming(&self, request: &GenerationRequest) -> Result<Self::Iter, Status> {
        self.check_model(request)?;
        Ok(EchoIterator {
            tokens: Self::echo(request).into_iter(),
            index: 0,
            delay: self.token_delay,
        })
    }
}

/// Iterator handed out by [`EchoEngine::generate_streaming`].
#[derive(Debug)]
pub struct EchoIterator {
    tokens: std::vec::IntoIter<TokenId>,
    index: usize,
    delay: Duration,
}

impl BlockingIterator for EchoIterator {
    type Item = EchoStep;

    fn get_next(&mut self) -> Result<EchoStep, Status> {
        let token_id = self.tokens.next().ok_or_else(Status::stop_iteration)?;
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let step = EchoStep {
            index: self.index,
            token_id,
        };
        self.index += 1;
        trace!(?step, "echo token");
        Ok(step)
    }
}
