use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use crate::config::ServingConfig;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::request::{GenerationOptions, GenerationRequest, TokenId};
use crate::streaming::StreamingAdapter;
use crate::worker_pool::WorkerPool;

/// Serving front end over an [`Engine`].
///
/// Translates caller options into a [`GenerationRequest`], validates it and
/// runs the blocking engine calls on a [`WorkerPool`].
///
/// ```
/// use futures::TryStreamExt;
/// use serving_rs::{EchoEngine, GenerationOptions, ServingModel, WorkerPool};
/// # tokio_test::block_on(async {
/// let model = ServingModel::with_pool(EchoEngine::new(), WorkerPool::new(8).unwrap());
/// let stream = model
///     .generate_streaming("echo", vec![4, 5], &GenerationOptions::new())
///     .await
///     .unwrap();
/// let steps: Vec<_> = stream.try_collect().await.unwrap();
/// assert_eq!(steps.len(), 2);
/// # });
/// ```
pub struct ServingModel<E> {
    engine: Arc<E>,
    pool: WorkerPool,
    defaults: GenerationOptions,
}

impl<E: Engine> ServingModel<E> {
    /// Serve `engine` on the process-wide worker pool.
    pub fn new(engine: E) -> Self {
        Self::with_pool(engine, WorkerPool::global().clone())
    }

    /// Serve `engine` on `pool`.
    pub fn with_pool(engine: E, pool: WorkerPool) -> Self {
        Self {
            engine: Arc::new(engine),
            pool,
            defaults: GenerationOptions::default(),
        }
    }

    /// Serve `engine` with its own pool and defaults taken from `config`.
    pub fn from_config(engine: E, config: &ServingConfig) -> Result<Self, EngineError> {
        let pool = WorkerPool::new(config.workers)?;
        Ok(Self::with_pool(engine, pool).defaults(config.generation.clone()))
    }

    /// Options applied to every request for fields the caller leaves unset.
    pub fn defaults(mut self, defaults: GenerationOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Build and validate the request that would be submitted.
    pub fn request(
        &self,
        model_name: &str,
        inputs: Vec<TokenId>,
        options: &GenerationOptions,
    ) -> Result<GenerationRequest, EngineError> {
        let options = options.clone().or(&self.defaults);
        let request = GenerationRequest::new(model_name, inputs, &options);
        request.validate()?;
        trace!(id = %request.id(), config = ?request.sampling_config(), "request built");
        Ok(request)
    }

    /// Generate to completion.
    pub async fn generate(
        &self,
        model_name: &str,
        inputs: Vec<TokenId>,
        options: &GenerationOptions,
    ) -> Result<E::Output, EngineError> {
        let request = self.request(model_name, inputs, options)?;
        let (id, submitted_at) = (request.id(), request.submitted_at());
        debug!(%id, model = model_name, "generate");
        let engine = self.engine.clone();
        let output = self.pool.run(move || engine.generate(&request)).await??;
        let elapsed_ms = (Utc::now() - submitted_at).num_milliseconds();
        debug!(%id, elapsed_ms, "generate finished");
        Ok(output)
    }

    /// Submit a streaming generation and return its output stream.
    ///
    /// A submit failure is returned here; no stream is created for it.
    pub async fn generate_streaming(
        &self,
        model_name: &str,
        inputs: Vec<TokenId>,
        options: &GenerationOptions,
    ) -> Result<StreamingAdapter<E::Iter>, EngineError> {
        let request = self.request(model_name, inputs, options)?;
        let (id, submitted_at) = (request.id(), request.submitted_at());
        debug!(%id, model = model_name, "generate streaming");
        let engine = self.engine.clone();
        let iter = self
            .pool
            .run(move || engine.generate_streaming(&request))
            .await??;
        let elapsed_ms = (Utc::now() - submitted_at).num_milliseconds();
        debug!(%id, elapsed_ms, "stream submitted");
        Ok(StreamingAdapter::with_pool(iter, self.pool.clone()).request_id(id))
    }
}
