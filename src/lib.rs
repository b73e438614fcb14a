//! Asynchronous serving layer over a blocking generation engine.
//!
//! An [`Engine`] accepts a [`GenerationRequest`] and either returns a
//! complete result or a [`BlockingIterator`] over incremental outputs.
//! [`StreamingAdapter`] turns that iterator into a [`futures::Stream`] by
//! running each blocking pull on a bounded [`WorkerPool`], and
//! [`ServingModel`] ties request translation, validation and dispatch
//! together.

pub mod config;
mod echo_engine;
mod engine;
mod error;
pub mod logging;
mod request;
mod serving_model;
mod status;
mod streaming;
#[cfg(test)]
pub mod test_helpers;
mod worker_pool;

pub use config::ServingConfig;
pub use echo_engine::{EchoEngine, EchoIterator, EchoStep};
pub use engine::{BlockingIterator, Engine};
pub use error::EngineError;
pub use request::{GenerationOptions, GenerationRequest, SamplingConfig, TokenId};
pub use serving_model::ServingModel;
pub use status::{RetCode, Status};
pub use streaming::{AdapterState, StreamingAdapter};
pub use worker_pool::{DEFAULT_WORKERS, WorkerPool};
