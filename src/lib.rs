//! Player Rating - предсказание общего рейтинга игрока

pub mod artifacts;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod preprocessing;
pub mod server;
pub mod training;
pub mod types;

pub use artifacts::ArtifactStore;
pub use config::{PipelineConfig, SecondaryScalerPolicy};
pub use error::{PipelineError, Result};
pub use models::{FittedModel, Hyperparams, ModelFamily, TrainedModel};
pub use pipeline::{PipelineOutput, RatingPipeline};
pub use predictor::Predictor;
pub use types::*;
