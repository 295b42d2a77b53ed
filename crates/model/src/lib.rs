//! BERT task heads for a candle training loop.
//!
//! The encoder itself stays external behind [`PretrainedModule`]; this crate
//! only decides which loss and which metrics apply to it.

pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod module;
pub mod task;

pub use batch::{Batch, ModelInputs, ModelOutput, LABELS_KEY};
pub use config::{ModelConfig, ProblemType};
pub use error::{ModelError, Result};
pub use model::TaskModel;
pub use module::PretrainedModule;
pub use task::{LossFn, TaskKind};
