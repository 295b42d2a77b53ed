pub mod error;
pub mod loss;
pub mod metrics;

pub use error::TrainingError;
pub use loss::{squeeze_all, CrossEntropyLoss, LossMetrics, LossOutput, MseLoss, DEFAULT_IGNORE_INDEX};
pub use metrics::{
    Accuracy, BinaryF1Score, LanguageCrossEntropy, MaskedAccuracy, MatthewsCorrCoef,
    MeanSquaredError, Metric, MetricCollection, MetricReport, SpearmanCorrCoef,
};
