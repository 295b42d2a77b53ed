use candle_core::Tensor;
use tracing::debug;
use training::{
    squeeze_all, Accuracy, BinaryF1Score, CrossEntropyLoss, LanguageCrossEntropy, MaskedAccuracy,
    MatthewsCorrCoef, MeanSquaredError, Metric, MetricCollection, MseLoss, SpearmanCorrCoef,
    DEFAULT_IGNORE_INDEX,
};

use crate::{
    config::{ModelConfig, ProblemType},
    ModelError, Result,
};

/// Which head sits on top of the encoder. Selects the loss and the
/// precondition checked against the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// No head of its own: the module must supply the loss.
    Base,
    Classification,
    /// Masked-language-model pretraining.
    Pretraining,
    Regression,
}

impl TaskKind {
    pub fn check(self, config: &ModelConfig) -> Result<()> {
        let num_labels = config.num_labels();
        match self {
            TaskKind::Base => Ok(()),
            TaskKind::Classification if num_labels < 1 => Err(ModelError::Precondition(
                "classification needs at least one label; use regression for a single output"
                    .to_string(),
            )),
            TaskKind::Pretraining if num_labels != config.vocab_size => {
                Err(ModelError::Precondition(format!(
                    "number of labels ({}) not equivalent to vocabulary size ({})",
                    num_labels, config.vocab_size
                )))
            }
            TaskKind::Regression if num_labels != 1 => Err(ModelError::Precondition(format!(
                "model must have one label for regression (got {})",
                num_labels
            ))),
            _ => Ok(()),
        }
    }

    pub fn loss_fn(self, config: &ModelConfig) -> Result<LossFn> {
        match self {
            TaskKind::Base => Err(ModelError::NotImplemented(
                "calculating loss directly not supported yet",
            )),
            TaskKind::Classification => {
                if config.problem_type == Some(ProblemType::MultiLabelClassification) {
                    return Err(ModelError::NotImplemented(
                        "multi-label classification loss not supported yet",
                    ));
                }
                Ok(LossFn::CrossEntropy(token_cross_entropy()))
            }
            TaskKind::Pretraining => Ok(LossFn::CrossEntropy(token_cross_entropy())),
            TaskKind::Regression => Ok(LossFn::MeanSquaredError(MseLoss::new())),
        }
    }

    /// Shapes `logits` and `labels` for this head and evaluates its loss.
    pub fn compute_loss(
        self,
        config: &ModelConfig,
        logits: &Tensor,
        labels: &Tensor,
    ) -> Result<Tensor> {
        let loss_fn = self.loss_fn(config)?;
        let (logits, labels) = match self {
            TaskKind::Classification => {
                let num_labels = config.num_labels();
                if num_labels == 0 || logits.elem_count() % num_labels != 0 {
                    return Err(ModelError::Loss(training::TrainingError::runtime(format!(
                        "logits {:?} cannot be viewed as (-1, {})",
                        logits.dims(),
                        num_labels
                    ))));
                }
                let rows = logits.elem_count() / num_labels;
                (logits.reshape((rows, num_labels))?, labels.flatten_all()?)
            }
            TaskKind::Regression => (squeeze_all(logits)?, squeeze_all(labels)?),
            TaskKind::Pretraining | TaskKind::Base => (logits.clone(), labels.clone()),
        };
        debug!(task = ?self, logits = ?logits.dims(), labels = ?labels.dims(), "computing loss");
        loss_fn.apply(&logits, &labels)
    }

    /// Every metric an evaluator may ask a BERT model for.
    pub fn validation_metrics(config: &ModelConfig) -> Result<MetricCollection> {
        let metrics: Vec<Box<dyn Metric>> = vec![
            Box::new(Accuracy::new()),
            Box::new(MeanSquaredError::new()),
            Box::new(SpearmanCorrCoef::new()),
            Box::new(BinaryF1Score::new()),
            Box::new(MatthewsCorrCoef::new(config.num_labels().max(1))?),
            Box::new(LanguageCrossEntropy::new(
                config.num_labels(),
                DEFAULT_IGNORE_INDEX,
            )),
            Box::new(MaskedAccuracy::new(DEFAULT_IGNORE_INDEX)),
        ];
        Ok(MetricCollection::new(metrics))
    }
}

#[derive(Debug, Clone)]
pub enum LossFn {
    CrossEntropy(CrossEntropyLoss),
    MeanSquaredError(MseLoss),
}

impl LossFn {
    pub fn apply(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        match self {
            LossFn::CrossEntropy(loss) => Ok(loss.compute(predictions, targets)?.loss),
            LossFn::MeanSquaredError(loss) => Ok(loss.compute(predictions, targets)?),
        }
    }
}

fn token_cross_entropy() -> CrossEntropyLoss {
    CrossEntropyLoss::new().with_ignore_index(Some(DEFAULT_IGNORE_INDEX))
}
