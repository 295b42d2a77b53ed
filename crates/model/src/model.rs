use candle_core::Tensor;
use tracing::debug;
use training::MetricCollection;

use crate::{
    batch::{Batch, ModelInputs, ModelOutput, LABELS_KEY},
    config::ModelConfig,
    module::PretrainedModule,
    task::TaskKind,
    ModelError, Result,
};

/// A pretrained encoder adapted to the training loop: picks the loss for its
/// task, shapes validation outputs, and owns the metric collections.
pub struct TaskModel<M> {
    module: M,
    config: ModelConfig,
    kind: TaskKind,
    model_inputs: ModelInputs,
    train_metrics: MetricCollection,
    val_metrics: MetricCollection,
    training: bool,
}

impl<M: PretrainedModule> TaskModel<M> {
    /// Checks the task precondition against `config` before anything is built.
    /// Without explicit `inputs` the BERT defaults are expected.
    pub fn new(
        module: M,
        config: ModelConfig,
        kind: TaskKind,
        inputs: Option<ModelInputs>,
    ) -> Result<Self> {
        kind.check(&config)?;

        let mut model_inputs = inputs.unwrap_or_default();
        // labels are scored by the metric collections, not fed as an input
        model_inputs.remove(LABELS_KEY);

        let val_metrics = TaskKind::validation_metrics(&config)?;
        debug!(
            task = ?kind,
            num_labels = config.num_labels(),
            vocab_size = config.vocab_size,
            inputs = ?model_inputs.iter().collect::<Vec<_>>(),
            "task model ready"
        );

        Ok(Self {
            module,
            config,
            kind,
            model_inputs,
            train_metrics: MetricCollection::empty(),
            val_metrics,
            training: true,
        })
    }

    pub fn base(module: M, config: ModelConfig, inputs: Option<ModelInputs>) -> Result<Self> {
        Self::new(module, config, TaskKind::Base, inputs)
    }

    pub fn classification(
        module: M,
        config: ModelConfig,
        inputs: Option<ModelInputs>,
    ) -> Result<Self> {
        Self::new(module, config, TaskKind::Classification, inputs)
    }

    pub fn pretraining(
        module: M,
        config: ModelConfig,
        inputs: Option<ModelInputs>,
    ) -> Result<Self> {
        Self::new(module, config, TaskKind::Pretraining, inputs)
    }

    pub fn regression(module: M, config: ModelConfig, inputs: Option<ModelInputs>) -> Result<Self> {
        Self::new(module, config, TaskKind::Regression, inputs)
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn model_inputs(&self) -> &ModelInputs {
        &self.model_inputs
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn train(&mut self) {
        self.set_training(true);
    }

    pub fn eval(&mut self) {
        self.set_training(false);
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
        self.module.set_training(training);
    }

    /// Runs the wrapped module on the whole batch once every expected input is present.
    pub fn forward(&self, batch: &Batch) -> Result<ModelOutput> {
        let missing = batch.missing(&self.model_inputs);
        if !missing.is_empty() {
            return Err(ModelError::MissingInputs(missing));
        }
        Ok(self.module.forward(batch)?)
    }

    /// Returns the module's own loss when it produced one; otherwise computes
    /// the task loss from `batch`'s labels and stores it on `outputs`.
    pub fn loss(&self, outputs: &mut ModelOutput, batch: &Batch) -> Result<Tensor> {
        if let Some(loss) = outputs.loss.as_ref() {
            return Ok(loss.clone());
        }

        // base heads fail here before the batch is even inspected
        self.kind.loss_fn(&self.config)?;
        let labels = batch
            .labels()
            .ok_or_else(|| ModelError::MissingInputs(vec![LABELS_KEY.to_string()]))?;
        let loss = self.kind.compute_loss(&self.config, &outputs.logits, labels)?;
        outputs.loss = Some(loss.clone());
        Ok(loss)
    }

    /// Eval-mode forward pass returning `(logits, labels)` for the metric collections.
    ///
    /// A single-class dimension at axis 1 is squeezed away so regression
    /// outputs line up with their targets.
    pub fn validate(&self, mut batch: Batch) -> Result<(Tensor, Tensor)> {
        if self.training {
            return Err(ModelError::NotInEvalMode);
        }

        let labels = batch
            .remove(LABELS_KEY)
            .ok_or_else(|| ModelError::MissingInputs(vec![LABELS_KEY.to_string()]))?;
        let output = self.forward(&batch)?;
        let mut logits = output.logits;

        if logits.rank() >= 2 && logits.dims()[1] == 1 {
            logits = logits.squeeze(1)?;
        }

        Ok((logits, labels))
    }

    pub fn metrics(&mut self, train: bool) -> &mut MetricCollection {
        if train {
            &mut self.train_metrics
        } else {
            &mut self.val_metrics
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::cell::Cell;

    struct FixedLogits {
        logits: Tensor,
        loss: Option<Tensor>,
        training: Cell<Option<bool>>,
    }

    impl FixedLogits {
        fn new(logits: Tensor) -> Self {
            Self {
                logits,
                loss: None,
                training: Cell::new(None),
            }
        }
    }

    impl PretrainedModule for FixedLogits {
        fn forward(&self, _batch: &Batch) -> candle_core::Result<ModelOutput> {
            Ok(ModelOutput {
                logits: self.logits.clone(),
                loss: self.loss.clone(),
            })
        }

        fn set_training(&mut self, training: bool) {
            self.training.set(Some(training));
        }
    }

    fn inputs_batch(device: &Device) -> Batch {
        let ids = Tensor::zeros((2, 3), DType::U32, device).unwrap();
        Batch::new()
            .with("input_ids", ids.clone())
            .with("attention_mask", ids.clone())
            .with("token_type_ids", ids)
    }

    #[test]
    fn labels_are_never_expected_inputs() {
        let device = Device::Cpu;
        let module = FixedLogits::new(Tensor::zeros((2, 2), DType::F32, &device).unwrap());
        let inputs = ModelInputs::from_names(["input_ids", "labels"]);
        let model = TaskModel::classification(module, ModelConfig::new(8, 2), Some(inputs)).unwrap();
        assert!(!model.model_inputs().contains("labels"));
        assert!(model.model_inputs().contains("input_ids"));
    }

    #[test]
    fn eval_and_train_reach_the_module() {
        let device = Device::Cpu;
        let module = FixedLogits::new(Tensor::zeros((2, 2), DType::F32, &device).unwrap());
        let mut model = TaskModel::classification(module, ModelConfig::new(8, 2), None).unwrap();
        assert!(model.is_training());
        model.eval();
        assert!(!model.is_training());
        assert_eq!(model.module().training.get(), Some(false));
        model.train();
        assert_eq!(model.module().training.get(), Some(true));
    }

    #[test]
    fn forward_rejects_missing_inputs() {
        let device = Device::Cpu;
        let module = FixedLogits::new(Tensor::zeros((2, 2), DType::F32, &device).unwrap());
        let model = TaskModel::classification(module, ModelConfig::new(8, 2), None).unwrap();
        let batch = Batch::new().with("input_ids", Tensor::zeros(2, DType::U32, &device).unwrap());
        match model.forward(&batch) {
            Err(ModelError::MissingInputs(names)) => assert_eq!(names.len(), 2),
            other => panic!("expected missing inputs, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn validate_requires_eval_mode_and_squeezes_single_class() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[0.5f32], [1.5]], &device).unwrap();
        let module = FixedLogits::new(logits);
        let mut model = TaskModel::regression(module, ModelConfig::new(8, 1), None).unwrap();

        let labels = Tensor::new(&[0.4f32, 1.0], &device).unwrap();
        let batch = inputs_batch(&device).with("labels", labels);
        assert!(matches!(
            model.validate(batch.clone()),
            Err(ModelError::NotInEvalMode)
        ));

        model.eval();
        let (preds, targets) = model.validate(batch).unwrap();
        assert_eq!(preds.dims(), &[2]);
        assert_eq!(targets.to_vec1::<f32>().unwrap(), vec![0.4, 1.0]);
    }

    #[test]
    fn metrics_switch_between_train_and_eval_sets() {
        let device = Device::Cpu;
        let module = FixedLogits::new(Tensor::zeros((2, 2), DType::F32, &device).unwrap());
        let mut model = TaskModel::classification(module, ModelConfig::new(8, 2), None).unwrap();
        assert!(model.metrics(true).is_empty());
        assert_eq!(model.metrics(false).len(), 7);
    }

    #[test]
    fn module_supplied_loss_wins() {
        let device = Device::Cpu;
        let mut module = FixedLogits::new(Tensor::zeros((2, 2), DType::F32, &device).unwrap());
        module.loss = Some(Tensor::new(0.25f32, &device).unwrap());
        let model = TaskModel::base(module, ModelConfig::new(8, 2), None).unwrap();

        let batch = inputs_batch(&device);
        let mut outputs = model.forward(&batch).unwrap();
        let loss = model.loss(&mut outputs, &batch).unwrap();
        assert_eq!(loss.to_vec0::<f32>().unwrap(), 0.25);
    }

    #[test]
    fn base_model_cannot_compute_its_own_loss() {
        let device = Device::Cpu;
        let module = FixedLogits::new(Tensor::zeros((2, 2), DType::F32, &device).unwrap());
        let model = TaskModel::base(module, ModelConfig::new(8, 2), None).unwrap();
        let batch = inputs_batch(&device);
        let mut outputs = model.forward(&batch).unwrap();
        assert!(matches!(
            model.loss(&mut outputs, &batch),
            Err(ModelError::NotImplemented(_))
        ));
    }
}
