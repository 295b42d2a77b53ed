use anyhow::Result;
use bert_harness::{
    blob_store::StreamSource, model::ModelOutput, setup_device, Batch, ModelConfig,
    ObjectStoreConfig, PretrainedModule, TaskModel,
};
use candle_core::{Device, Tensor};
use tempfile::tempdir;

/// Emits one-hot logits for the first token of each row.
struct FirstTokenHead {
    num_labels: usize,
}

impl PretrainedModule for FirstTokenHead {
    fn forward(&self, batch: &Batch) -> candle_core::Result<ModelOutput> {
        let ids = batch
            .get("input_ids")
            .ok_or_else(|| candle_core::Error::Msg("input_ids missing".into()))?;
        let first = ids.narrow(1, 0, 1)?.squeeze(1)?;
        let eye = Tensor::eye(self.num_labels, candle_core::DType::F32, ids.device())?;
        Ok(ModelOutput::new(eye.index_select(&first, 0)?))
    }
}

#[test]
fn device_setup_honours_force_cpu() {
    std::env::set_var("CANDLE_FORCE_CPU", "1");
    let device = setup_device().unwrap();
    assert!(matches!(device, Device::Cpu));
}

#[test]
fn validation_report_round_trips_through_object_store() -> Result<()> {
    let mut model = TaskModel::classification(
        FirstTokenHead { num_labels: 2 },
        ModelConfig::new(8, 2),
        None,
    )?;
    model.eval();

    let ids = Tensor::new(&[[0u32, 5], [1, 5], [1, 6], [0, 7]], &Device::Cpu)?;
    let batch = Batch::new()
        .with("input_ids", ids.clone())
        .with("attention_mask", ids.ones_like()?)
        .with("token_type_ids", ids.zeros_like()?)
        .with("labels", Tensor::new(&[0i64, 1, 0, 0], &Device::Cpu)?);

    let (logits, labels) = model.validate(batch)?;
    let metrics = model.metrics(false);
    metrics
        .get_mut("Accuracy")
        .expect("accuracy is a validation metric")
        .update(&logits, &labels)?;
    let report = metrics.compute();
    assert_eq!(report.get("Accuracy"), Some(0.75));

    let root = tempdir()?;
    let mut config = ObjectStoreConfig::new("local", "reports");
    config.key = Some(root.path().to_string_lossy().into_owned());
    config
        .extra_init_kwargs
        .insert("create_containers".into(), "true".into());
    let store = config.initialize_object()?;

    let json = serde_json::to_vec(&report)?;
    store.upload_object_via_stream(StreamSource::from(json), "eval/step-1.json", None, None)?;

    let out = tempdir()?;
    store.download_file("eval/step-1.json", out.path())?;
    let saved: serde_json::Value =
        serde_json::from_slice(&std::fs::read(out.path().join("step-1.json"))?)?;
    assert_eq!(saved["values"]["Accuracy"], serde_json::json!(0.75));
    Ok(())
}
