use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{ModelError, Result};

/// Number of labels assumed when a config names neither `num_labels` nor `id2label`.
pub const DEFAULT_NUM_LABELS: usize = 2;

/// The subset of a Hugging Face style BERT config the task heads read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub model_type: Option<String>,
    pub vocab_size: usize,
    #[serde(default)]
    pub hidden_size: Option<usize>,
    #[serde(default)]
    num_labels: Option<usize>,
    #[serde(default)]
    pub problem_type: Option<ProblemType>,
    #[serde(default)]
    pub id2label: BTreeMap<String, String>,
    #[serde(default)]
    pub label2id: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    Regression,
    SingleLabelClassification,
    MultiLabelClassification,
}

impl ModelConfig {
    pub fn new(vocab_size: usize, num_labels: usize) -> Self {
        Self {
            model_type: Some("bert".to_string()),
            vocab_size,
            hidden_size: None,
            num_labels: Some(num_labels),
            problem_type: None,
            id2label: BTreeMap::new(),
            label2id: BTreeMap::new(),
        }
    }

    pub fn with_problem_type(mut self, problem_type: ProblemType) -> Self {
        self.problem_type = Some(problem_type);
        self
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: ModelConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(ModelError::ConfigFormat(format!(
                    "unsupported configuration extension '{}'",
                    other
                )));
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Explicit `num_labels` first, then the size of `id2label`, then the default.
    pub fn num_labels(&self) -> usize {
        self.num_labels
            .or_else(|| (!self.id2label.is_empty()).then_some(self.id2label.len()))
            .unwrap_or(DEFAULT_NUM_LABELS)
    }

    pub fn set_num_labels(&mut self, num_labels: usize) {
        self.num_labels = Some(num_labels);
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.vocab_size == 0 {
            errors.push("vocab_size must be greater than 0".to_string());
        }

        if let Some(n) = self.num_labels {
            if !self.id2label.is_empty() && self.id2label.len() != n {
                errors.push(format!(
                    "num_labels ({}) disagrees with id2label ({} entries)",
                    n,
                    self.id2label.len()
                ));
            }
        }

        if !self.label2id.is_empty() && self.label2id.len() != self.num_labels() {
            errors.push(format!(
                "label2id has {} entries but the model has {} labels",
                self.label2id.len(),
                self.num_labels()
            ));
        }

        if let Some(bad) = self.id2label.keys().find(|k| k.parse::<usize>().is_err()) {
            errors.push(format!("id2label key '{}' is not an integer", bad));
        }

        if !errors.is_empty() {
            return Err(ModelError::Validation(errors));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_labels_falls_back_to_id2label_then_default() {
        let json = r#"{"vocab_size": 30522, "id2label": {"0": "neg", "1": "neu", "2": "pos"}}"#;
        let config: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.num_labels(), 3);

        let bare: ModelConfig = serde_json::from_str(r#"{"vocab_size": 10}"#).unwrap();
        assert_eq!(bare.num_labels(), DEFAULT_NUM_LABELS);
    }

    #[test]
    fn problem_type_uses_hugging_face_names() {
        let json = r#"{"vocab_size": 8, "num_labels": 4, "problem_type": "multi_label_classification"}"#;
        let config: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.problem_type, Some(ProblemType::MultiLabelClassification));
    }

    #[test]
    fn validation_collects_every_problem() {
        let mut config = ModelConfig::new(0, 3);
        config.id2label.insert("zero".into(), "a".into());
        match config.validate() {
            Err(ModelError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation errors, got {:?}", other),
        }
    }
}
