use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};

use candle_core::Tensor;
use serde::Deserialize;

use crate::Result;

pub const LABELS_KEY: &str = "labels";

const DEFAULT_MODEL_INPUTS: [&str; 3] = ["input_ids", "attention_mask", "token_type_ids"];

/// Named tensors fed to the forward pass.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    tensors: BTreeMap<String, Tensor>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, tensor: Tensor) -> Self {
        self.insert(name, tensor);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) -> Option<Tensor> {
        self.tensors.insert(name.into(), tensor)
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn labels(&self) -> Option<&Tensor> {
        self.get(LABELS_KEY)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Names in `inputs` that this batch does not carry.
    pub fn missing(&self, inputs: &ModelInputs) -> Vec<String> {
        inputs
            .iter()
            .filter(|name| !self.contains(name))
            .map(str::to_string)
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, Tensor)> for Batch {
    fn from_iter<I: IntoIterator<Item = (S, Tensor)>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Input names the wrapped model expects in every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInputs {
    names: BTreeSet<String>,
}

#[derive(Deserialize)]
struct TokenizerConfigFile {
    #[serde(default)]
    model_input_names: Option<Vec<String>>,
}

impl ModelInputs {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads `model_input_names` from a tokenizer's `tokenizer_config.json`.
    /// Falls back to the BERT defaults when the field is absent.
    pub fn from_tokenizer_config(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        let file: TokenizerConfigFile = serde_json::from_str(&contents)?;
        Ok(file
            .model_input_names
            .map(Self::from_names)
            .unwrap_or_default())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ModelInputs {
    fn default() -> Self {
        Self::from_names(DEFAULT_MODEL_INPUTS)
    }
}

/// Raw forward-pass output. `loss` is set when the model computed it itself.
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub logits: Tensor,
    pub loss: Option<Tensor>,
}

impl ModelOutput {
    pub fn new(logits: Tensor) -> Self {
        Self { logits, loss: None }
    }

    pub fn with_loss(logits: Tensor, loss: Tensor) -> Self {
        Self {
            logits,
            loss: Some(loss),
        }
    }
}
