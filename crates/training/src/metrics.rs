//! Streaming evaluation metrics and the collection handed to a training loop.
//!
//! Every metric accumulates host-side state across `update` calls and
//! produces a single scalar from `compute`. A metric that has seen no samples
//! computes to `0.0`.

use std::collections::BTreeMap;
use std::fmt;

use candle_core::{DType, Tensor, D};
use serde::Serialize;
use tracing::debug;

use crate::loss::CrossEntropyLoss;
use crate::TrainingError;

pub trait Metric: Send {
    /// Stable key used by evaluators to look the metric up.
    fn name(&self) -> &'static str;

    /// Fails exactly when `update` would reject the batch, without touching state.
    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError>;

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError>;

    fn compute(&self) -> f64;

    fn reset(&mut self);
}

/// Fraction of predictions equal to the target.
///
/// Predictions with a trailing class dimension are reduced by argmax;
/// one-dimensional float predictions are thresholded at 0.5.
#[derive(Debug, Default, Clone)]
pub struct Accuracy {
    correct: u64,
    total: u64,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for Accuracy {
    fn name(&self) -> &'static str {
        "Accuracy"
    }

    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        ensure_same_len(class_prediction_count(preds), target.elem_count())
    }

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        let predicted = class_predictions(preds)?;
        let target = flatten_i64(target)?;
        ensure_same_len(predicted.len(), target.len())?;
        self.correct += predicted
            .iter()
            .zip(&target)
            .filter(|(p, t)| p == t)
            .count() as u64;
        self.total += target.len() as u64;
        Ok(())
    }

    fn compute(&self) -> f64 {
        ratio(self.correct as f64, self.total as f64)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Default, Clone)]
pub struct MeanSquaredError {
    sum_squared_error: f64,
    total: u64,
}

impl MeanSquaredError {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for MeanSquaredError {
    fn name(&self) -> &'static str {
        "MeanSquaredError"
    }

    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        ensure_same_len(preds.elem_count(), target.elem_count())
    }

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        let preds = flatten_f32(preds)?;
        let target = flatten_f32(target)?;
        ensure_same_len(preds.len(), target.len())?;
        self.sum_squared_error += preds
            .iter()
            .zip(&target)
            .map(|(p, t)| {
                let d = (*p - *t) as f64;
                d * d
            })
            .sum::<f64>();
        self.total += preds.len() as u64;
        Ok(())
    }

    fn compute(&self) -> f64 {
        ratio(self.sum_squared_error, self.total as f64)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Spearman rank correlation over every sample seen so far.
#[derive(Debug, Default, Clone)]
pub struct SpearmanCorrCoef {
    preds: Vec<f64>,
    target: Vec<f64>,
}

impl SpearmanCorrCoef {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for SpearmanCorrCoef {
    fn name(&self) -> &'static str {
        "SpearmanCorrCoef"
    }

    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        ensure_same_len(preds.elem_count(), target.elem_count())
    }

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        let preds = flatten_f32(preds)?;
        let target = flatten_f32(target)?;
        ensure_same_len(preds.len(), target.len())?;
        self.preds.extend(preds.iter().map(|&v| v as f64));
        self.target.extend(target.iter().map(|&v| v as f64));
        Ok(())
    }

    fn compute(&self) -> f64 {
        if self.preds.len() < 2 {
            return 0.0;
        }
        pearson(&ranks(&self.preds), &ranks(&self.target))
    }

    fn reset(&mut self) {
        self.preds.clear();
        self.target.clear();
    }
}

/// F1 score of the positive class for binary classification.
#[derive(Debug, Default, Clone)]
pub struct BinaryF1Score {
    true_positive: u64,
    false_positive: u64,
    false_negative: u64,
}

impl BinaryF1Score {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for BinaryF1Score {
    fn name(&self) -> &'static str {
        "BinaryF1Score"
    }

    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        ensure_same_len(class_prediction_count(preds), target.elem_count())
    }

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        let predicted = class_predictions(preds)?;
        let target = flatten_i64(target)?;
        ensure_same_len(predicted.len(), target.len())?;
        for (p, t) in predicted.iter().zip(&target) {
            match (*p == 1, *t == 1) {
                (true, true) => self.true_positive += 1,
                (true, false) => self.false_positive += 1,
                (false, true) => self.false_negative += 1,
                (false, false) => {}
            }
        }
        Ok(())
    }

    fn compute(&self) -> f64 {
        let tp = self.true_positive as f64;
        ratio(
            2.0 * tp,
            2.0 * tp + self.false_positive as f64 + self.false_negative as f64,
        )
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Multiclass Matthews correlation coefficient.
///
/// Only the per-class row and column totals of the confusion matrix and its
/// trace enter the formula, so those are all that is kept. Memory grows with
/// the number of distinct classes seen, not with `num_classes` squared.
#[derive(Debug, Clone)]
pub struct MatthewsCorrCoef {
    num_classes: usize,
    target_totals: BTreeMap<usize, u64>,
    predicted_totals: BTreeMap<usize, u64>,
    correct: u64,
    samples: u64,
}

impl MatthewsCorrCoef {
    pub fn new(num_classes: usize) -> Result<Self, TrainingError> {
        if num_classes == 0 {
            return Err(TrainingError::validation(vec![
                "MatthewsCorrCoef requires num_classes > 0".to_string(),
            ]));
        }
        Ok(Self {
            num_classes,
            target_totals: BTreeMap::new(),
            predicted_totals: BTreeMap::new(),
            correct: 0,
            samples: 0,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn class_pairs(
        &self,
        preds: &Tensor,
        target: &Tensor,
    ) -> Result<Vec<(usize, usize)>, TrainingError> {
        let predicted = class_predictions(preds)?;
        let target = flatten_i64(target)?;
        ensure_same_len(predicted.len(), target.len())?;
        let n = self.num_classes as i64;
        predicted
            .iter()
            .zip(&target)
            .map(|(&p, &t)| {
                if (0..n).contains(&p) && (0..n).contains(&t) {
                    Ok((p as usize, t as usize))
                } else {
                    Err(TrainingError::runtime(format!(
                        "class index out of range for {} classes (pred={}, target={})",
                        n, p, t
                    )))
                }
            })
            .collect()
    }
}

impl Metric for MatthewsCorrCoef {
    fn name(&self) -> &'static str {
        "MatthewsCorrCoef"
    }

    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        self.class_pairs(preds, target).map(|_| ())
    }

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        for (p, t) in self.class_pairs(preds, target)? {
            *self.predicted_totals.entry(p).or_default() += 1;
            *self.target_totals.entry(t).or_default() += 1;
            if p == t {
                self.correct += 1;
            }
            self.samples += 1;
        }
        Ok(())
    }

    fn compute(&self) -> f64 {
        let samples = self.samples as f64;
        let correct = self.correct as f64;
        let cov_pt: f64 = self
            .predicted_totals
            .iter()
            .filter_map(|(class, &p)| self.target_totals.get(class).map(|&t| p as f64 * t as f64))
            .sum();
        let cov_pp: f64 = self.predicted_totals.values().map(|&p| (p as f64).powi(2)).sum();
        let cov_tt: f64 = self.target_totals.values().map(|&t| (t as f64).powi(2)).sum();

        let numerator = correct * samples - cov_pt;
        let denominator = ((samples * samples - cov_pp) * (samples * samples - cov_tt)).sqrt();
        ratio(numerator, denominator)
    }

    fn reset(&mut self) {
        self.target_totals.clear();
        self.predicted_totals.clear();
        self.correct = 0;
        self.samples = 0;
    }
}

/// Token-averaged cross entropy for language modelling heads.
#[derive(Debug, Clone)]
pub struct LanguageCrossEntropy {
    vocab_size: usize,
    ignore_index: i64,
    loss_sum: f64,
    total_tokens: u64,
}

impl LanguageCrossEntropy {
    pub fn new(vocab_size: usize, ignore_index: i64) -> Self {
        Self {
            vocab_size,
            ignore_index,
            loss_sum: 0.0,
            total_tokens: 0,
        }
    }

    /// Counts scored targets after checking the logits shape and target range.
    fn valid_tokens(&self, preds: &Tensor, target: &Tensor) -> Result<usize, TrainingError> {
        let classes = preds.dims().last().copied().unwrap_or(0);
        if classes == 0 || classes != self.vocab_size {
            return Err(TrainingError::runtime(format!(
                "expected logits over {} classes, got {:?}",
                self.vocab_size,
                preds.dims()
            )));
        }
        ensure_same_len(preds.elem_count() / classes, target.elem_count())?;
        let mut valid = 0;
        for t in flatten_i64(target)? {
            if t == self.ignore_index {
                continue;
            }
            if t < 0 || t as usize >= classes {
                return Err(TrainingError::runtime(format!(
                    "target {} out of range for {} classes",
                    t, classes
                )));
            }
            valid += 1;
        }
        Ok(valid)
    }
}

impl Metric for LanguageCrossEntropy {
    fn name(&self) -> &'static str {
        "LanguageCrossEntropy"
    }

    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        self.valid_tokens(preds, target).map(|_| ())
    }

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        if self.valid_tokens(preds, target)? == 0 {
            return Ok(());
        }

        let classes = self.vocab_size;
        let tokens = preds.elem_count() / classes;
        let logits = preds.reshape((tokens, classes))?;
        let target = target.flatten_all()?;
        let output = CrossEntropyLoss::new()
            .with_ignore_index(Some(self.ignore_index))
            .compute(&logits, &target)?;
        let counted = output.metrics.total_tokens() as u64;
        self.loss_sum += output.metrics.average_loss() as f64 * counted as f64;
        self.total_tokens += counted;
        Ok(())
    }

    fn compute(&self) -> f64 {
        ratio(self.loss_sum, self.total_tokens as f64)
    }

    fn reset(&mut self) {
        self.loss_sum = 0.0;
        self.total_tokens = 0;
    }
}

/// Argmax accuracy over positions whose target is not the ignore index.
#[derive(Debug, Clone)]
pub struct MaskedAccuracy {
    ignore_index: i64,
    correct: u64,
    total: u64,
}

impl MaskedAccuracy {
    pub fn new(ignore_index: i64) -> Self {
        Self {
            ignore_index,
            correct: 0,
            total: 0,
        }
    }
}

impl Metric for MaskedAccuracy {
    fn name(&self) -> &'static str {
        "MaskedAccuracy"
    }

    fn check(&self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        let classes = preds.dims().last().copied().unwrap_or(0);
        if classes == 0 {
            return Err(TrainingError::runtime(
                "MaskedAccuracy needs predictions with a class dimension",
            ));
        }
        ensure_same_len(preds.elem_count() / classes, target.elem_count())
    }

    fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        self.check(preds, target)?;
        let predicted = preds
            .argmax(D::Minus1)?
            .flatten_all()?
            .to_dtype(DType::I64)?
            .to_vec1::<i64>()?;
        let target = flatten_i64(target)?;
        ensure_same_len(predicted.len(), target.len())?;
        for (p, t) in predicted.iter().zip(&target) {
            if *t == self.ignore_index {
                continue;
            }
            self.total += 1;
            if p == t {
                self.correct += 1;
            }
        }
        Ok(())
    }

    fn compute(&self) -> f64 {
        ratio(self.correct as f64, self.total as f64)
    }

    fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Named set of metrics updated together.
#[derive(Default)]
pub struct MetricCollection {
    metrics: BTreeMap<&'static str, Box<dyn Metric>>,
}

impl MetricCollection {
    pub fn new(metrics: Vec<Box<dyn Metric>>) -> Self {
        let metrics = metrics.into_iter().map(|m| (m.name(), m)).collect();
        Self { metrics }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: Box<dyn Metric>) {
        self.metrics.insert(metric.name(), metric);
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.metrics.keys().copied()
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Metric + 'static)> {
        self.metrics.get_mut(name).map(|m| m.as_mut())
    }

    /// Updates every metric. If any metric rejects the batch, none is updated.
    pub fn update(&mut self, preds: &Tensor, target: &Tensor) -> Result<(), TrainingError> {
        for (name, metric) in self.metrics.iter() {
            metric.check(preds, target).map_err(|err| {
                debug!(metric = *name, %err, "metric rejected batch");
                err
            })?;
        }
        for metric in self.metrics.values_mut() {
            metric.update(preds, target)?;
        }
        Ok(())
    }

    pub fn compute(&self) -> MetricReport {
        MetricReport {
            values: self
                .metrics
                .iter()
                .map(|(name, metric)| (name.to_string(), metric.compute()))
                .collect(),
        }
    }

    pub fn reset(&mut self) {
        for metric in self.metrics.values_mut() {
            metric.reset();
        }
    }
}

impl fmt::Debug for MetricCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.metrics.keys()).finish()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricReport {
    pub values: BTreeMap<String, f64>,
}

impl MetricReport {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

fn class_predictions(preds: &Tensor) -> Result<Vec<i64>, TrainingError> {
    let classes = if preds.rank() >= 2 {
        preds.dims().last().copied().unwrap_or(1)
    } else {
        1
    };
    let predicted = if classes > 1 {
        preds.argmax(D::Minus1)?.to_dtype(DType::I64)?
    } else if preds.dtype().is_float() {
        preds.ge(0.5f64)?.to_dtype(DType::I64)?
    } else {
        preds.to_dtype(DType::I64)?
    };
    Ok(predicted.flatten_all()?.to_vec1::<i64>()?)
}

/// Number of labels `class_predictions` yields for `preds`.
fn class_prediction_count(preds: &Tensor) -> usize {
    match preds.dims() {
        [.., classes] if preds.rank() >= 2 && *classes > 1 => preds.elem_count() / classes,
        _ => preds.elem_count(),
    }
}

fn flatten_f32(tensor: &Tensor) -> Result<Vec<f32>, TrainingError> {
    Ok(tensor.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
}

fn flatten_i64(tensor: &Tensor) -> Result<Vec<i64>, TrainingError> {
    Ok(tensor.flatten_all()?.to_dtype(DType::I64)?.to_vec1::<i64>()?)
}

fn ensure_same_len(preds: usize, target: usize) -> Result<(), TrainingError> {
    if preds != target {
        return Err(TrainingError::runtime(format!(
            "predictions ({}) and targets ({}) differ in length",
            preds, target
        )));
    }
    Ok(())
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

// Average rank for ties, 1-based.
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let average = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = average;
        }
        i = j + 1;
    }
    ranks
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    ratio(cov, (var_x * var_y).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn accuracy_uses_argmax_for_class_logits() {
        let device = Device::Cpu;
        let preds = Tensor::new(&[[0.1f32, 0.9], [0.8, 0.2], [0.3, 0.7]], &device).unwrap();
        let target = Tensor::new(&[1i64, 1, 1], &device).unwrap();
        let mut acc = Accuracy::new();
        acc.update(&preds, &target).unwrap();
        assert!(approx(acc.compute(), 2.0 / 3.0));
        acc.reset();
        assert_eq!(acc.compute(), 0.0);
    }

    #[test]
    fn accuracy_thresholds_single_output() {
        let device = Device::Cpu;
        let preds = Tensor::new(&[0.2f32, 0.6], &device).unwrap();
        let target = Tensor::new(&[0i64, 1], &device).unwrap();
        let mut acc = Accuracy::new();
        acc.update(&preds, &target).unwrap();
        assert!(approx(acc.compute(), 1.0));
    }

    #[test]
    fn spearman_is_one_for_monotonic_pairs() {
        let device = Device::Cpu;
        let preds = Tensor::new(&[1.0f32, 2.0, 3.0, 10.0], &device).unwrap();
        let target = Tensor::new(&[0.1f32, 0.2, 0.5, 0.9], &device).unwrap();
        let mut rho = SpearmanCorrCoef::new();
        rho.update(&preds, &target).unwrap();
        assert!(approx(rho.compute(), 1.0));
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(ranks(&[3.0, 1.0, 3.0]), vec![2.5, 1.0, 2.5]);
    }

    #[test]
    fn f1_counts_positive_class() {
        let device = Device::Cpu;
        let preds = Tensor::new(&[1i64, 1, 0, 0], &device).unwrap();
        let target = Tensor::new(&[1i64, 0, 1, 0], &device).unwrap();
        let mut f1 = BinaryF1Score::new();
        f1.update(&preds, &target).unwrap();
        assert!(approx(f1.compute(), 0.5));
    }

    #[test]
    fn matthews_perfect_and_inverse() {
        let device = Device::Cpu;
        let target = Tensor::new(&[0i64, 1, 0, 1], &device).unwrap();
        let mut mcc = MatthewsCorrCoef::new(2).unwrap();
        mcc.update(&target, &target).unwrap();
        assert!(approx(mcc.compute(), 1.0));

        mcc.reset();
        let flipped = Tensor::new(&[1i64, 0, 1, 0], &device).unwrap();
        mcc.update(&flipped, &target).unwrap();
        assert!(approx(mcc.compute(), -1.0));
        assert!(MatthewsCorrCoef::new(0).is_err());
    }

    #[test]
    fn matthews_multiclass_from_class_totals() {
        let device = Device::Cpu;
        let preds = Tensor::new(&[0i64, 1, 2, 2], &device).unwrap();
        let target = Tensor::new(&[0i64, 1, 1, 2], &device).unwrap();
        let mut mcc = MatthewsCorrCoef::new(3).unwrap();
        mcc.update(&preds, &target).unwrap();
        assert!(approx(mcc.compute(), 0.7));
    }

    #[test]
    fn matthews_scales_to_vocabulary_sized_class_counts() {
        let device = Device::Cpu;
        let mut mcc = MatthewsCorrCoef::new(30522).unwrap();
        assert_eq!(mcc.compute(), 0.0);

        let preds = Tensor::new(&[30521i64, 7, 1200], &device).unwrap();
        let target = Tensor::new(&[30521i64, 7, 1200], &device).unwrap();
        mcc.update(&preds, &target).unwrap();
        assert!(approx(mcc.compute(), 1.0));

        let out_of_range = Tensor::new(&[30522i64, 0, 0], &device).unwrap();
        assert!(mcc.update(&out_of_range, &target).is_err());
        assert!(approx(mcc.compute(), 1.0), "rejected batch leaves totals untouched");
    }

    #[test]
    fn masked_accuracy_skips_ignored_positions() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[[0.0f32, 1.0], [1.0, 0.0], [1.0, 0.0]]], &device).unwrap();
        let target = Tensor::new(&[[1i64, -100, 1]], &device).unwrap();
        let mut acc = MaskedAccuracy::new(-100);
        acc.update(&logits, &target).unwrap();
        assert!(approx(acc.compute(), 0.5));
    }

    #[test]
    fn language_cross_entropy_skips_fully_masked_batches() {
        let device = Device::Cpu;
        let logits = Tensor::zeros((1, 2, 4), DType::F32, &device).unwrap();
        let masked = Tensor::new(&[[-100i64, -100]], &device).unwrap();
        let mut lce = LanguageCrossEntropy::new(4, -100);
        lce.update(&logits, &masked).unwrap();
        assert_eq!(lce.compute(), 0.0);

        let target = Tensor::new(&[[0i64, 3]], &device).unwrap();
        lce.update(&logits, &target).unwrap();
        assert!(approx(lce.compute(), (4.0f64).ln()));
    }

    #[test]
    fn collection_reports_every_metric() {
        let device = Device::Cpu;
        let mut collection = MetricCollection::new(vec![
            Box::new(Accuracy::new()),
            Box::new(MeanSquaredError::new()),
        ]);
        assert!(collection.contains("Accuracy"));
        assert_eq!(collection.len(), 2);

        let preds = Tensor::new(&[1i64, 0], &device).unwrap();
        let target = Tensor::new(&[1i64, 1], &device).unwrap();
        collection.update(&preds, &target).unwrap();
        let report = collection.compute();
        assert_eq!(report.get("Accuracy"), Some(0.5));
        assert_eq!(report.get("MeanSquaredError"), Some(0.5));
        assert!(MetricCollection::empty().is_empty());
    }

    #[test]
    fn collection_rejects_batch_without_partial_updates() {
        let device = Device::Cpu;
        let mut collection = MetricCollection::new(vec![
            Box::new(Accuracy::new()),
            Box::new(BinaryF1Score::new()),
            Box::new(MeanSquaredError::new()),
            Box::new(MatthewsCorrCoef::new(2).unwrap()),
        ]);

        // class logits against one label per row: MSE sees 4 values vs 2 targets
        let logits = Tensor::new(&[[0.1f32, 0.9], [0.8, 0.2]], &device).unwrap();
        let labels = Tensor::new(&[1i64, 0], &device).unwrap();
        assert!(collection.update(&logits, &labels).is_err());
        let report = collection.compute();
        for name in ["Accuracy", "BinaryF1Score", "MatthewsCorrCoef", "MeanSquaredError"] {
            assert_eq!(report.get(name), Some(0.0), "{name} was updated");
        }

        let preds = Tensor::new(&[1i64, 0], &device).unwrap();
        collection.update(&preds, &labels).unwrap();
        assert_eq!(collection.compute().get("Accuracy"), Some(1.0));
    }
}
