use candle_core::{DType, Tensor, D};
use candle_nn::ops;

use crate::TrainingError;

/// Label value skipped by token-level losses, matching the Hugging Face convention.
pub const DEFAULT_IGNORE_INDEX: i64 = -100;

/// Cross entropy loss with optional label smoothing and ignore-index handling.
#[derive(Debug, Clone)]
pub struct CrossEntropyLoss {
    label_smoothing: f32,
    ignore_index: Option<i64>,
}

impl CrossEntropyLoss {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label_smoothing(mut self, smoothing: f32) -> Result<Self, TrainingError> {
        if !(0.0..1.0).contains(&smoothing) {
            return Err(TrainingError::initialization(
                "label smoothing must be in [0, 1) for cross entropy",
            ));
        }
        self.label_smoothing = smoothing;
        Ok(self)
    }

    pub fn with_ignore_index(mut self, ignore_index: Option<i64>) -> Self {
        self.ignore_index = ignore_index;
        self
    }

    pub fn ignore_index(&self) -> Option<i64> {
        self.ignore_index
    }

    /// Mean negative log-likelihood of `targets` under `logits`.
    ///
    /// `logits` is `(..., classes)` and `targets` must match every leading
    /// dimension. Targets equal to the ignore index contribute neither to the
    /// loss nor to the token count.
    pub fn compute(&self, logits: &Tensor, targets: &Tensor) -> Result<LossOutput, TrainingError> {
        let dims = logits.dims();
        if dims.len() < 2 {
            return Err(TrainingError::runtime(
                "cross entropy expects logits with at least two dimensions",
            ));
        }

        let num_classes = *dims
            .last()
            .ok_or_else(|| TrainingError::runtime("logits tensor missing class dimension"))?;
        if num_classes == 0 {
            return Err(TrainingError::runtime(
                "logits class dimension must be greater than zero",
            ));
        }

        let token_dims = &dims[..dims.len() - 1];
        if targets.dims() != token_dims {
            return Err(TrainingError::runtime(format!(
                "target shape {:?} must match logits leading dimensions {:?}",
                targets.dims(),
                token_dims
            )));
        }

        let token_count: usize = token_dims.iter().copied().product();
        if token_count == 0 {
            return Err(TrainingError::runtime(
                "no tokens available for loss computation",
            ));
        }

        let device = logits.device();
        let logits_flat = logits
            .reshape((token_count, num_classes))
            .map_err(to_runtime_error)?
            .to_dtype(DType::F32)
            .map_err(to_runtime_error)?;

        let log_probs = ops::log_softmax(&logits_flat, D::Minus1).map_err(to_runtime_error)?;

        let targets_on_device = targets.to_device(device).map_err(to_runtime_error)?;
        let targets_flat = targets_on_device
            .reshape((token_count,))
            .map_err(to_runtime_error)?;
        let targets_flat = match targets_flat.dtype() {
            DType::I64 => targets_flat,
            DType::U32 | DType::U8 => targets_flat
                .to_dtype(DType::I64)
                .map_err(to_runtime_error)?,
            dtype => {
                return Err(TrainingError::runtime(format!(
                    "unsupported target dtype {:?} for cross entropy",
                    dtype
                )))
            }
        };

        let (valid_mask, safe_targets) = if let Some(ignore_index) = self.ignore_index {
            let keep = targets_flat.ne(ignore_index).map_err(to_runtime_error)?;
            let zeros = targets_flat.zeros_like().map_err(to_runtime_error)?;
            let safe = keep
                .where_cond(&targets_flat, &zeros)
                .map_err(to_runtime_error)?;
            let mask = keep.to_dtype(DType::F32).map_err(to_runtime_error)?;
            (mask, safe)
        } else {
            let mask =
                Tensor::ones((token_count,), DType::F32, device).map_err(to_runtime_error)?;
            (mask, targets_flat)
        };

        let out_of_range = safe_targets
            .ge(num_classes as i64)
            .map_err(to_runtime_error)?
            .to_dtype(DType::F32)
            .map_err(to_runtime_error)?
            .sum_all()
            .map_err(to_runtime_error)?
            .to_vec0::<f32>()
            .map_err(to_runtime_error)?;
        let negative = safe_targets
            .lt(0i64)
            .map_err(to_runtime_error)?
            .to_dtype(DType::F32)
            .map_err(to_runtime_error)?
            .sum_all()
            .map_err(to_runtime_error)?
            .to_vec0::<f32>()
            .map_err(to_runtime_error)?;
        if out_of_range > 0.0 || negative > 0.0 {
            return Err(TrainingError::runtime(format!(
                "targets must lie in [0, {}) or equal the ignore index",
                num_classes
            )));
        }

        let safe_targets = safe_targets
            .to_dtype(DType::U32)
            .map_err(to_runtime_error)?;

        let total_tokens_scalar = valid_mask
            .sum_all()
            .map_err(to_runtime_error)?
            .to_vec0::<f32>()
            .map_err(to_runtime_error)?;
        let total_tokens = total_tokens_scalar.round() as usize;
        if total_tokens == 0 {
            return Err(TrainingError::runtime(
                "no valid tokens remain after applying ignore_index",
            ));
        }

        let target_indices = safe_targets.unsqueeze(1).map_err(to_runtime_error)?;
        let nll = log_probs
            .gather(&target_indices, 1)
            .map_err(to_runtime_error)?
            .neg()
            .map_err(to_runtime_error)?
            .squeeze(1)
            .map_err(to_runtime_error)?;

        let per_token_loss = if self.label_smoothing > 0.0 {
            let smoothing = self.label_smoothing;
            let uniform = log_probs
                .mean(1)
                .map_err(to_runtime_error)?
                .neg()
                .map_err(to_runtime_error)?;
            let smoothed = nll
                .affine((1.0 - smoothing) as f64, 0.0)
                .map_err(to_runtime_error)?;
            let uniform_term = uniform
                .affine(smoothing as f64, 0.0)
                .map_err(to_runtime_error)?;
            (smoothed + uniform_term).map_err(to_runtime_error)?
        } else {
            nll
        };

        let weighted_loss = (&per_token_loss * &valid_mask).map_err(to_runtime_error)?;
        let loss_sum = weighted_loss.sum_all().map_err(to_runtime_error)?;
        let average_loss = loss_sum
            .affine(1f64 / total_tokens as f64, 0.0)
            .map_err(to_runtime_error)?;

        let average_loss_value = average_loss.to_vec0::<f32>().map_err(to_runtime_error)?;

        let predictions = logits_flat.argmax(D::Minus1).map_err(to_runtime_error)?;
        let correct = predictions
            .eq(&safe_targets)
            .map_err(to_runtime_error)?
            .to_dtype(DType::F32)
            .map_err(to_runtime_error)?;
        let correct = (&correct * &valid_mask).map_err(to_runtime_error)?;
        let correct_tokens = correct
            .sum_all()
            .map_err(to_runtime_error)?
            .to_vec0::<f32>()
            .map_err(to_runtime_error)?
            .round() as usize;

        Ok(LossOutput {
            loss: average_loss,
            metrics: LossMetrics {
                average_loss: average_loss_value,
                total_tokens,
                correct_tokens,
            },
        })
    }
}

impl Default for CrossEntropyLoss {
    fn default() -> Self {
        Self {
            label_smoothing: 0.0,
            ignore_index: None,
        }
    }
}

/// Mean squared error between two tensors of identical shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct MseLoss;

impl MseLoss {
    pub fn new() -> Self {
        Self
    }

    pub fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor, TrainingError> {
        if predictions.dims() != targets.dims() {
            return Err(TrainingError::runtime(format!(
                "mse expects matching shapes, got predictions {:?} and targets {:?}",
                predictions.dims(),
                targets.dims()
            )));
        }
        if predictions.elem_count() == 0 {
            return Err(TrainingError::runtime(
                "no elements available for loss computation",
            ));
        }

        let predictions = predictions.to_dtype(DType::F32).map_err(to_runtime_error)?;
        let targets = targets
            .to_device(predictions.device())
            .map_err(to_runtime_error)?
            .to_dtype(DType::F32)
            .map_err(to_runtime_error)?;
        let diff = (&predictions - &targets).map_err(to_runtime_error)?;
        diff.sqr()
            .map_err(to_runtime_error)?
            .mean_all()
            .map_err(to_runtime_error)
    }
}

/// Removes every dimension of size one, like an argument-less `squeeze`.
pub fn squeeze_all(tensor: &Tensor) -> Result<Tensor, TrainingError> {
    let kept: Vec<usize> = tensor.dims().iter().copied().filter(|&d| d != 1).collect();
    if kept.len() == tensor.rank() {
        return Ok(tensor.clone());
    }
    tensor.reshape(kept).map_err(to_runtime_error)
}

#[derive(Debug, Clone)]
pub struct LossOutput {
    pub loss: Tensor,
    pub metrics: LossMetrics,
}

#[derive(Debug, Clone)]
pub struct LossMetrics {
    average_loss: f32,
    total_tokens: usize,
    correct_tokens: usize,
}

impl LossMetrics {
    pub fn average_loss(&self) -> f32 {
        self.average_loss
    }

    pub fn total_tokens(&self) -> usize {
        self.total_tokens
    }

    pub fn correct_tokens(&self) -> usize {
        self.correct_tokens
    }

    pub fn accuracy(&self) -> f32 {
        if self.total_tokens == 0 {
            0.0
        } else {
            self.correct_tokens as f32 / self.total_tokens as f32
        }
    }

    pub fn perplexity(&self) -> f32 {
        self.average_loss.exp()
    }
}

fn to_runtime_error(err: candle_core::Error) -> TrainingError {
    TrainingError::runtime(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn cross_entropy_matches_manual_log_softmax() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[2.0f32, 0.0], [0.0, 2.0]], &device).unwrap();
        let targets = Tensor::new(&[0i64, 0], &device).unwrap();

        let out = CrossEntropyLoss::new().compute(&logits, &targets).unwrap();
        let lse = (2.0f32.exp() + 1.0).ln();
        let expected = ((lse - 2.0) + lse) / 2.0;
        assert!(approx(out.metrics.average_loss(), expected));
        assert_eq!(out.metrics.total_tokens(), 2);
        assert_eq!(out.metrics.correct_tokens(), 1);
    }

    #[test]
    fn ignore_index_drops_masked_tokens() {
        let device = Device::Cpu;
        let logits = Tensor::new(&[[[1.0f32, 0.0, 0.0], [0.0, 5.0, 0.0]]], &device).unwrap();
        let targets = Tensor::new(&[[DEFAULT_IGNORE_INDEX, 1i64]], &device).unwrap();

        let out = CrossEntropyLoss::new()
            .with_ignore_index(Some(DEFAULT_IGNORE_INDEX))
            .compute(&logits, &targets)
            .unwrap();
        assert_eq!(out.metrics.total_tokens(), 1);
        assert_eq!(out.metrics.correct_tokens(), 1);
        let expected = (5.0f32.exp() + 2.0).ln() - 5.0;
        assert!(approx(out.metrics.average_loss(), expected));
    }

    #[test]
    fn all_ignored_is_an_error() {
        let device = Device::Cpu;
        let logits = Tensor::zeros((2, 3), DType::F32, &device).unwrap();
        let targets = Tensor::new(&[-100i64, -100], &device).unwrap();
        let result = CrossEntropyLoss::new()
            .with_ignore_index(Some(-100))
            .compute(&logits, &targets);
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_target_is_rejected() {
        let device = Device::Cpu;
        let logits = Tensor::zeros((1, 2), DType::F32, &device).unwrap();
        let targets = Tensor::new(&[5i64], &device).unwrap();
        assert!(CrossEntropyLoss::new().compute(&logits, &targets).is_err());
    }

    #[test]
    fn label_smoothing_bounds() {
        assert!(CrossEntropyLoss::new().with_label_smoothing(1.0).is_err());
        assert!(CrossEntropyLoss::new().with_label_smoothing(0.1).is_ok());
    }

    #[test]
    fn mse_is_mean_of_squared_difference() {
        let device = Device::Cpu;
        let pred = Tensor::new(&[1.0f32, 2.0, 3.0], &device).unwrap();
        let target = Tensor::new(&[1.0f32, 0.0, 0.0], &device).unwrap();
        let loss = MseLoss::new()
            .compute(&pred, &target)
            .unwrap()
            .to_vec0::<f32>()
            .unwrap();
        assert!(approx(loss, 13.0 / 3.0));
    }

    #[test]
    fn mse_rejects_shape_mismatch() {
        let device = Device::Cpu;
        let pred = Tensor::zeros((3, 1), DType::F32, &device).unwrap();
        let target = Tensor::zeros(3, DType::F32, &device).unwrap();
        assert!(MseLoss::new().compute(&pred, &target).is_err());
    }

    #[test]
    fn squeeze_all_drops_unit_dims() {
        let device = Device::Cpu;
        let t = Tensor::zeros((4, 1), DType::F32, &device).unwrap();
        assert_eq!(squeeze_all(&t).unwrap().dims(), &[4]);
        let single = Tensor::zeros((1, 1), DType::F32, &device).unwrap();
        assert_eq!(squeeze_all(&single).unwrap().rank(), 0);
    }
}
