use crate::batch::{Batch, ModelOutput};

/// Forward-pass seam to an externally built pretrained encoder.
///
/// Implementations receive the whole batch, labels included, so models that
/// compute their own loss may return it in [`ModelOutput::loss`].
pub trait PretrainedModule {
    fn forward(&self, batch: &Batch) -> candle_core::Result<ModelOutput>;

    /// Mirrors the harness's train/eval switch (dropout and similar).
    fn set_training(&mut self, _training: bool) {}
}

impl<M: PretrainedModule + ?Sized> PretrainedModule for Box<M> {
    fn forward(&self, batch: &Batch) -> candle_core::Result<ModelOutput> {
        (**self).forward(batch)
    }

    fn set_training(&mut self, training: bool) {
        (**self).set_training(training)
    }
}
