pub use blob_store;
pub use model;
pub use training;

pub use blob_store::{ObjectStoreConfig, ObjectStoreProvider};
pub use model::{Batch, ModelConfig, ModelInputs, PretrainedModule, TaskKind, TaskModel};

use anyhow::Result;
use candle_core::Device;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Picks CUDA when available unless `CANDLE_FORCE_CPU` is set.
pub fn setup_device() -> Result<Device> {
    if std::env::var("CANDLE_FORCE_CPU").is_ok() {
        info!("CANDLE_FORCE_CPU set, using CPU backend");
        return Ok(Device::Cpu);
    }

    match Device::cuda_if_available(0) {
        Ok(device) if device.is_cuda() => {
            info!(?device, "CUDA device selected");
            Ok(device)
        }
        Ok(_) | Err(_) => {
            info!("using CPU backend");
            Ok(Device::Cpu)
        }
    }
}

/// Installs a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`.
///
/// Returns an error when a global subscriber is already set.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install tracing subscriber: {err}"))
}
