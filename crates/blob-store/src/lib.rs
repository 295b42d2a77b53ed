//! Object store access for checkpoints and artifacts.
//!
//! [`ObjectStoreProvider`] binds one container of a storage backend and
//! forwards uploads and downloads to its [`StorageDriver`]. Drivers are looked
//! up by provider name in a [`DriverRegistry`]; `local` and `memory` ship
//! with the crate.

pub mod config;
pub mod driver;
pub mod error;
pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;

pub use config::ObjectStoreConfig;
pub use driver::{
    validate_object_name, ByteIter, ByteStream, Container, Extra, Headers, ObjectMeta,
    StorageDriver, DEFAULT_CHUNK_SIZE,
};
pub use error::{Result, StoreError};
pub use local::LocalDriver;
pub use memory::MemoryDriver;
pub use provider::{ObjectStoreProvider, StreamSource};
pub use registry::{DriverFactory, DriverOptions, DriverRegistry};
