use std::path::Path;

use bytes::Bytes;
use tracing::{debug, info};

use crate::{
    driver::{ByteIter, ByteStream, Container, Extra, Headers, ObjectMeta, StorageDriver},
    registry::{DriverOptions, DriverRegistry},
    Result,
};

/// Payload for [`ObjectStoreProvider::upload_object_via_stream`].
pub enum StreamSource {
    Bytes(Bytes),
    Chunks(ByteIter<'static>),
}

impl StreamSource {
    fn into_chunks(self) -> ByteIter<'static> {
        match self {
            StreamSource::Bytes(data) => Box::new(std::iter::once(data)),
            StreamSource::Chunks(chunks) => chunks,
        }
    }
}

impl From<Vec<u8>> for StreamSource {
    fn from(value: Vec<u8>) -> Self {
        StreamSource::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for StreamSource {
    fn from(value: Bytes) -> Self {
        StreamSource::Bytes(value)
    }
}

impl From<&'static [u8]> for StreamSource {
    fn from(value: &'static [u8]) -> Self {
        StreamSource::Bytes(Bytes::from_static(value))
    }
}

impl From<ByteIter<'static>> for StreamSource {
    fn from(value: ByteIter<'static>) -> Self {
        StreamSource::Chunks(value)
    }
}

/// Uploads to and downloads from one container of an object (blob) store
/// such as S3 or GCS.
///
/// Every call goes straight to the underlying driver; hash verification,
/// partial-file cleanup and errors are the driver's business.
pub struct ObjectStoreProvider {
    driver: Box<dyn StorageDriver>,
    container: Container,
}

impl ObjectStoreProvider {
    /// Builds the driver for `provider` from the built-in registry.
    pub fn new(provider: &str, container: &str, options: Option<DriverOptions>) -> Result<Self> {
        Self::with_registry(&DriverRegistry::with_builtin(), provider, container, options)
    }

    pub fn with_registry(
        registry: &DriverRegistry,
        provider: &str,
        container: &str,
        options: Option<DriverOptions>,
    ) -> Result<Self> {
        let options = options.unwrap_or_default();
        let driver = registry.build(provider, &options)?;
        Self::from_driver(driver, container)
    }

    /// Wraps an already constructed driver and resolves `container` on it.
    pub fn from_driver(driver: Box<dyn StorageDriver>, container: &str) -> Result<Self> {
        let container = driver.get_container(container)?;
        info!(provider = driver.name(), container = %container.name, "object store ready");
        Ok(Self { driver, container })
    }

    /// The name of the cloud provider.
    pub fn provider_name(&self) -> &str {
        self.driver.name()
    }

    /// The name of the object storage container.
    pub fn container_name(&self) -> &str {
        &self.container.name
    }

    /// Uploads a file from disk to `object_name` in the container.
    pub fn upload_object(
        &self,
        file_path: impl AsRef<Path>,
        object_name: &str,
        verify_hash: bool,
        extra: Option<&Extra>,
        headers: Option<&Headers>,
    ) -> Result<ObjectMeta> {
        let file_path = file_path.as_ref();
        debug!(file = %file_path.display(), object = object_name, "upload_object");
        self.driver.upload_object(
            file_path,
            &self.container,
            object_name,
            extra,
            verify_hash,
            headers,
        )
    }

    /// Uploads raw bytes or a chunk iterator to `object_name`.
    pub fn upload_object_via_stream(
        &self,
        obj: impl Into<StreamSource>,
        object_name: &str,
        extra: Option<&Extra>,
        headers: Option<&Headers>,
    ) -> Result<ObjectMeta> {
        debug!(object = object_name, "upload_object_via_stream");
        self.driver.upload_object_via_stream(
            obj.into().into_chunks(),
            &self.container,
            object_name,
            extra,
            headers,
        )
    }

    /// [`Self::upload_object`] with hash verification and no extras.
    pub fn upload_file(&self, file_path: impl AsRef<Path>, object_name: &str) -> Result<ObjectMeta> {
        self.upload_object(file_path, object_name, true, None, None)
    }

    /// [`Self::download_object`] refusing to overwrite and cleaning up on failure.
    pub fn download_file(
        &self,
        object_name: &str,
        destination_path: impl AsRef<Path>,
    ) -> Result<bool> {
        self.download_object(object_name, destination_path, false, true)
    }

    fn get_object(&self, object_name: &str) -> Result<ObjectMeta> {
        self.driver.get_object(&self.container.name, object_name)
    }

    /// Downloads `object_name` to a file, or into a directory under its base name.
    pub fn download_object(
        &self,
        object_name: &str,
        destination_path: impl AsRef<Path>,
        overwrite_existing: bool,
        delete_on_failure: bool,
    ) -> Result<bool> {
        let obj = self.get_object(object_name)?;
        debug!(
            object = object_name,
            destination = %destination_path.as_ref().display(),
            "download_object"
        );
        self.driver.download_object(
            &obj,
            destination_path.as_ref(),
            overwrite_existing,
            delete_on_failure,
        )
    }

    /// Returns an iterator over the object's bytes.
    pub fn download_object_as_stream(
        &self,
        object_name: &str,
        chunk_size: Option<usize>,
    ) -> Result<ByteStream> {
        let obj = self.get_object(object_name)?;
        self.driver.download_object_as_stream(&obj, chunk_size)
    }
}

impl std::fmt::Debug for ObjectStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreProvider")
            .field("provider", &self.driver.name())
            .field("container", &self.container.name)
            .finish()
    }
}
