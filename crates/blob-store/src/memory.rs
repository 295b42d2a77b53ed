use std::{
    collections::BTreeMap,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use bytes::{Bytes, BytesMut};

use crate::{
    driver::{
        sha256_hex, validate_object_name, ByteIter, ByteStream, Container, Extra, Headers,
        ObjectMeta, StorageDriver, DEFAULT_CHUNK_SIZE,
    },
    local::save_stream,
    registry::DriverOptions,
    Result, StoreError,
};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    hash: String,
    extra: Extra,
}

type Containers = BTreeMap<String, BTreeMap<String, StoredObject>>;

/// Keeps every object in process memory. Containers spring into existence on
/// first access. Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryDriver {
    containers: Mutex<Containers>,
}

impl MemoryDriver {
    pub const PROVIDER: &'static str = "memory";

    /// The `containers` extra, a comma separated list, pre-creates containers.
    pub fn new(options: &DriverOptions) -> Self {
        let containers = options
            .extra
            .get("containers")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), BTreeMap::new()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            containers: Mutex::new(containers),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Containers> {
        // A poisoned map is still structurally valid.
        self.containers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store(
        &self,
        container: &Container,
        object_name: &str,
        data: Bytes,
        extra: Option<&Extra>,
    ) -> Result<ObjectMeta> {
        validate_object_name(object_name)?;
        let stored = StoredObject {
            hash: sha256_hex(&data),
            data,
            extra: extra.cloned().unwrap_or_default(),
        };
        let meta = meta_for(&container.name, object_name, &stored);
        self.lock()
            .entry(container.name.clone())
            .or_default()
            .insert(object_name.to_string(), stored);
        Ok(meta)
    }

    fn fetch(&self, obj: &ObjectMeta) -> Result<StoredObject> {
        self.lock()
            .get(&obj.container)
            .and_then(|objects| objects.get(&obj.name))
            .cloned()
            .ok_or_else(|| StoreError::ObjectDoesNotExist {
                container: obj.container.clone(),
                object: obj.name.clone(),
            })
    }
}

impl StorageDriver for MemoryDriver {
    fn name(&self) -> &str {
        Self::PROVIDER
    }

    fn get_container(&self, container_name: &str) -> Result<Container> {
        if container_name.is_empty() {
            return Err(StoreError::ContainerDoesNotExist(String::new()));
        }
        self.lock().entry(container_name.to_string()).or_default();
        Ok(Container::new(container_name))
    }

    fn upload_object(
        &self,
        file_path: &Path,
        container: &Container,
        object_name: &str,
        extra: Option<&Extra>,
        _verify_hash: bool,
        _headers: Option<&Headers>,
    ) -> Result<ObjectMeta> {
        let data = std::fs::read(file_path)?;
        self.store(container, object_name, Bytes::from(data), extra)
    }

    fn upload_object_via_stream(
        &self,
        iterator: ByteIter<'_>,
        container: &Container,
        object_name: &str,
        extra: Option<&Extra>,
        _headers: Option<&Headers>,
    ) -> Result<ObjectMeta> {
        let mut buf = BytesMut::new();
        for chunk in iterator {
            buf.extend_from_slice(&chunk);
        }
        self.store(container, object_name, buf.freeze(), extra)
    }

    fn get_object(&self, container_name: &str, object_name: &str) -> Result<ObjectMeta> {
        let containers = self.lock();
        let objects = containers
            .get(container_name)
            .ok_or_else(|| StoreError::ContainerDoesNotExist(container_name.to_string()))?;
        let stored = objects
            .get(object_name)
            .ok_or_else(|| StoreError::ObjectDoesNotExist {
                container: container_name.to_string(),
                object: object_name.to_string(),
            })?;
        Ok(meta_for(container_name, object_name, stored))
    }

    fn download_object(
        &self,
        obj: &ObjectMeta,
        destination_path: &Path,
        overwrite_existing: bool,
        delete_on_failure: bool,
    ) -> Result<bool> {
        let stored = self.fetch(obj)?;
        save_stream(
            std::iter::once(Ok(stored.data)),
            obj,
            destination_path,
            overwrite_existing,
            delete_on_failure,
        )
    }

    fn download_object_as_stream(
        &self,
        obj: &ObjectMeta,
        chunk_size: Option<usize>,
    ) -> Result<ByteStream> {
        let data = self.fetch(obj)?.data;
        let chunk_size = chunk_size.filter(|&c| c > 0).unwrap_or(DEFAULT_CHUNK_SIZE);
        let chunks: Vec<Result<Bytes>> = (0..data.len())
            .step_by(chunk_size)
            .map(|start| Ok(data.slice(start..(start + chunk_size).min(data.len()))))
            .collect();
        Ok(Box::new(chunks.into_iter()))
    }
}

fn meta_for(container: &str, object_name: &str, stored: &StoredObject) -> ObjectMeta {
    ObjectMeta {
        name: object_name.to_string(),
        container: container.to_string(),
        size: stored.data.len() as u64,
        hash: Some(stored.hash.clone()),
        extra: stored.extra.clone(),
    }
}
