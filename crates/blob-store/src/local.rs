use std::{
    fs::{self, File},
    io::{BufReader, Read, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::{
    driver::{
        validate_object_name, ByteIter, ByteStream, ChunkReader, Container, ContentHasher, Extra,
        Headers, ObjectMeta, StorageDriver,
    },
    registry::DriverOptions,
    Result, StoreError,
};

/// Stores containers as directories under a root directory.
///
/// The root comes from the `key` option, as with the local driver of most
/// cloud storage SDKs. Set the `create_containers` extra to create missing
/// container directories on first use.
#[derive(Debug)]
pub struct LocalDriver {
    root: PathBuf,
    create_containers: bool,
}

impl LocalDriver {
    pub const PROVIDER: &'static str = "local";

    pub fn new(options: &DriverOptions) -> Result<Self> {
        let root = options.key.as_deref().ok_or_else(|| {
            StoreError::InvalidOptions("local driver needs `key` set to a root directory".into())
        })?;
        let root = PathBuf::from(root);
        if !root.is_dir() {
            return Err(StoreError::InvalidOptions(format!(
                "local root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self {
            root,
            create_containers: options.flag("create_containers"),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container_name: &str) -> Result<PathBuf> {
        if container_name.is_empty()
            || container_name.contains(['/', '\\'])
            || container_name == ".."
        {
            return Err(StoreError::ContainerDoesNotExist(container_name.to_string()));
        }
        Ok(self.root.join(container_name))
    }

    fn object_path(&self, container_name: &str, object_name: &str) -> Result<PathBuf> {
        validate_object_name(object_name)?;
        Ok(self.container_dir(container_name)?.join(object_name))
    }

    /// Streams chunks into `object_name`, going through a sibling temp file
    /// so readers never observe a half-written object.
    fn write_object<I>(
        &self,
        chunks: I,
        container: &Container,
        object_name: &str,
    ) -> Result<(PathBuf, String, u64)>
    where
        I: Iterator<Item = Result<bytes::Bytes>>,
    {
        let target = self.object_path(&container.name, object_name)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = partial_path(&target);

        let outcome = (|| -> Result<(String, u64)> {
            let mut file = File::create(&partial)?;
            let mut hasher = ContentHasher::default();
            for chunk in chunks {
                let chunk = chunk?;
                file.write_all(&chunk)?;
                hasher.update(&chunk);
            }
            file.sync_all()?;
            Ok(hasher.finish())
        })();

        match outcome {
            Ok((hash, size)) => {
                fs::rename(&partial, &target)?;
                Ok((target, hash, size))
            }
            Err(err) => {
                let _ = fs::remove_file(&partial);
                Err(err)
            }
        }
    }
}

impl StorageDriver for LocalDriver {
    fn name(&self) -> &str {
        Self::PROVIDER
    }

    fn get_container(&self, container_name: &str) -> Result<Container> {
        let dir = self.container_dir(container_name)?;
        if !dir.is_dir() {
            if !self.create_containers {
                return Err(StoreError::ContainerDoesNotExist(container_name.to_string()));
            }
            debug!(container = container_name, "creating container directory");
            fs::create_dir_all(&dir)?;
        }
        Ok(Container::new(container_name))
    }

    fn upload_object(
        &self,
        file_path: &Path,
        container: &Container,
        object_name: &str,
        extra: Option<&Extra>,
        verify_hash: bool,
        _headers: Option<&Headers>,
    ) -> Result<ObjectMeta> {
        let source = BufReader::new(File::open(file_path)?);
        let (target, hash, size) =
            self.write_object(ChunkReader::new(source, None), container, object_name)?;

        if verify_hash {
            let stored = hash_file(&target)?;
            if stored != hash {
                let _ = fs::remove_file(&target);
                return Err(StoreError::HashMismatch {
                    object: object_name.to_string(),
                    expected: hash,
                    actual: stored,
                });
            }
        }

        debug!(object = object_name, size, "uploaded file");
        Ok(ObjectMeta {
            name: object_name.to_string(),
            container: container.name.clone(),
            size,
            hash: Some(hash),
            extra: extra.cloned().unwrap_or_default(),
        })
    }

    fn upload_object_via_stream(
        &self,
        iterator: ByteIter<'_>,
        container: &Container,
        object_name: &str,
        extra: Option<&Extra>,
        _headers: Option<&Headers>,
    ) -> Result<ObjectMeta> {
        let (_, hash, size) = self.write_object(iterator.map(Ok), container, object_name)?;
        debug!(object = object_name, size, "uploaded stream");
        Ok(ObjectMeta {
            name: object_name.to_string(),
            container: container.name.clone(),
            size,
            hash: Some(hash),
            extra: extra.cloned().unwrap_or_default(),
        })
    }

    fn get_object(&self, container_name: &str, object_name: &str) -> Result<ObjectMeta> {
        let path = self.object_path(container_name, object_name)?;
        if !path.is_file() {
            return Err(StoreError::ObjectDoesNotExist {
                container: container_name.to_string(),
                object: object_name.to_string(),
            });
        }
        let size = fs::metadata(&path)?.len();
        Ok(ObjectMeta {
            name: object_name.to_string(),
            container: container_name.to_string(),
            size,
            hash: Some(hash_file(&path)?),
            extra: Extra::new(),
        })
    }

    fn download_object(
        &self,
        obj: &ObjectMeta,
        destination_path: &Path,
        overwrite_existing: bool,
        delete_on_failure: bool,
    ) -> Result<bool> {
        let source = self.object_path(&obj.container, &obj.name)?;
        let reader = File::open(&source).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::ObjectDoesNotExist {
                container: obj.container.clone(),
                object: obj.name.clone(),
            },
            _ => err.into(),
        })?;
        let chunks = ChunkReader::new(BufReader::new(reader), None);
        save_stream(chunks, obj, destination_path, overwrite_existing, delete_on_failure)
    }

    fn download_object_as_stream(
        &self,
        obj: &ObjectMeta,
        chunk_size: Option<usize>,
    ) -> Result<ByteStream> {
        let path = self.object_path(&obj.container, &obj.name)?;
        let file = File::open(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::ObjectDoesNotExist {
                container: obj.container.clone(),
                object: obj.name.clone(),
            },
            _ => err.into(),
        })?;
        Ok(Box::new(ChunkReader::new(BufReader::new(file), chunk_size)))
    }
}

/// Writes a download to disk and checks it against `obj`'s size and hash.
///
/// A directory destination receives the object's base name. On a mismatch
/// the partial file is removed when `delete_on_failure` is set.
pub(crate) fn save_stream<I>(
    chunks: I,
    obj: &ObjectMeta,
    destination_path: &Path,
    overwrite_existing: bool,
    delete_on_failure: bool,
) -> Result<bool>
where
    I: Iterator<Item = Result<bytes::Bytes>>,
{
    let destination = if destination_path.is_dir() {
        let base = obj.name.rsplit('/').next().unwrap_or(&obj.name);
        destination_path.join(base)
    } else {
        destination_path.to_path_buf()
    };

    if destination.exists() && !overwrite_existing {
        return Err(StoreError::ObjectAlreadyExists(destination));
    }

    let written = (|| -> Result<(String, u64)> {
        let mut file = File::create(&destination)?;
        let mut hasher = ContentHasher::default();
        for chunk in chunks {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            hasher.update(&chunk);
        }
        file.flush()?;
        Ok(hasher.finish())
    })();

    let failure = match written {
        Ok((hash, size)) => {
            if size != obj.size {
                StoreError::SizeMismatch {
                    object: obj.name.clone(),
                    expected: obj.size,
                    actual: size,
                }
            } else if let Some(expected) = obj.hash.as_ref().filter(|e| **e != hash) {
                StoreError::HashMismatch {
                    object: obj.name.clone(),
                    expected: expected.clone(),
                    actual: hash,
                }
            } else {
                debug!(object = %obj.name, destination = %destination.display(), "downloaded object");
                return Ok(true);
            }
        }
        Err(err) => err,
    };

    if delete_on_failure {
        warn!(destination = %destination.display(), %failure, "removing partial download");
        let _ = fs::remove_file(&destination);
    }
    Err(failure)
}

fn hash_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = ContentHasher::default();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finish().0)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::sha256_hex;
    use bytes::Bytes;
    use tempfile::tempdir;

    fn driver(root: &Path) -> LocalDriver {
        let options = DriverOptions::default()
            .with_key(root.to_string_lossy())
            .with_extra("create_containers", "true");
        LocalDriver::new(&options).unwrap()
    }

    #[test]
    fn requires_an_existing_root() {
        assert!(LocalDriver::new(&DriverOptions::default()).is_err());
        let options = DriverOptions::default().with_key("/definitely/not/here");
        assert!(LocalDriver::new(&options).is_err());
    }

    #[test]
    fn missing_container_without_create_flag() {
        let root = tempdir().unwrap();
        let options = DriverOptions::default().with_key(root.path().to_string_lossy());
        let driver = LocalDriver::new(&options).unwrap();
        assert!(matches!(
            driver.get_container("absent"),
            Err(StoreError::ContainerDoesNotExist(_))
        ));
    }

    #[test]
    fn stream_upload_records_hash_and_size() {
        let root = tempdir().unwrap();
        let driver = driver(root.path());
        let container = driver.get_container("bucket").unwrap();

        let chunks: Vec<Bytes> = vec![Bytes::from_static(b"ab"), Bytes::from_static(b"cd")];
        let meta = driver
            .upload_object_via_stream(Box::new(chunks.into_iter()), &container, "dir/obj", None, None)
            .unwrap();
        assert_eq!(meta.size, 4);
        assert_eq!(meta.hash.as_deref(), Some(sha256_hex(b"abcd").as_str()));
        assert!(root.path().join("bucket/dir/obj").is_file());
        assert!(!root.path().join("bucket/dir/obj.partial").exists());
    }

    #[test]
    fn tampered_hash_deletes_partial_download() {
        let root = tempdir().unwrap();
        let driver = driver(root.path());
        let container = driver.get_container("bucket").unwrap();
        let chunks = vec![Bytes::from_static(b"payload")];
        driver
            .upload_object_via_stream(Box::new(chunks.into_iter()), &container, "obj", None, None)
            .unwrap();

        let mut meta = driver.get_object("bucket", "obj").unwrap();
        meta.hash = Some(sha256_hex(b"something else"));
        let out = tempdir().unwrap();
        let dest = out.path().join("copy");

        let err = driver.download_object(&meta, &dest, false, true).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
        assert!(!dest.exists());

        let err = driver.download_object(&meta, &dest, false, false).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { .. }));
        assert!(dest.exists(), "partial file kept when delete_on_failure is false");
    }
}
