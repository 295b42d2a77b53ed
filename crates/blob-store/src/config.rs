use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    provider::ObjectStoreProvider,
    registry::{DriverOptions, DriverRegistry},
    Result, StoreError,
};

pub const KEY_ENV: &str = "OBJECT_STORE_KEY";
pub const SECRET_ENV: &str = "OBJECT_STORE_SECRET";

/// Settings for an [`ObjectStoreProvider`].
///
/// Do not hardcode `secret` in a config file; leave it unset and export
/// `OBJECT_STORE_SECRET` instead, then call [`ObjectStoreConfig::apply_env`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectStoreConfig {
    /// Provider name as registered in the [`DriverRegistry`], e.g. `local`.
    pub provider: String,
    /// Container (bucket) name.
    pub container: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Extra driver constructor arguments.
    #[serde(default)]
    pub extra_init_kwargs: BTreeMap<String, String>,
}

impl ObjectStoreConfig {
    pub fn new(provider: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            container: container.into(),
            key: None,
            secret: None,
            region: None,
            host: None,
            port: None,
            extra_init_kwargs: BTreeMap::new(),
        }
    }

    /// Loads TOML or JSON by extension. A relative `local` root is resolved
    /// against the config file's directory.
    ///
    /// Not validated here: credentials may still arrive through
    /// [`Self::apply_env`]. [`Self::initialize_object`] validates.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut config: ObjectStoreConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            Some("toml") | Some("tml") | None => toml::from_str(&contents)?,
            Some(other) => {
                return Err(StoreError::ConfigFormat(format!(
                    "unsupported configuration extension '{}'",
                    other
                )));
            }
        };

        config.resolve_paths(&base_dir(path));
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.provider.trim().is_empty() {
            errors.push("provider must not be empty".to_string());
        }
        if self.container.trim().is_empty() {
            errors.push("container must not be empty".to_string());
        }
        if let Some(0) = self.port {
            errors.push("port must be greater than 0".to_string());
        }
        if self.secret.is_some() && self.key.is_none() {
            errors.push("secret is set without a key".to_string());
        }

        if !errors.is_empty() {
            return Err(StoreError::Validation(errors));
        }
        Ok(())
    }

    /// Fills unset credentials from `OBJECT_STORE_KEY` / `OBJECT_STORE_SECRET`.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.key.is_none() {
            self.key = lookup(KEY_ENV);
        }
        if self.secret.is_none() {
            self.secret = lookup(SECRET_ENV);
        }
    }

    /// Only the fields that are set are forwarded; `extra_init_kwargs` win on conflict.
    pub fn driver_options(&self) -> DriverOptions {
        let mut options = DriverOptions {
            key: self.key.clone(),
            secret: self.secret.clone(),
            host: self.host.clone(),
            port: self.port,
            region: self.region.clone(),
            extra: BTreeMap::new(),
        };
        for (name, value) in &self.extra_init_kwargs {
            match name.as_str() {
                "key" => options.key = Some(value.clone()),
                "secret" => options.secret = Some(value.clone()),
                "host" => options.host = Some(value.clone()),
                "region" => options.region = Some(value.clone()),
                "port" => match value.parse() {
                    Ok(port) => options.port = Some(port),
                    Err(_) => {
                        options.extra.insert(name.clone(), value.clone());
                    }
                },
                _ => {
                    options.extra.insert(name.clone(), value.clone());
                }
            }
        }
        options
    }

    pub fn initialize_object(&self) -> Result<ObjectStoreProvider> {
        self.initialize_with(&DriverRegistry::with_builtin())
    }

    pub fn initialize_with(&self, registry: &DriverRegistry) -> Result<ObjectStoreProvider> {
        self.validate()?;
        ObjectStoreProvider::with_registry(
            registry,
            &self.provider,
            &self.container,
            Some(self.driver_options()),
        )
    }

    /// Joins a relative `local` root onto `base`. Absolute roots are left alone,
    /// so resolving twice against an absolute base is a no-op.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.provider != crate::local::LocalDriver::PROVIDER {
            return;
        }
        if let Some(root) = self.key.as_mut() {
            let path = Path::new(root.as_str());
            if path.is_relative() {
                *root = base.join(path).to_string_lossy().into_owned();
            }
        }
    }
}

/// Absolute directory holding `config_path`, the base for relative paths in it.
pub fn base_dir(config_path: &Path) -> PathBuf {
    let parent = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    parent
        .canonicalize()
        .unwrap_or_else(|_| parent.to_path_buf())
}
