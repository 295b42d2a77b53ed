use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    driver::StorageDriver, local::LocalDriver, memory::MemoryDriver, Result, StoreError,
};

/// Constructor arguments handed to a driver factory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverOptions {
    pub key: Option<String>,
    pub secret: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub region: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl DriverOptions {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn flag(&self, name: &str) -> bool {
        self.extra
            .get(name)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }
}

pub type DriverFactory =
    Box<dyn Fn(&DriverOptions) -> Result<Box<dyn StorageDriver>> + Send + Sync>;

/// Provider name to driver constructor.
pub struct DriverRegistry {
    factories: BTreeMap<String, DriverFactory>,
}

impl DriverRegistry {
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry holding the drivers that ship with this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(LocalDriver::PROVIDER, |options| {
            Ok(Box::new(LocalDriver::new(options)?) as Box<dyn StorageDriver>)
        });
        registry.register(MemoryDriver::PROVIDER, |options| {
            Ok(Box::new(MemoryDriver::new(options)) as Box<dyn StorageDriver>)
        });
        registry
    }

    pub fn register<F>(&mut self, provider: impl Into<String>, factory: F)
    where
        F: Fn(&DriverOptions) -> Result<Box<dyn StorageDriver>> + Send + Sync + 'static,
    {
        self.factories.insert(provider.into(), Box::new(factory));
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn get_driver(&self, provider: &str) -> Result<&DriverFactory> {
        self.factories
            .get(provider)
            .ok_or_else(|| StoreError::DriverUnavailable {
                provider: provider.to_string(),
                hint: format!(
                    "Register a driver for it with DriverRegistry::register, or use one of: {}.",
                    self.providers().collect::<Vec<_>>().join(", ")
                ),
            })
    }

    pub fn build(&self, provider: &str, options: &DriverOptions) -> Result<Box<dyn StorageDriver>> {
        let factory = self.get_driver(provider)?;
        debug!(provider, "constructing storage driver");
        factory(options)
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_names_the_alternatives() {
        let registry = DriverRegistry::with_builtin();
        let err = registry.build("s3", &DriverOptions::default()).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("'s3'"));
        assert!(message.contains("local, memory"));
    }

    #[test]
    fn flags_accept_common_spellings() {
        let options = DriverOptions::default()
            .with_extra("create_containers", "TRUE")
            .with_extra("other", "no");
        assert!(options.flag("create_containers"));
        assert!(!options.flag("other"));
        assert!(!options.flag("missing"));
    }
}
