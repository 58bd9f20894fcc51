//! Process-wide provider registry and the property bundle handed to
//! provider factories.
//!
//! Provider implementations register themselves at program start; the
//! surrounding bootstrap consults the registry and hands the constructed
//! providers to the engine. The engine itself never touches it.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::error::{Error, Result};
use crate::provider::Provider;

// ── Options bundle ────────────────────────────────────────────────────────────

/// Hierarchical string-to-string property bundle, keyed by dotted paths
/// (e.g. `sim.route.speed`). Values parse on demand.
#[derive(Debug, Clone, Default)]
pub struct Options {
    values: BTreeMap<String, String>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Typed lookup; unparseable text reads as absent.
    pub fn get<T: FromStr>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(|v| v.parse().ok())
    }

    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }
}

impl FromIterator<(String, String)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

type Factory = Box<dyn Fn(&Options) -> Result<Arc<dyn Provider>> + Send + Sync>;

/// Mapping from provider class name to factory.
pub struct ProviderRegistry {
    factories: Mutex<BTreeMap<String, Factory>>,
}

static REGISTRY: Lazy<ProviderRegistry> = Lazy::new(|| ProviderRegistry {
    factories: Mutex::new(BTreeMap::new()),
});

impl ProviderRegistry {
    /// The process-wide instance, initialized on first use.
    pub fn instance() -> &'static ProviderRegistry {
        &REGISTRY
    }

    pub fn add_factory<F>(&self, class_name: &str, factory: F)
    where
        F: Fn(&Options) -> Result<Arc<dyn Provider>> + Send + Sync + 'static,
    {
        debug!(class_name, "registering provider factory");
        self.factories
            .lock()
            .unwrap()
            .insert(class_name.to_string(), Box::new(factory));
    }

    /// Instantiates the named provider class with the given options.
    pub fn create(&self, class_name: &str, options: &Options) -> Result<Arc<dyn Provider>> {
        let factories = self.factories.lock().unwrap();
        match factories.get(class_name) {
            Some(factory) => factory(options),
            None => Err(Error::InvalidArgument(format!(
                "unknown provider class {class_name:?}"
            ))),
        }
    }

    pub fn registered_class_names(&self) -> Vec<String> {
        self.factories.lock().unwrap().keys().cloned().collect()
    }
}
