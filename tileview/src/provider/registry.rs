//! Explicit provider registry.
//!
//! Providers are created by name through factories registered at start-up.
//! The two template kinds are always available; applications add their own
//! kinds with [`ProviderRegistry::register`].

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::template::{
    StaticTemplateProvider, XyzTemplateProvider, STATIC_TEMPLATE_KIND, XYZ_TEMPLATE_KIND,
};
use super::types::{ProviderError, ProviderSettings, TileProvider};

/// Creates a provider from settings.
pub type ProviderFactory =
    Box<dyn Fn(&ProviderSettings) -> Result<Arc<dyn TileProvider>, ProviderError> + Send + Sync>;

/// Name → factory mapping.
pub struct ProviderRegistry {
    factories: BTreeMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Creates a registry without any provider kinds.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Creates a registry with the template provider kinds registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(XYZ_TEMPLATE_KIND, |settings| {
            Ok(Arc::new(XyzTemplateProvider::from_settings(settings)?) as Arc<dyn TileProvider>)
        });
        registry.register(STATIC_TEMPLATE_KIND, |settings| {
            Ok(Arc::new(StaticTemplateProvider::from_settings(settings)?) as Arc<dyn TileProvider>)
        });
        registry
    }

    /// Registers a factory, replacing any factory of the same kind.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ProviderSettings) -> Result<Arc<dyn TileProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .insert(kind.into().to_ascii_lowercase(), Box::new(factory));
    }

    /// Creates a provider of `settings.kind`.
    pub fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn TileProvider>, ProviderError> {
        let kind = settings.kind.to_ascii_lowercase();
        let factory = self.factories.get(&kind).ok_or_else(|| {
            ProviderError::UnsupportedConfiguration(format!(
                "unknown provider kind '{}' (available: {})",
                settings.kind,
                self.kinds().collect::<Vec<_>>().join(", ")
            ))
        })?;

        let provider = factory(settings)?;
        info!(
            kind = %kind,
            provider = provider.name(),
            "Provider created"
        );
        Ok(provider)
    }

    /// Registered kinds in sorted order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(&kind.to_ascii_lowercase())
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("kinds", &self.kinds().collect::<Vec<_>>())
            .finish()
    }
}
