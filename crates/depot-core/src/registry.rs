//! Backend factories.
//!
//! Backends are not linked in by name: each configuration entry names a
//! factory `kind`, and the registry maps kinds to the factories that build
//! them. One entry may yield several backends.

use crate::backend::ResourcesBackend;
use crate::backends::dummy::DummyFactory;
use crate::config::BackendSettings;
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Builds backends from a configuration entry.
#[async_trait]
pub trait BackendFactory: Send + Sync + fmt::Debug {
    /// Kind name matched against `kind` in the configuration.
    fn kind(&self) -> &'static str;

    /// Build the backends described by `settings`.
    async fn create(
        &self,
        settings: &BackendSettings,
    ) -> Result<Vec<Arc<dyn ResourcesBackend>>, BackendError>;
}

/// Kind name to factory.
#[derive(Debug, Default, Clone)]
pub struct BackendRegistry {
    factories: BTreeMap<String, Arc<dyn BackendFactory>>,
}

impl BackendRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every factory shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DummyFactory);
        registry
    }

    /// Add a factory. A factory of the same kind is replaced.
    pub fn register(&mut self, factory: impl BackendFactory + 'static) {
        let kind = factory.kind().to_string();
        if self
            .factories
            .insert(kind.clone(), Arc::new(factory))
            .is_some()
        {
            tracing::debug!(%kind, "Replaced backend factory");
        }
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Factory for `kind`.
    pub fn get(&self, kind: &str) -> Option<&Arc<dyn BackendFactory>> {
        self.factories.get(kind)
    }

    /// Build the backends of one configuration entry.
    pub async fn create(
        &self,
        settings: &BackendSettings,
    ) -> Result<Vec<Arc<dyn ResourcesBackend>>, BackendError> {
        let factory = self
            .get(&settings.kind)
            .ok_or_else(|| BackendError::UnknownFactory(settings.kind.clone()))?;
        factory.create(settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_dummy_factory() {
        let registry = BackendRegistry::with_builtin();
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["dummy"]);

        let backends = registry
            .create(&BackendSettings::new("apt", "dummy"))
            .await
            .unwrap();
        assert_eq!(backends.len(), 1);
        assert_eq!(backends[0].id().as_str(), "apt");
    }

    #[tokio::test]
    async fn test_unknown_kind() {
        let registry = BackendRegistry::with_builtin();
        let result = registry
            .create(&BackendSettings::new("snap", "snapd"))
            .await;
        assert!(matches!(result, Err(BackendError::UnknownFactory(kind)) if kind == "snapd"));
    }

    #[tokio::test]
    async fn test_bad_options_are_reported() {
        let mut settings = BackendSettings::new("apt", "dummy");
        settings
            .options
            .insert("fetch_delay_ms".into(), toml::Value::String("soon".into()));
        let result = BackendRegistry::with_builtin().create(&settings).await;
        assert!(matches!(result, Err(BackendError::Options { backend, .. }) if backend == "apt"));
    }
}
