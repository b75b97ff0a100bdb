//! One aggregate per process.
//!
//! [`Context`] owns the [`ResourcesModel`] and the [`TransactionModel`] and
//! is the single task that mutates them. Front ends drive it with
//! [`Context::process_next`] or the `wait_*` helpers, which apply backend
//! and driver reports in arrival order.

use crate::backend::BackendMessage;
use crate::config::{DepotConfig, ModelSettings};
use crate::error::ModelError;
use crate::model::ResourcesModel;
use crate::registry::BackendRegistry;
use crate::transaction::{TransactionMessage, TransactionModel};
use depot_schema::{AddonList, Category, ResourceKey, TransactionId};

/// The aggregate plus the transactions acting on it.
#[derive(Debug)]
pub struct Context {
    /// Every registered backend, merged.
    pub model: ResourcesModel,
    /// Queued and running transactions.
    pub transactions: TransactionModel,
    categories: Vec<Category>,
}

enum Next {
    Backend(BackendMessage),
    Transaction(TransactionMessage),
}

impl Context {
    /// A context without backends.
    pub fn new(settings: ModelSettings) -> Self {
        Self {
            model: ResourcesModel::new(settings),
            transactions: TransactionModel::new(),
            categories: Vec::new(),
        }
    }

    /// Build every enabled backend of `config` and register it.
    ///
    /// A backend that cannot be built or registered is logged and skipped;
    /// the others are unaffected.
    pub async fn from_config(config: &DepotConfig, registry: &BackendRegistry) -> Self {
        let mut context = Self::new(config.model.clone());
        context.categories.clone_from(&config.categories);

        for settings in config.enabled_backends() {
            let backends = match registry.create(settings).await {
                Ok(backends) => backends,
                Err(e) => {
                    tracing::warn!(backend = %settings.name, kind = %settings.kind, error = %e, "Failed to create backend");
                    continue;
                }
            };
            for backend in backends {
                let id = backend.id().clone();
                if let Err(e) = context.model.register_backend(backend) {
                    tracing::warn!(backend = %id, error = %e, "Failed to register backend");
                }
            }
        }
        context
    }

    /// Configured browsing categories.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Depth-first lookup of a category by name.
    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find_map(|c| c.find(name))
    }

    /// Queue an install (or addon change) through the resource's backend.
    pub fn install_application(
        &mut self,
        resource: &ResourceKey,
        addons: &AddonList,
    ) -> Result<TransactionId, ModelError> {
        let backend = self
            .model
            .backend(&resource.backend)
            .cloned()
            .ok_or_else(|| ModelError::UnknownBackend(resource.backend.clone()))?;
        if backend.resource(resource.resource).is_none() {
            return Err(ModelError::UnknownResource(resource.clone()));
        }
        let transaction = backend.install_application(resource, addons)?;
        tracing::info!(%resource, role = ?transaction.role(), "Queueing install");
        Ok(self.transactions.add_transaction(transaction))
    }

    /// Queue a removal through the resource's backend.
    pub fn remove_application(&mut self, resource: &ResourceKey) -> Result<TransactionId, ModelError> {
        let backend = self
            .model
            .backend(&resource.backend)
            .cloned()
            .ok_or_else(|| ModelError::UnknownBackend(resource.backend.clone()))?;
        if backend.resource(resource.resource).is_none() {
            return Err(ModelError::UnknownResource(resource.clone()));
        }
        let transaction = backend.remove_application(resource)?;
        tracing::info!(%resource, "Queueing removal");
        Ok(self.transactions.add_transaction(transaction))
    }

    /// Start an update on every backend that has something to upgrade.
    pub fn update_all(&mut self) -> Result<Vec<TransactionId>, ModelError> {
        let updaters: Vec<_> = self.model.backends().map(|b| b.backend_updater()).collect();
        let mut started = Vec::new();
        for updater in updaters {
            updater.prepare();
            if !updater.has_updates() {
                continue;
            }
            if let Some(transaction) = updater.start()? {
                tracing::info!(backend = %transaction.backend(), packages = updater.to_update().len(), "Queueing update");
                started.push(self.transactions.add_transaction(transaction));
            }
        }
        Ok(started)
    }

    /// `true` while any backend fetches or any transaction is active.
    pub fn is_busy(&self) -> bool {
        self.model.is_fetching() || !self.transactions.is_empty()
    }

    /// Apply every report already waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        self.model.pump() + self.transactions.pump()
    }

    /// Wait for the next backend or driver report and apply it.
    pub async fn process_next(&mut self) -> bool {
        let next = tokio::select! {
            Some(message) = self.model.next_event() => Next::Backend(message),
            Some(message) = self.transactions.next_event() => Next::Transaction(message),
            else => return false,
        };
        match next {
            Next::Backend(message) => self.model.handle_backend_event(message),
            Next::Transaction(message) => self.transactions.handle_event(message),
        }
        true
    }

    /// Process reports until no backend is fetching.
    pub async fn wait_until_ready(&mut self) {
        self.pump();
        while self.model.is_fetching() {
            if !self.process_next().await {
                break;
            }
        }
    }

    /// Process reports until every transaction finished.
    pub async fn wait_for_transactions(&mut self) {
        self.pump();
        while !self.transactions.is_empty() {
            if !self.process_next().await {
                break;
            }
        }
        self.pump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::dummy::{DummyBackend, DummyPackage};
    use crate::config::BackendSettings;
    use crate::error::BackendError;
    use depot_schema::{BackendId, ResourceId, ResourceState};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_from_config_skips_broken_entries() {
        let mut config = DepotConfig::default();
        config.backends.push(BackendSettings::new("apt", "dummy"));
        config.backends.push(BackendSettings::new("snap", "snapd"));
        let mut invalid = BackendSettings::new("broken", "dummy");
        invalid.options.insert("valid".into(), toml::Value::Boolean(false));
        config.backends.push(invalid);

        let context = Context::from_config(&config, &BackendRegistry::with_builtin()).await;
        let ids: Vec<_> = context.model.backends().map(|b| b.id().to_string()).collect();
        assert_eq!(ids, vec!["apt"]);
        assert!(context.model.blacklist().contains(&BackendId::new("broken")));
    }

    #[tokio::test]
    async fn test_install_then_wait() {
        let mut context = Context::new(ModelSettings::default());
        let apt = Arc::new(DummyBackend::new("apt", vec![DummyPackage::new("vim")]));
        context.model.register_backend(apt.clone()).unwrap();
        let key = apt.key_of("vim").unwrap();

        context.install_application(&key, &AddonList::new()).unwrap();
        assert!(context.is_busy());
        context.wait_for_transactions().await;
        assert!(!context.is_busy());
        assert_eq!(
            context.model.resolve(&key).map(|r| r.state()),
            Some(ResourceState::Installed)
        );
    }

    #[test]
    fn test_unknown_targets() {
        let mut context = Context::new(ModelSettings::default());
        let apt = Arc::new(DummyBackend::new("apt", vec![DummyPackage::new("vim")]));
        context.model.register_backend(apt).unwrap();

        let ghost = ResourceKey::new(BackendId::new("apt"), ResourceId::new(99));
        assert!(matches!(
            context.remove_application(&ghost),
            Err(ModelError::UnknownResource(_))
        ));
        let elsewhere = ResourceKey::new(BackendId::new("snap"), ResourceId::new(1));
        assert!(matches!(
            context.install_application(&elsewhere, &AddonList::new()),
            Err(ModelError::UnknownBackend(_))
        ));
        let vim = ResourceKey::new(BackendId::new("apt"), ResourceId::new(1));
        assert!(matches!(
            context.remove_application(&vim),
            Err(ModelError::Backend(BackendError::Unsupported { .. }))
        ));
    }

    #[tokio::test]
    async fn test_update_all_covers_every_backend() {
        let mut context = Context::new(ModelSettings::default());
        for name in ["apt", "flatpak"] {
            let backend = Arc::new(DummyBackend::new(
                name,
                vec![
                    DummyPackage::new("old").state(ResourceState::Upgradeable),
                    DummyPackage::new("current").state(ResourceState::Installed),
                ],
            ));
            context.model.register_backend(backend).unwrap();
        }
        context.model.register_backend(Arc::new(DummyBackend::new("empty", Vec::new()))).unwrap();
        assert_eq!(context.model.updates_count(), 2);

        let started = context.update_all().unwrap();
        assert_eq!(started.len(), 2);
        context.wait_for_transactions().await;
        assert_eq!(context.model.updates_count(), 0);
    }
}
