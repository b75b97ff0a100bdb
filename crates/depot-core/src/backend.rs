//! The backend capability contract.
//!
//! A backend owns its resources and reports every change through the
//! [`BackendNotifier`] it receives on registration. Backends may do their
//! work on other tasks or threads; the notifier is the only way results get
//! back to the model, which applies them on its own task.

use crate::error::BackendError;
use crate::filters::Filters;
use crate::resource::Resource;
use crate::reviews::ReviewsBackend;
use crate::stream::ResultsStream;
use crate::transaction::Transaction;
use chrono::{DateTime, Utc};
use depot_schema::{AddonList, BackendId, ResourceId, ResourceKey, ResourceProperty};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Progress reported by a backend that is still fetching.
pub const FETCHING_PROGRESS_PLACEHOLDER: u8 = 42;

/// Something a backend wants the model to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// `is_fetching()` flipped to the carried value.
    FetchingChanged(bool),
    /// The resource set changed wholesale, or `is_valid()` turned false.
    Invalidated,
    /// Some properties of one resource changed.
    ResourceChanged {
        /// The changed resource.
        resource: ResourceId,
        /// Which properties changed.
        properties: Vec<ResourceProperty>,
    },
    /// Properties of every resource changed at once (e.g. ratings arrived).
    AllDataChanged(Vec<ResourceProperty>),
    /// The resource is gone. Sent before the backend drops it.
    ResourceRemoved(ResourceId),
    /// `updates_count()` or `has_security_updates()` changed.
    UpdatesCountChanged,
    /// A message to show the user without interrupting them.
    PassiveMessage(String),
}

/// A [`BackendEvent`] tagged with its sender.
#[derive(Debug, Clone)]
pub struct BackendMessage {
    /// Backend the event came from.
    pub backend: BackendId,
    /// The event.
    pub event: BackendEvent,
}

/// A backend's channel back to the model.
#[derive(Debug, Clone)]
pub struct BackendNotifier {
    backend: BackendId,
    sender: mpsc::UnboundedSender<BackendMessage>,
}

impl BackendNotifier {
    /// Create a notifier sending as `backend`.
    pub fn new(backend: BackendId, sender: mpsc::UnboundedSender<BackendMessage>) -> Self {
        Self { backend, sender }
    }

    /// Backend this notifier speaks for.
    pub fn backend(&self) -> &BackendId {
        &self.backend
    }

    /// Send an event. Returns `false` if the model is gone.
    pub fn notify(&self, event: BackendEvent) -> bool {
        self.sender
            .send(BackendMessage {
                backend: self.backend.clone(),
                event,
            })
            .is_ok()
    }

    /// Shorthand for [`BackendEvent::FetchingChanged`].
    pub fn fetching_changed(&self, fetching: bool) -> bool {
        self.notify(BackendEvent::FetchingChanged(fetching))
    }

    /// Shorthand for [`BackendEvent::Invalidated`].
    pub fn invalidated(&self) -> bool {
        self.notify(BackendEvent::Invalidated)
    }

    /// Shorthand for [`BackendEvent::ResourceChanged`].
    pub fn resource_changed(&self, resource: ResourceId, properties: &[ResourceProperty]) -> bool {
        self.notify(BackendEvent::ResourceChanged {
            resource,
            properties: properties.to_vec(),
        })
    }

    /// Shorthand for [`BackendEvent::ResourceRemoved`].
    pub fn resource_removed(&self, resource: ResourceId) -> bool {
        self.notify(BackendEvent::ResourceRemoved(resource))
    }

    /// Shorthand for [`BackendEvent::UpdatesCountChanged`].
    pub fn updates_count_changed(&self) -> bool {
        self.notify(BackendEvent::UpdatesCountChanged)
    }

    /// Shorthand for [`BackendEvent::PassiveMessage`].
    pub fn passive_message(&self, message: impl Into<String>) -> bool {
        self.notify(BackendEvent::PassiveMessage(message.into()))
    }
}

/// One package source.
pub trait ResourcesBackend: Send + Sync + fmt::Debug {
    /// Stable identifier.
    fn id(&self) -> &BackendId;

    /// Name shown to users.
    fn display_name(&self) -> &str {
        self.id().as_str()
    }

    /// Hand the backend its notifier. Called once, on registration.
    fn connect(&self, notifier: BackendNotifier);

    /// `false` if the backend failed to initialize and must be discarded.
    fn is_valid(&self) -> bool;

    /// `true` while the resource set is being (re)built and must not be read.
    fn is_fetching(&self) -> bool;

    /// The current resource set, in the backend's own order.
    fn resources(&self) -> Vec<Arc<dyn Resource>>;

    /// Resolve one of the backend's resources.
    fn resource(&self, id: ResourceId) -> Option<Arc<dyn Resource>>;

    /// Start a search. The stream may deliver results in several batches.
    fn search(&self, filters: &Filters) -> ResultsStream;

    /// Create a transaction installing `resource`, plus addon changes.
    fn install_application(
        &self,
        resource: &ResourceKey,
        addons: &AddonList,
    ) -> Result<Transaction, BackendError>;

    /// Create a transaction removing `resource`.
    fn remove_application(&self, resource: &ResourceKey) -> Result<Transaction, BackendError>;

    /// Ask the backend to refresh its update information.
    fn check_for_updates(&self);

    /// Number of pending updates.
    fn updates_count(&self) -> usize;

    /// Whether any pending update is a security fix.
    fn has_security_updates(&self) -> bool {
        false
    }

    /// Progress of the update check, 0..=100.
    fn fetching_updates_progress(&self) -> u8 {
        if self.is_fetching() {
            FETCHING_PROGRESS_PLACEHOLDER
        } else {
            100
        }
    }

    /// Whether the backend offers user-facing applications.
    fn has_applications(&self) -> bool {
        false
    }

    /// Whether some resource of this backend is an addon for `package_name`.
    fn extends(&self, package_name: &str) -> bool {
        let _ = package_name;
        false
    }

    /// The backend's updater.
    fn backend_updater(&self) -> Arc<dyn BackendUpdater>;

    /// The ratings collaborator, if any.
    fn reviews_backend(&self) -> Option<Arc<dyn ReviewsBackend>> {
        None
    }
}

/// Drives system-wide upgrades for one backend.
pub trait BackendUpdater: Send + Sync + fmt::Debug {
    /// Compute the set of resources to upgrade.
    fn prepare(&self);

    /// Start upgrading. `Ok(None)` if there is nothing to do.
    ///
    /// The transaction acts on no single resource.
    fn start(&self) -> Result<Option<Transaction>, BackendError>;

    /// `true` while an upgrade runs.
    fn is_progressing(&self) -> bool;

    /// `true` if [`BackendUpdater::prepare`] found something to upgrade.
    fn has_updates(&self) -> bool {
        !self.to_update().is_empty()
    }

    /// Resources selected by the last [`BackendUpdater::prepare`].
    fn to_update(&self) -> Vec<ResourceKey>;

    /// When updates were last checked.
    fn last_update(&self) -> Option<DateTime<Utc>>;
}
