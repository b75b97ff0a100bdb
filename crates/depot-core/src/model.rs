//! The aggregation root.
//!
//! `ResourcesModel` holds the registered backends in registration order and,
//! for each, the ids of the resources it contributes. The global row index
//! is the concatenation of those slices. A backend's slice stays empty while
//! it fetches and is replaced wholesale when fetching finishes.
//!
//! Backends report through a shared channel; nothing changes until the owner
//! drains it with [`ResourcesModel::pump`] or
//! [`ResourcesModel::next_event`] + [`ResourcesModel::handle_backend_event`].

use crate::backend::{BackendEvent, BackendMessage, BackendNotifier, ResourcesBackend};
use crate::config::ModelSettings;
use crate::error::ModelError;
use crate::filters::Filters;
use crate::resource::Resource;
use crate::signal::Subscribers;
use crate::stream::{AggregatedResultsStream, ResultsStream};
use depot_schema::{BackendId, ResourceId, ResourceKey, ResourceProperty};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Notifications published by the [`ResourcesModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    /// Rows `first..=last` were inserted, all belonging to `backend`.
    RowsInserted {
        /// Owner of the rows.
        backend: BackendId,
        /// First inserted row.
        first: usize,
        /// Last inserted row.
        last: usize,
    },
    /// Rows `first..=last` were removed, all belonging to `backend`.
    RowsRemoved {
        /// Owner of the rows.
        backend: BackendId,
        /// First removed row.
        first: usize,
        /// Last removed row.
        last: usize,
    },
    /// A backend's slice was rebuilt wholesale.
    BackendReloaded(BackendId),
    /// A backend started or finished fetching.
    BackendFetchingChanged {
        /// The backend.
        backend: BackendId,
        /// New fetching flag.
        fetching: bool,
    },
    /// Some properties of one resource changed.
    ResourceDataChanged {
        /// The resource.
        key: ResourceKey,
        /// Its row, if it is in the aggregate.
        row: Option<usize>,
        /// Changed properties.
        properties: Vec<ResourceProperty>,
    },
    /// A resource was dropped by its backend.
    ResourceRemoved {
        /// The resource.
        key: ResourceKey,
    },
    /// Properties of every resource of a backend changed.
    BackendDataChanged {
        /// The backend.
        backend: BackendId,
        /// Changed properties.
        properties: Vec<ResourceProperty>,
    },
    /// A backend was registered or discarded.
    BackendsChanged,
    /// Global fetching flag flipped.
    FetchingChanged(bool),
    /// Sum of pending updates changed.
    UpdatesCountChanged(usize),
    /// Mean update-check progress changed.
    FetchingUpdatesProgressChanged(u8),
    /// A backend has a message for the user.
    PassiveMessage(String),
    /// The preferred application backend changed.
    CurrentApplicationBackendChanged(Option<BackendId>),
}

#[derive(Debug)]
struct BackendSlot {
    backend: Arc<dyn ResourcesBackend>,
    resources: Vec<ResourceId>,
    fetching: bool,
}

impl BackendSlot {
    fn id(&self) -> &BackendId {
        self.backend.id()
    }
}

/// Merges every registered backend into one row-addressable collection.
#[derive(Debug)]
pub struct ResourcesModel {
    settings: ModelSettings,
    slots: Vec<BackendSlot>,
    blacklist: BTreeSet<BackendId>,
    sender: mpsc::UnboundedSender<BackendMessage>,
    receiver: mpsc::UnboundedReceiver<BackendMessage>,
    subscribers: Subscribers<ModelEvent>,
    current_application_backend: Option<BackendId>,
    last_fetching: bool,
    last_updates_count: usize,
    last_updates_progress: u8,
}

impl Default for ResourcesModel {
    fn default() -> Self {
        Self::new(ModelSettings::default())
    }
}

impl ResourcesModel {
    /// Create a model with no backends.
    pub fn new(settings: ModelSettings) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            settings,
            slots: Vec::new(),
            blacklist: BTreeSet::new(),
            sender,
            receiver,
            subscribers: Subscribers::new(),
            current_application_backend: None,
            last_fetching: false,
            last_updates_count: 0,
            last_updates_progress: 100,
        }
    }

    /// Active settings.
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Listen to [`ModelEvent`]s.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ModelEvent> {
        self.subscribers.subscribe()
    }

    /// Register a backend.
    ///
    /// An invalid backend is discarded and blacklisted for the session. A
    /// ready backend's resources are appended after every earlier backend's;
    /// a fetching one gets an empty slice until it finishes.
    pub fn register_backend(&mut self, backend: Arc<dyn ResourcesBackend>) -> Result<(), ModelError> {
        let id = backend.id().clone();
        if self.blacklist.contains(&id) {
            return Err(ModelError::Blacklisted(id));
        }
        if self.slot_index(&id).is_some() {
            return Err(ModelError::DuplicateBackend(id));
        }
        if !backend.is_valid() {
            tracing::warn!(backend = %id, "Discarding invalid backend");
            self.blacklist.insert(id.clone());
            return Err(ModelError::InvalidBackend(id));
        }

        backend.connect(BackendNotifier::new(id.clone(), self.sender.clone()));
        let fetching = backend.is_fetching();
        self.slots.push(BackendSlot {
            backend,
            resources: Vec::new(),
            fetching,
        });
        let index = self.slots.len() - 1;
        if !fetching {
            self.load_slot(index);
        }
        tracing::info!(
            backend = %id,
            fetching,
            resources = self.slots[index].resources.len(),
            "Registered backend"
        );

        self.emit(ModelEvent::BackendsChanged);
        self.refresh_current_application_backend();
        self.refresh_aggregates();
        Ok(())
    }

    /// Registered backends in registration order.
    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn ResourcesBackend>> {
        self.slots.iter().map(|slot| &slot.backend)
    }

    /// Look up a registered backend.
    pub fn backend(&self, id: &BackendId) -> Option<&Arc<dyn ResourcesBackend>> {
        self.slots
            .iter()
            .find(|slot| slot.id() == id)
            .map(|slot| &slot.backend)
    }

    /// Registration position of a backend; lower means higher priority.
    pub fn backend_priority(&self, id: &BackendId) -> Option<usize> {
        self.slot_index(id)
    }

    /// Backends discarded this session.
    pub fn blacklist(&self) -> &BTreeSet<BackendId> {
        &self.blacklist
    }

    /// Total number of rows.
    pub fn row_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.resources.len()).sum()
    }

    /// Key of the resource at `row`.
    pub fn key_at(&self, row: usize) -> Option<ResourceKey> {
        let mut offset = 0;
        for slot in &self.slots {
            if row < offset + slot.resources.len() {
                return Some(ResourceKey::new(
                    slot.id().clone(),
                    slot.resources[row - offset],
                ));
            }
            offset += slot.resources.len();
        }
        None
    }

    /// Resource at `row`.
    pub fn resource_at(&self, row: usize) -> Option<Arc<dyn Resource>> {
        self.key_at(row).and_then(|key| self.resolve(&key))
    }

    /// Row of a resource. Scans only the owning backend's slice.
    pub fn row_of(&self, key: &ResourceKey) -> Option<usize> {
        let index = self.slot_index(&key.backend)?;
        let position = self.slots[index]
            .resources
            .iter()
            .position(|id| *id == key.resource)?;
        Some(self.offset_of(index) + position)
    }

    /// Resolve a key through its owning backend.
    pub fn resolve(&self, key: &ResourceKey) -> Option<Arc<dyn Resource>> {
        self.backend(&key.backend)?.resource(key.resource)
    }

    /// First resource named `package_name`, in registration order.
    pub fn resource_by_package_name(&self, package_name: &str) -> Option<Arc<dyn Resource>> {
        self.slots.iter().find_map(|slot| {
            slot.resources
                .iter()
                .filter_map(|id| slot.backend.resource(*id))
                .find(|resource| resource.package_name() == package_name)
        })
    }

    /// Every resource of the aggregate, in row order.
    pub fn resources(&self) -> Vec<Arc<dyn Resource>> {
        self.slots
            .iter()
            .flat_map(|slot| {
                slot.resources
                    .iter()
                    .filter_map(|id| slot.backend.resource(*id))
            })
            .collect()
    }

    /// Fan a search out to every backend the filters allow.
    ///
    /// Empty filters produce an empty stream that is already finished.
    pub fn search(&self, filters: &Filters) -> AggregatedResultsStream {
        let debounce = self.settings.stream_debounce();
        let slow = self.settings.slow_stream_warning();
        if filters.is_empty() {
            return AggregatedResultsStream::new(
                "empty-filters",
                vec![ResultsStream::empty("empty-filters")],
                debounce,
            );
        }

        let streams: Vec<ResultsStream> = self
            .slots
            .iter()
            .filter(|slot| filters.includes_backend(slot.id()))
            .map(|slot| slot.backend.search(filters).with_slow_warning(slow))
            .collect();
        let name = if filters.search.is_empty() {
            "listing".to_string()
        } else {
            format!("search:{}", filters.search)
        };
        AggregatedResultsStream::new(name, streams, debounce).with_slow_warning(slow)
    }

    /// Ask every backend to refresh its update information.
    pub fn check_for_updates(&self) {
        for slot in &self.slots {
            slot.backend.check_for_updates();
        }
    }

    /// `true` while any backend fetches.
    pub fn is_fetching(&self) -> bool {
        self.slots.iter().any(|slot| slot.fetching)
    }

    /// Sum of pending updates over every backend.
    pub fn updates_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| slot.backend.updates_count())
            .sum()
    }

    /// Whether any backend has a pending security update.
    pub fn has_security_updates(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.backend.has_security_updates())
    }

    /// Mean update-check progress; 100 without backends.
    pub fn fetching_updates_progress(&self) -> u8 {
        if self.slots.is_empty() {
            return 100;
        }
        let sum: u32 = self
            .slots
            .iter()
            .map(|slot| u32::from(slot.backend.fetching_updates_progress().min(100)))
            .sum();
        (sum / self.slots.len() as u32) as u8
    }

    /// Whether any backend has addons for `package_name`.
    pub fn is_extended(&self, package_name: &str) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.backend.extends(package_name))
    }

    /// Backend whose copy wins appstream de-duplication.
    pub fn current_application_backend(&self) -> Option<&BackendId> {
        self.current_application_backend.as_ref()
    }

    /// Prefer `backend` for applications from now on.
    pub fn set_current_application_backend(&mut self, backend: Option<BackendId>) {
        self.settings.current_application_backend = backend;
        self.refresh_current_application_backend();
    }

    /// Apply one backend report.
    pub fn handle_backend_event(&mut self, message: BackendMessage) {
        let BackendMessage { backend, event } = message;
        let Some(index) = self.slot_index(&backend) else {
            tracing::debug!(%backend, ?event, "Event from a backend that is not registered");
            return;
        };

        match event {
            BackendEvent::FetchingChanged(fetching) => self.fetching_changed(index, fetching),
            BackendEvent::Invalidated => {
                if self.slots[index].backend.is_valid() {
                    self.reload_slot(index);
                } else {
                    self.evict(index);
                }
            }
            BackendEvent::ResourceChanged {
                resource,
                properties,
            } => {
                let key = ResourceKey::new(backend, resource);
                let row = self.row_of(&key);
                self.emit(ModelEvent::ResourceDataChanged {
                    key,
                    row,
                    properties,
                });
            }
            BackendEvent::AllDataChanged(properties) => {
                self.emit(ModelEvent::BackendDataChanged {
                    backend,
                    properties,
                });
            }
            BackendEvent::ResourceRemoved(resource) => {
                let key = ResourceKey::new(backend.clone(), resource);
                if let Some(row) = self.row_of(&key) {
                    let slot = &mut self.slots[index];
                    slot.resources.retain(|id| *id != resource);
                    self.emit(ModelEvent::RowsRemoved {
                        backend,
                        first: row,
                        last: row,
                    });
                }
                self.emit(ModelEvent::ResourceRemoved { key });
            }
            BackendEvent::UpdatesCountChanged => {}
            BackendEvent::PassiveMessage(message) => {
                self.emit(ModelEvent::PassiveMessage(message));
            }
        }
        self.refresh_aggregates();
    }

    /// Apply every report already waiting. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.receiver.try_recv() {
            self.handle_backend_event(message);
            handled += 1;
        }
        handled
    }

    /// Wait for the next backend report.
    pub async fn next_event(&mut self) -> Option<BackendMessage> {
        self.receiver.recv().await
    }

    /// Transitions are applied in the order they were sent, so a refresh
    /// that finished before this report was handled still clears and then
    /// reloads the slice.
    fn fetching_changed(&mut self, index: usize, fetching: bool) {
        let slot = &self.slots[index];
        if !slot.backend.is_valid() {
            self.evict(index);
            return;
        }
        if fetching == slot.fetching {
            tracing::debug!(backend = %slot.id(), fetching, "Fetching state did not change");
            return;
        }

        let backend = slot.id().clone();
        self.slots[index].fetching = fetching;
        tracing::debug!(%backend, fetching, "Backend fetching changed");
        self.emit(ModelEvent::BackendFetchingChanged {
            backend: backend.clone(),
            fetching,
        });
        if fetching {
            self.clear_slot(index);
        } else {
            self.reload_slot(index);
        }
    }

    /// Replace a slice wholesale: remove-notify, then insert-notify.
    fn reload_slot(&mut self, index: usize) {
        self.clear_slot(index);
        if !self.slots[index].fetching {
            self.load_slot(index);
        }
        let backend = self.slots[index].id().clone();
        self.emit(ModelEvent::BackendReloaded(backend));
    }

    fn load_slot(&mut self, index: usize) {
        let ids: Vec<ResourceId> = self.slots[index]
            .backend
            .resources()
            .iter()
            .map(|resource| resource.id())
            .collect();
        if ids.is_empty() {
            return;
        }
        let first = self.offset_of(index);
        let last = first + ids.len() - 1;
        let backend = self.slots[index].id().clone();
        self.slots[index].resources = ids;
        self.emit(ModelEvent::RowsInserted {
            backend,
            first,
            last,
        });
    }

    fn clear_slot(&mut self, index: usize) {
        if self.slots[index].resources.is_empty() {
            return;
        }
        let first = self.offset_of(index);
        let last = first + self.slots[index].resources.len() - 1;
        let backend = self.slots[index].id().clone();
        self.slots[index].resources.clear();
        self.emit(ModelEvent::RowsRemoved {
            backend,
            first,
            last,
        });
    }

    fn evict(&mut self, index: usize) {
        let backend = self.slots[index].id().clone();
        tracing::warn!(%backend, "Backend became invalid, discarding it");
        self.clear_slot(index);
        self.slots.remove(index);
        self.blacklist.insert(backend);
        self.emit(ModelEvent::BackendsChanged);
        self.refresh_current_application_backend();
    }

    fn refresh_current_application_backend(&mut self) {
        let preferred = self
            .settings
            .current_application_backend
            .as_ref()
            .filter(|id| self.slot_index(id).is_some())
            .cloned();
        let current = preferred.or_else(|| {
            self.slots
                .iter()
                .find(|slot| slot.backend.has_applications())
                .map(|slot| slot.id().clone())
        });
        if current != self.current_application_backend {
            tracing::debug!(backend = ?current, "Current application backend changed");
            self.current_application_backend.clone_from(&current);
            self.emit(ModelEvent::CurrentApplicationBackendChanged(current));
        }
    }

    fn refresh_aggregates(&mut self) {
        let fetching = self.is_fetching();
        if fetching != self.last_fetching {
            self.last_fetching = fetching;
            self.emit(ModelEvent::FetchingChanged(fetching));
        }

        let updates = self.updates_count();
        if updates != self.last_updates_count {
            self.last_updates_count = updates;
            self.emit(ModelEvent::UpdatesCountChanged(updates));
        }

        let progress = self.fetching_updates_progress();
        if progress != self.last_updates_progress {
            self.last_updates_progress = progress;
            self.emit(ModelEvent::FetchingUpdatesProgressChanged(progress));
        }
    }

    fn slot_index(&self, id: &BackendId) -> Option<usize> {
        self.slots.iter().position(|slot| slot.id() == id)
    }

    fn offset_of(&self, index: usize) -> usize {
        self.slots[..index]
            .iter()
            .map(|slot| slot.resources.len())
            .sum()
    }

    fn emit(&mut self, event: ModelEvent) {
        self.subscribers.emit(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::dummy::{DummyBackend, DummyPackage};
    use depot_schema::ResourceState;

    fn backend(name: &str, packages: &[&str]) -> Arc<DummyBackend> {
        Arc::new(DummyBackend::new(
            name,
            packages.iter().map(|p| DummyPackage::new(*p)).collect(),
        ))
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ModelEvent>) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_ready_backend_is_spliced_after_earlier_ones() {
        let mut model = ResourcesModel::default();
        let mut events = model.subscribe();
        model.register_backend(backend("a", &["one", "two"])).unwrap();
        model.register_backend(backend("b", &["three"])).unwrap();

        assert_eq!(model.row_count(), 3);
        let inserted: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| matches!(e, ModelEvent::RowsInserted { .. }))
            .collect();
        assert_eq!(
            inserted,
            vec![
                ModelEvent::RowsInserted {
                    backend: BackendId::new("a"),
                    first: 0,
                    last: 1
                },
                ModelEvent::RowsInserted {
                    backend: BackendId::new("b"),
                    first: 2,
                    last: 2
                },
            ]
        );
        assert_eq!(
            model.resource_at(2).map(|r| r.package_name().to_string()),
            Some("three".to_string())
        );
    }

    #[test]
    fn test_duplicate_and_invalid_registration() {
        let mut model = ResourcesModel::default();
        let a = backend("a", &["one"]);
        model.register_backend(a.clone()).unwrap();
        assert!(matches!(
            model.register_backend(a),
            Err(ModelError::DuplicateBackend(_))
        ));

        let broken = backend("broken", &["x"]);
        broken.set_valid(false);
        assert!(matches!(
            model.register_backend(broken.clone()),
            Err(ModelError::InvalidBackend(_))
        ));
        broken.set_valid(true);
        assert!(matches!(
            model.register_backend(broken),
            Err(ModelError::Blacklisted(_))
        ));
        assert_eq!(model.row_count(), 1);
    }

    #[test]
    fn test_refetch_clears_then_replaces_slice() {
        let mut model = ResourcesModel::default();
        let a = backend("a", &["one", "two"]);
        let b = backend("b", &["three", "four"]);
        model.register_backend(a.clone()).unwrap();
        model.register_backend(b.clone()).unwrap();
        let mut events = model.subscribe();

        a.set_fetching(true);
        model.pump();
        assert_eq!(model.row_count(), 2);
        assert!(model.is_fetching());
        assert_eq!(
            model.key_at(0).map(|k| k.backend),
            Some(BackendId::new("b"))
        );

        a.replace_packages(vec![DummyPackage::new("five")]);
        a.set_fetching(false);
        model.pump();
        assert_eq!(model.row_count(), 3);
        assert!(!model.is_fetching());

        let rows: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    ModelEvent::RowsInserted { .. } | ModelEvent::RowsRemoved { .. }
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ModelEvent::RowsRemoved {
                    backend: BackendId::new("a"),
                    first: 0,
                    last: 1
                },
                ModelEvent::RowsInserted {
                    backend: BackendId::new("a"),
                    first: 0,
                    last: 0
                },
            ]
        );
        assert_eq!(
            model.resource_at(1).map(|r| r.package_name().to_string()),
            Some("three".to_string())
        );
    }

    #[test]
    fn test_refetch_finished_before_pump_reloads_slice() {
        let mut model = ResourcesModel::default();
        let a = backend("a", &["one", "two"]);
        model.register_backend(a.clone()).unwrap();
        let mut events = model.subscribe();

        a.set_fetching(true);
        a.replace_packages(vec![
            DummyPackage::new("three"),
            DummyPackage::new("four"),
            DummyPackage::new("five"),
        ]);
        a.set_fetching(false);
        model.pump();

        assert_eq!(model.row_count(), 3);
        assert!(!model.is_fetching());
        for row in 0..model.row_count() {
            assert!(model.resource_at(row).is_some(), "row {row} does not resolve");
        }
        let rows: Vec<_> = drain(&mut events)
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    ModelEvent::RowsInserted { .. } | ModelEvent::RowsRemoved { .. }
                )
            })
            .collect();
        assert_eq!(
            rows,
            vec![
                ModelEvent::RowsRemoved {
                    backend: BackendId::new("a"),
                    first: 0,
                    last: 1
                },
                ModelEvent::RowsInserted {
                    backend: BackendId::new("a"),
                    first: 0,
                    last: 2
                },
            ]
        );
    }

    #[test]
    fn test_backend_fetching_at_registration_is_spliced_when_ready() {
        let mut model = ResourcesModel::default();
        let a = backend("a", &["one", "two"]);
        let b = backend("b", &["three", "four", "five"]);
        b.set_fetching(true);
        model.register_backend(a).unwrap();
        model.register_backend(b.clone()).unwrap();
        assert_eq!(model.row_count(), 2);
        assert!(model.is_fetching());
        let mut events = model.subscribe();

        b.set_fetching(false);
        model.pump();

        assert_eq!(model.row_count(), 5);
        assert!(!model.is_fetching());
        let owners: Vec<_> = (0..5)
            .filter_map(|row| model.key_at(row))
            .map(|key| key.backend.to_string())
            .collect();
        assert_eq!(owners, vec!["a", "a", "b", "b", "b"]);
        assert!(drain(&mut events).contains(&ModelEvent::RowsInserted {
            backend: BackendId::new("b"),
            first: 2,
            last: 4
        }));
    }

    #[test]
    fn test_backend_turning_invalid_is_evicted() {
        let mut model = ResourcesModel::default();
        let a = Arc::new(DummyBackend::new(
            "a",
            vec![
                DummyPackage::new("one").state(ResourceState::Upgradeable),
                DummyPackage::new("two"),
            ],
        ));
        let b = Arc::new(DummyBackend::new(
            "b",
            vec![DummyPackage::new("three").state(ResourceState::Upgradeable)],
        ));
        model.register_backend(a.clone()).unwrap();
        model.register_backend(b).unwrap();
        assert_eq!(model.row_count(), 3);
        assert_eq!(model.updates_count(), 2);
        let mut events = model.subscribe();

        a.set_valid(false);
        model.pump();

        assert_eq!(model.row_count(), 1);
        assert_eq!(model.updates_count(), 1);
        assert!(model.backend(&BackendId::new("a")).is_none());
        assert!(model.blacklist().contains(&BackendId::new("a")));
        let seen = drain(&mut events);
        assert!(seen.contains(&ModelEvent::RowsRemoved {
            backend: BackendId::new("a"),
            first: 0,
            last: 1
        }));
        assert!(seen.contains(&ModelEvent::UpdatesCountChanged(1)));

        a.set_valid(true);
        assert!(matches!(
            model.register_backend(a),
            Err(ModelError::Blacklisted(_))
        ));
    }

    #[test]
    fn test_resource_change_is_scoped_to_its_row() {
        let mut model = ResourcesModel::default();
        let a = backend("a", &["one"]);
        let b = backend("b", &["two", "three"]);
        model.register_backend(a).unwrap();
        model.register_backend(b.clone()).unwrap();
        let mut events = model.subscribe();

        let key = b.key_of("three").unwrap();
        b.update_package("three", |p| p.comment = "changed".into());
        model.pump();

        assert_eq!(
            drain(&mut events),
            vec![ModelEvent::ResourceDataChanged {
                key,
                row: Some(2),
                properties: vec![ResourceProperty::Comment],
            }]
        );
    }

    #[test]
    fn test_explicit_removal_drops_one_row() {
        let mut model = ResourcesModel::default();
        let a = backend("a", &["one", "two", "three"]);
        model.register_backend(a.clone()).unwrap();
        let key = a.key_of("two").unwrap();
        a.remove_package("two");
        model.pump();

        assert_eq!(model.row_count(), 2);
        assert!(model.resolve(&key).is_none());
        assert!(model.row_of(&key).is_none());
    }

    #[test]
    fn test_package_name_lookup_prefers_registration_order() {
        let mut model = ResourcesModel::default();
        model.register_backend(backend("a", &["vim"])).unwrap();
        model.register_backend(backend("b", &["vim", "emacs"])).unwrap();

        let vim = model.resource_by_package_name("vim").unwrap();
        assert_eq!(vim.backend_id(), &BackendId::new("a"));
        assert!(model.resource_by_package_name("nano").is_none());
    }

    #[test]
    fn test_current_application_backend_prefers_configuration() {
        let settings = ModelSettings {
            current_application_backend: Some(BackendId::new("b")),
            ..ModelSettings::default()
        };
        let mut model = ResourcesModel::new(settings);
        let a = backend("a", &["one"]);
        a.set_has_applications(true);
        model.register_backend(a).unwrap();
        assert_eq!(model.current_application_backend(), Some(&BackendId::new("a")));

        model.register_backend(backend("b", &["two"])).unwrap();
        assert_eq!(model.current_application_backend(), Some(&BackendId::new("b")));
    }

    #[test]
    fn test_redundant_fetching_notification_is_ignored() {
        let mut model = ResourcesModel::default();
        let a = backend("a", &["one"]);
        model.register_backend(a.clone()).unwrap();
        let mut events = model.subscribe();

        model.handle_backend_event(BackendMessage {
            backend: BackendId::new("a"),
            event: BackendEvent::FetchingChanged(false),
        });
        assert!(drain(&mut events).is_empty());
        assert_eq!(model.row_count(), 1);
    }
}
