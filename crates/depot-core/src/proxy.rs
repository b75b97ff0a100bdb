//! Filtered, sorted view over a [`ResourcesModel`].
//!
//! A filter change throws the whole view away and re-runs the search; rows
//! come back batch by batch as the backends answer. The proxy never reads
//! the aggregate rows directly: everything it shows came out of a search
//! stream or out of a change notification that made a resource match.

use crate::filters::Filters;
use crate::model::{ModelEvent, ResourcesModel};
use crate::resource::Resource;
use crate::signal::Subscribers;
use crate::stream::{AggregatedResultsStream, StreamResult};
use crate::transaction::{TransactionEvent, TransactionModel};
use depot_schema::{BackendId, Category, ResourceKey, ResourceProperty, ResourceState};
use futures::{FutureExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Key rows are ordered by when no search text is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortRole {
    /// Display name, case-insensitive.
    ///
    /// Names are compared by their lowercase form, code point by code point.
    /// No locale collation is applied, so accented letters sort after `z`.
    #[default]
    Name,
    /// Size in bytes.
    Size,
    /// Weighted rating.
    Rating,
    /// Installation state.
    State,
    /// Origin name.
    Origin,
}

impl SortRole {
    fn property(self) -> ResourceProperty {
        match self {
            Self::Name => ResourceProperty::Name,
            Self::Size => ResourceProperty::Size,
            Self::Rating => ResourceProperty::Rating,
            Self::State => ResourceProperty::State,
            Self::Origin => ResourceProperty::Origin,
        }
    }
}

impl FromStr for SortRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "size" => Ok(Self::Size),
            "rating" => Ok(Self::Rating),
            "state" => Ok(Self::State),
            "origin" => Ok(Self::Origin),
            other => Err(format!("unknown sort role '{other}'")),
        }
    }
}

impl fmt::Display for SortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Name => "name",
            Self::Size => "size",
            Self::Rating => "rating",
            Self::State => "state",
            Self::Origin => "origin",
        };
        f.write_str(name)
    }
}

/// Direction of the sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// Notifications published by the [`ResourcesProxyModel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyEvent {
    /// Every row may have changed; re-read the whole view.
    ModelReset,
    /// Rows `first..=last` were inserted.
    RowsInserted {
        /// First inserted row.
        first: usize,
        /// Last inserted row.
        last: usize,
    },
    /// Rows `first..=last` were removed.
    RowsRemoved {
        /// First removed row.
        first: usize,
        /// Last removed row.
        last: usize,
    },
    /// Rows `first..=last` changed. Empty `properties` means all of them.
    DataChanged {
        /// First changed row.
        first: usize,
        /// Last changed row.
        last: usize,
        /// Changed properties.
        properties: Vec<ResourceProperty>,
    },
    /// A search started or finished.
    BusyChanged(bool),
    /// The effective search text changed.
    SearchChanged(String),
}

#[derive(Debug, Clone)]
struct DisplayedResult {
    key: ResourceKey,
    rank: u32,
    priority: usize,
    name_key: String,
    size: u64,
    rating: f64,
    state: ResourceState,
    origin: String,
    appstream_id: Option<String>,
}

impl DisplayedResult {
    fn new(resource: &dyn Resource, rank: u32, priority: usize) -> Self {
        let mut entry = Self {
            key: resource.key(),
            rank,
            priority,
            name_key: String::new(),
            size: 0,
            rating: 0.0,
            state: ResourceState::Broken,
            origin: String::new(),
            appstream_id: None,
        };
        entry.refresh(resource);
        entry
    }

    fn refresh(&mut self, resource: &dyn Resource) {
        self.name_key = resource.name().to_lowercase();
        self.size = resource.size();
        self.rating = resource.rating().map_or(0.0, |r| r.sortable());
        self.state = resource.state();
        self.origin = resource.origin().to_string();
        self.appstream_id = resource.appstream_id().map(str::to_string);
    }
}

#[derive(Debug, Clone, Copy)]
struct SortSpec {
    role: SortRole,
    order: SortOrder,
    relevancy: bool,
}

impl SortSpec {
    fn compare(self, a: &DisplayedResult, b: &DisplayedResult) -> Ordering {
        if self.relevancy {
            return (a.priority, a.rank).cmp(&(b.priority, b.rank));
        }
        let by_name = a.name_key.cmp(&b.name_key);
        let primary = match self.role {
            SortRole::Name => by_name,
            SortRole::Size => a.size.cmp(&b.size),
            SortRole::Rating => a.rating.total_cmp(&b.rating),
            SortRole::State => a.state.cmp(&b.state),
            SortRole::Origin => a.origin.cmp(&b.origin),
        };
        let primary = match self.order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        if self.role == SortRole::Name {
            primary
        } else {
            primary.then(by_name)
        }
    }
}

/// Filtered, sorted view over the aggregate.
#[derive(Debug)]
pub struct ResourcesProxyModel {
    filters: Filters,
    sort_role: SortRole,
    sort_order: SortOrder,
    displayed: Vec<DisplayedResult>,
    stream: Option<AggregatedResultsStream>,
    stale: bool,
    busy: bool,
    model_events: mpsc::UnboundedReceiver<ModelEvent>,
    transaction_events: Option<mpsc::UnboundedReceiver<TransactionEvent>>,
    subscribers: Subscribers<ProxyEvent>,
}

impl ResourcesProxyModel {
    /// Create an empty view listening to `model`.
    pub fn new(model: &mut ResourcesModel) -> Self {
        Self {
            filters: Filters::default(),
            sort_role: SortRole::default(),
            sort_order: SortOrder::default(),
            displayed: Vec::new(),
            stream: None,
            stale: false,
            busy: false,
            model_events: model.subscribe(),
            transaction_events: None,
            subscribers: Subscribers::new(),
        }
    }

    /// Also refresh rows when their transactions progress.
    pub fn follow_transactions(&mut self, transactions: &mut TransactionModel) {
        self.transaction_events = Some(transactions.subscribe());
    }

    /// Listen to [`ProxyEvent`]s.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ProxyEvent> {
        self.subscribers.subscribe()
    }

    /// Active filters.
    pub fn filters(&self) -> &Filters {
        &self.filters
    }

    /// Active sort role.
    pub fn sort_role(&self) -> SortRole {
        self.sort_role
    }

    /// Active sort order.
    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Rows follow backend relevance while a search text is active.
    pub fn sort_by_relevancy(&self) -> bool {
        !self.filters.search.is_empty()
    }

    /// Replace every filter at once.
    pub fn set_filters(&mut self, filters: Filters) {
        self.update_filters(|current| *current = filters);
    }

    /// Set the search text. One character or less counts as no search.
    pub fn set_search(&mut self, text: &str) {
        let text = text.trim();
        let text = if text.chars().count() <= 1 { "" } else { text };
        self.update_filters(|f| text.clone_into(&mut f.search));
    }

    /// Set the state threshold.
    pub fn set_state_filter(&mut self, state: ResourceState) {
        self.update_filters(|f| f.state = state);
    }

    /// Choose between minimum and exact state matching.
    pub fn set_filter_minimum_state(&mut self, minimum: bool) {
        self.update_filters(|f| f.filter_minimum_state = minimum);
    }

    /// Only show resources from `origin`.
    pub fn set_origin_filter(&mut self, origin: &str) {
        self.update_filters(|f| origin.clone_into(&mut f.origin));
    }

    /// Only show applications handling `mimetype`.
    pub fn set_mime_type_filter(&mut self, mimetype: &str) {
        self.update_filters(|f| mimetype.clone_into(&mut f.mimetype));
    }

    /// Only show addons of `package_name`.
    pub fn set_extends(&mut self, package_name: &str) {
        self.update_filters(|f| package_name.clone_into(&mut f.extends));
    }

    /// Only show members of `category`.
    pub fn set_category(&mut self, category: Option<Category>) {
        self.update_filters(|f| f.category = category);
    }

    /// Only query one backend.
    pub fn set_backend_filter(&mut self, backend: Option<BackendId>) {
        self.update_filters(|f| f.backend = backend);
    }

    /// Show every backend's copy of an application.
    pub fn set_all_backends(&mut self, all_backends: bool) {
        self.update_filters(|f| f.all_backends = all_backends);
    }

    /// Look up one resource by url.
    pub fn set_resource_url(&mut self, url: Option<String>) {
        self.update_filters(|f| f.resource_url = url);
    }

    /// Change the sort role. Re-sorts in place.
    pub fn set_sort_role(&mut self, role: SortRole) {
        if self.sort_role != role {
            self.sort_role = role;
            self.resort();
        }
    }

    /// Change the sort order. Re-sorts in place.
    pub fn set_sort_order(&mut self, order: SortOrder) {
        if self.sort_order != order {
            self.sort_order = order;
            self.resort();
        }
    }

    /// Throw the view away and start the search for the current filters.
    pub fn invalidate_filter(&mut self, model: &ResourcesModel) {
        self.clear_rows();
        tracing::debug!(filters = ?self.filters, "Re-running proxy search");
        self.stream = Some(model.search(&self.filters));
        self.stale = false;
        self.set_busy(true);
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.displayed.len()
    }

    /// Key shown at `row`.
    pub fn key_at(&self, row: usize) -> Option<&ResourceKey> {
        self.displayed.get(row).map(|d| &d.key)
    }

    /// Keys of every row, in display order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.displayed.iter().map(|d| &d.key)
    }

    /// Resource shown at `row`.
    pub fn resource_at(&self, model: &ResourcesModel, row: usize) -> Option<Arc<dyn Resource>> {
        self.key_at(row).and_then(|key| model.resolve(key))
    }

    /// Row of a resource.
    pub fn index_of(&self, key: &ResourceKey) -> Option<usize> {
        self.displayed.iter().position(|d| d.key == *key)
    }

    /// `true` while a search is pending or running.
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Apply the next batch of search results.
    ///
    /// Starts the search first if filters changed since the last one.
    /// Returns `false` once the search is over.
    pub async fn next_batch(&mut self, model: &ResourcesModel) -> bool {
        if self.stale {
            self.invalidate_filter(model);
        }
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };
        if let Some(batch) = stream.next().await {
            self.add_results(model, batch);
            return true;
        }
        self.stream = None;
        tracing::debug!(rows = self.displayed.len(), "Proxy search finished");
        self.set_busy(false);
        false
    }

    /// Apply every batch that is already available. Returns how many were applied.
    pub fn poll_results(&mut self, model: &ResourcesModel) -> usize {
        let mut applied = 0;
        while let Some(true) = self.next_batch(model).now_or_never() {
            applied += 1;
        }
        applied
    }

    /// Apply batches until the search is over.
    pub async fn wait_for_results(&mut self, model: &ResourcesModel) {
        while self.next_batch(model).await {}
    }

    /// React to every model and transaction event already waiting.
    /// Returns how many were handled.
    pub fn process_events(&mut self, model: &ResourcesModel) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.model_events.try_recv() {
            self.handle_model_event(model, event);
            handled += 1;
        }
        while let Some(event) = self
            .transaction_events
            .as_mut()
            .and_then(|rx| rx.try_recv().ok())
        {
            self.handle_transaction_event(&event);
            handled += 1;
        }
        handled
    }

    fn handle_model_event(&mut self, model: &ResourcesModel, event: ModelEvent) {
        match event {
            ModelEvent::BackendFetchingChanged {
                backend,
                fetching: true,
            } => self.remove_backend_rows(&backend),
            ModelEvent::BackendReloaded(_)
            | ModelEvent::BackendsChanged
            | ModelEvent::CurrentApplicationBackendChanged(_) => {
                if !self.filters.is_empty() || self.stream.is_some() {
                    self.invalidate_filter(model);
                }
            }
            ModelEvent::ResourceDataChanged {
                key, properties, ..
            } => self.refresh_resource(model, &key, &properties),
            ModelEvent::ResourceRemoved { key } => {
                if let Some(row) = self.index_of(&key) {
                    self.remove_row(row);
                }
            }
            ModelEvent::BackendDataChanged {
                backend,
                properties,
            } => self.refresh_backend(model, &backend, &properties),
            _ => {}
        }
    }

    fn handle_transaction_event(&mut self, event: &TransactionEvent) {
        let row = event.resource().and_then(|key| self.index_of(key));
        if let Some(row) = row {
            self.emit(ProxyEvent::DataChanged {
                first: row,
                last: row,
                properties: vec![ResourceProperty::Transaction],
            });
        }
    }

    fn update_filters(&mut self, change: impl FnOnce(&mut Filters)) {
        let mut filters = self.filters.clone();
        change(&mut filters);
        if filters.search.chars().count() <= 1 {
            filters.search.clear();
        }
        if filters == self.filters {
            return;
        }
        let search_changed = filters.search != self.filters.search;
        self.filters = filters;
        if search_changed {
            self.emit(ProxyEvent::SearchChanged(self.filters.search.clone()));
        }
        self.stream = None;
        self.clear_rows();
        self.stale = true;
        self.set_busy(true);
    }

    fn sort_spec(&self) -> SortSpec {
        SortSpec {
            role: self.sort_role,
            order: self.sort_order,
            relevancy: self.sort_by_relevancy(),
        }
    }

    fn passes(&self, resource: &dyn Resource) -> bool {
        self.filters.includes_backend(resource.backend_id()) && self.filters.matches(resource)
    }

    fn add_results(&mut self, model: &ResourcesModel, batch: Vec<StreamResult>) {
        for result in batch {
            if self.index_of(&result.key).is_some() {
                continue;
            }
            let Some(resource) = model.resolve(&result.key) else {
                tracing::debug!(key = %result.key, "Search result no longer resolves");
                continue;
            };
            if !self.passes(resource.as_ref()) {
                continue;
            }
            let Some(priority) = model.backend_priority(&result.key.backend) else {
                continue;
            };
            self.add_entry(
                model,
                DisplayedResult::new(resource.as_ref(), result.rank, priority),
            );
        }
    }

    fn add_entry(&mut self, model: &ResourcesModel, entry: DisplayedResult) {
        let Some(existing) = self.duplicate_of(&entry) else {
            self.insert_sorted(entry);
            return;
        };
        let preferred = model.current_application_backend();
        if preferred == Some(&entry.key.backend) && self.displayed[existing].key.backend != entry.key.backend {
            tracing::debug!(key = %entry.key, "Preferring the current application backend's copy");
            // The copies may sort differently, so the winner is placed anew.
            self.remove_row(existing);
            self.insert_sorted(entry);
        }
    }

    fn duplicate_of(&self, entry: &DisplayedResult) -> Option<usize> {
        if self.filters.all_backends {
            return None;
        }
        let appstream_id = entry.appstream_id.as_deref()?;
        self.displayed
            .iter()
            .position(|d| d.appstream_id.as_deref() == Some(appstream_id))
    }

    fn insert_sorted(&mut self, entry: DisplayedResult) -> usize {
        let spec = self.sort_spec();
        let row = self
            .displayed
            .iter()
            .position(|d| spec.compare(&entry, d) == Ordering::Less)
            .unwrap_or(self.displayed.len());
        self.displayed.insert(row, entry);
        self.emit(ProxyEvent::RowsInserted {
            first: row,
            last: row,
        });
        row
    }

    fn remove_row(&mut self, row: usize) -> DisplayedResult {
        let entry = self.displayed.remove(row);
        self.emit(ProxyEvent::RowsRemoved {
            first: row,
            last: row,
        });
        entry
    }

    fn remove_backend_rows(&mut self, backend: &BackendId) {
        let mut row = self.displayed.len();
        while row > 0 {
            row -= 1;
            if self.displayed[row].key.backend == *backend {
                self.remove_row(row);
            }
        }
    }

    fn clear_rows(&mut self) {
        if !self.displayed.is_empty() {
            self.displayed.clear();
            self.emit(ProxyEvent::ModelReset);
        }
    }

    fn resort(&mut self) {
        let spec = self.sort_spec();
        self.displayed.sort_by(|a, b| spec.compare(a, b));
        self.emit(ProxyEvent::ModelReset);
    }

    fn affects_sort(&self, properties: &[ResourceProperty]) -> bool {
        if self.sort_by_relevancy() {
            return false;
        }
        properties
            .iter()
            .any(|p| *p == ResourceProperty::Name || *p == self.sort_role.property())
    }

    /// Re-test one resource against the filters after it changed.
    fn refresh_resource(
        &mut self,
        model: &ResourcesModel,
        key: &ResourceKey,
        properties: &[ResourceProperty],
    ) {
        let resource = model.resolve(key);
        match (self.index_of(key), resource) {
            (Some(row), None) => {
                self.remove_row(row);
            }
            (Some(row), Some(resource)) => {
                if !self.passes(resource.as_ref()) {
                    self.remove_row(row);
                } else if self.affects_sort(properties) {
                    let mut entry = self.remove_row(row);
                    entry.refresh(resource.as_ref());
                    self.insert_sorted(entry);
                } else {
                    self.displayed[row].refresh(resource.as_ref());
                    self.emit(ProxyEvent::DataChanged {
                        first: row,
                        last: row,
                        properties: properties.to_vec(),
                    });
                }
            }
            (None, Some(resource)) => {
                let newly_matching = !self.filters.is_empty()
                    && self.passes(resource.as_ref())
                    && self.filters.matches_search(resource.as_ref());
                if !newly_matching {
                    return;
                }
                let Some(priority) = model.backend_priority(&key.backend) else {
                    return;
                };
                tracing::debug!(%key, "Resource now matches the filters");
                self.add_entry(model, DisplayedResult::new(resource.as_ref(), u32::MAX, priority));
            }
            (None, None) => {}
        }
    }

    fn refresh_backend(
        &mut self,
        model: &ResourcesModel,
        backend: &BackendId,
        properties: &[ResourceProperty],
    ) {
        let mut touched = false;
        for entry in self.displayed.iter_mut().filter(|d| d.key.backend == *backend) {
            if let Some(resource) = model.resolve(&entry.key) {
                entry.refresh(resource.as_ref());
                touched = true;
            }
        }
        if !touched {
            return;
        }
        if self.affects_sort(properties) {
            self.resort();
        } else {
            self.emit(ProxyEvent::DataChanged {
                first: 0,
                last: self.displayed.len() - 1,
                properties: properties.to_vec(),
            });
        }
    }

    fn set_busy(&mut self, busy: bool) {
        if self.busy != busy {
            self.busy = busy;
            self.emit(ProxyEvent::BusyChanged(busy));
        }
    }

    fn emit(&mut self, event: ProxyEvent) {
        self.subscribers.emit(&event);
    }
}
