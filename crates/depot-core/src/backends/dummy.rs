//! In-memory backend.
//!
//! Packages come from the configuration (or from code, in tests) and
//! transactions are scripted: a driver walks the status machine and applies
//! the change to the stored snapshot when it commits. Useful for demos and
//! as the reference implementation of the backend contract.

use crate::backend::{BackendEvent, BackendNotifier, BackendUpdater, ResourcesBackend};
use crate::config::BackendSettings;
use crate::error::{BackendError, ResourceError};
use crate::filters::Filters;
use crate::registry::BackendFactory;
use crate::resource::{Resource, ResourceArena};
use crate::reviews::{ReviewsBackend, StaticReviews};
use crate::stream::{ResultsStream, StreamResult};
use crate::transaction::{Transaction, TransactionDriver, TransactionHandle, TransactionUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use depot_schema::{
    AddonList, BackendId, Icon, PackageState, Rating, ResourceId, ResourceKey, ResourceProperty,
    ResourceState, ResourceType, TransactionRole, TransactionStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// Factory kind of the in-memory backend.
pub const DUMMY_KIND: &str = "dummy";

/// Search results are delivered in batches of this size.
const SEARCH_BATCH: usize = 16;

/// Description of one in-memory package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyPackage {
    /// Unique package name.
    pub package_name: String,
    /// Display name; the package name when left empty.
    pub name: String,
    /// One-line summary.
    pub comment: String,
    /// Long description.
    pub long_description: String,
    /// Cross-backend component id.
    pub appstream_id: Option<String>,
    /// Declared categories.
    pub categories: Vec<String>,
    /// Archive section.
    pub section: String,
    /// Repository name.
    pub origin: String,
    /// License expression.
    pub license: String,
    /// Size in bytes.
    pub size: u64,
    /// Installation state.
    pub state: ResourceState,
    /// Installed version.
    pub installed_version: Option<String>,
    /// Newest version.
    pub available_version: Option<String>,
    /// Resource kind.
    pub kind: ResourceType,
    /// Handled mime types.
    pub mimetypes: Vec<String>,
    /// Shipped executables.
    pub executables: Vec<String>,
    /// Packages this one is an addon for.
    pub extends: Vec<String>,
    /// Addons offered for this package.
    pub addons: Vec<PackageState>,
}

impl Default for DummyPackage {
    fn default() -> Self {
        Self {
            package_name: String::new(),
            name: String::new(),
            comment: String::new(),
            long_description: String::new(),
            appstream_id: None,
            categories: Vec::new(),
            section: "misc".to_string(),
            origin: "dummy".to_string(),
            license: "GPL-3.0-or-later".to_string(),
            size: 1024,
            state: ResourceState::None,
            installed_version: None,
            available_version: Some("1.0".to_string()),
            kind: ResourceType::Application,
            mimetypes: Vec::new(),
            executables: Vec::new(),
            extends: Vec::new(),
            addons: Vec::new(),
        }
    }
}

impl DummyPackage {
    /// An available application named after its package.
    pub fn new(package_name: impl Into<String>) -> Self {
        let package_name = package_name.into();
        Self {
            name: package_name.clone(),
            package_name,
            ..Self::default()
        }
    }

    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the summary.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Set the state. Installed states get an installed version.
    pub fn state(mut self, state: ResourceState) -> Self {
        self.state = state;
        if state >= ResourceState::Installed && self.installed_version.is_none() {
            self.installed_version = match state {
                ResourceState::Upgradeable => Some("0.9".to_string()),
                _ => self.available_version.clone(),
            };
        }
        self
    }

    /// Set the origin.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Set the section.
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Set the size in bytes.
    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the appstream id.
    pub fn appstream(mut self, id: impl Into<String>) -> Self {
        self.appstream_id = Some(id.into());
        self
    }

    /// Add a category.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    /// Set the resource kind.
    pub fn kind(mut self, kind: ResourceType) -> Self {
        self.kind = kind;
        self
    }

    /// Add a handled mime type.
    pub fn mimetype(mut self, mimetype: impl Into<String>) -> Self {
        self.mimetypes.push(mimetype.into());
        self
    }

    /// Mark this package as an addon of `package_name`.
    pub fn extends(mut self, package_name: impl Into<String>) -> Self {
        self.extends.push(package_name.into());
        self
    }

    /// Offer an addon.
    pub fn addon(mut self, package_name: impl Into<String>, name: impl Into<String>) -> Self {
        self.addons
            .push(PackageState::new(package_name, name, String::new(), false));
        self
    }

    fn normalized(mut self) -> Self {
        if self.name.is_empty() {
            self.name.clone_from(&self.package_name);
        }
        self
    }

    fn apply_addons(&mut self, addons: &AddonList) {
        for addon in &mut self.addons {
            if addons.to_install.contains(&addon.package_name) {
                addon.installed = true;
            }
            if addons.to_remove.contains(&addon.package_name) {
                addon.installed = false;
            }
        }
    }
}

fn changed_properties(old: &DummyPackage, new: &DummyPackage) -> Vec<ResourceProperty> {
    let mut changed = Vec::new();
    let mut check = |differs: bool, property: ResourceProperty| {
        if differs {
            changed.push(property);
        }
    };
    check(old.name != new.name, ResourceProperty::Name);
    check(old.comment != new.comment, ResourceProperty::Comment);
    check(old.state != new.state, ResourceProperty::State);
    check(old.size != new.size, ResourceProperty::Size);
    check(old.license != new.license, ResourceProperty::License);
    check(
        old.installed_version != new.installed_version,
        ResourceProperty::InstalledVersion,
    );
    check(
        old.available_version != new.available_version,
        ResourceProperty::AvailableVersion,
    );
    check(
        old.long_description != new.long_description,
        ResourceProperty::LongDescription,
    );
    check(old.origin != new.origin, ResourceProperty::Origin);
    check(old.categories != new.categories, ResourceProperty::Categories);
    check(old.addons != new.addons, ResourceProperty::Addons);
    changed
}

/// Snapshot of one in-memory package.
#[derive(Debug, Clone)]
pub struct DummyResource {
    backend: BackendId,
    id: ResourceId,
    package: DummyPackage,
    rating: Option<Rating>,
}

impl DummyResource {
    /// Wrap `package` as resource `id` of `backend`.
    pub fn new(backend: BackendId, id: ResourceId, package: DummyPackage) -> Self {
        Self {
            backend,
            id,
            package: package.normalized(),
            rating: None,
        }
    }

    /// Attach a rating.
    pub fn with_rating(mut self, rating: Option<Rating>) -> Self {
        self.rating = rating;
        self
    }

    /// The package description behind this snapshot.
    pub fn package(&self) -> &DummyPackage {
        &self.package
    }
}

impl Resource for DummyResource {
    fn id(&self) -> ResourceId {
        self.id
    }

    fn backend_id(&self) -> &BackendId {
        &self.backend
    }

    fn package_name(&self) -> &str {
        &self.package.package_name
    }

    fn appstream_id(&self) -> Option<&str> {
        self.package.appstream_id.as_deref()
    }

    fn name(&self) -> &str {
        &self.package.name
    }

    fn comment(&self) -> &str {
        &self.package.comment
    }

    fn long_description(&self) -> &str {
        if self.package.long_description.is_empty() {
            &self.package.comment
        } else {
            &self.package.long_description
        }
    }

    fn icon(&self) -> Icon {
        match &self.package.appstream_id {
            Some(id) => Icon::Theme(id.clone()),
            None => Icon::default(),
        }
    }

    fn categories(&self) -> &[String] {
        &self.package.categories
    }

    fn state(&self) -> ResourceState {
        self.package.state
    }

    fn size(&self) -> u64 {
        self.package.size
    }

    fn license(&self) -> &str {
        &self.package.license
    }

    fn installed_version(&self) -> Option<&str> {
        self.package.installed_version.as_deref()
    }

    fn available_version(&self) -> Option<&str> {
        self.package.available_version.as_deref()
    }

    fn origin(&self) -> &str {
        &self.package.origin
    }

    fn section(&self) -> &str {
        &self.package.section
    }

    fn resource_type(&self) -> ResourceType {
        self.package.kind
    }

    fn mimetypes(&self) -> &[String] {
        &self.package.mimetypes
    }

    fn executables(&self) -> &[String] {
        &self.package.executables
    }

    fn extends(&self) -> &[String] {
        &self.package.extends
    }

    fn can_execute(&self) -> bool {
        self.is_installed() && !self.package.executables.is_empty()
    }

    fn invoke_application(&self) -> Result<(), ResourceError> {
        if !self.is_installed() {
            return Err(ResourceError::NotInstalled(self.package.name.clone()));
        }
        let Some(executable) = self.package.executables.first() else {
            return Err(ResourceError::NotExecutable(self.package.name.clone()));
        };
        let mut child = std::process::Command::new(executable)
            .spawn()
            .map_err(|source| ResourceError::Launch {
                name: self.package.name.clone(),
                source,
            })?;
        tracing::debug!(%executable, pid = child.id(), "Launched application");
        // The launched application outlives this call; reap it once it exits.
        let executable = executable.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) => tracing::debug!(%executable, %status, "Application exited"),
            Err(error) => tracing::warn!(%executable, %error, "Failed to wait for application"),
        });
        Ok(())
    }

    fn addons_information(&self) -> Vec<PackageState> {
        self.package.addons.clone()
    }

    fn rating(&self) -> Option<Rating> {
        self.rating
    }
}

/// Options accepted in a `kind = "dummy"` backend table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyOptions {
    /// Packages served.
    pub packages: Vec<DummyPackage>,
    /// Simulated initial fetch, in milliseconds.
    pub fetch_delay_ms: u64,
    /// Pause between transaction steps, in milliseconds.
    pub step_delay_ms: u64,
    /// Transactions on these packages fail.
    pub fail_packages: Vec<String>,
    /// Transactions wait for the caller to drive them.
    pub manual_transactions: bool,
    /// Whether the backend offers applications.
    pub has_applications: bool,
    /// Whether pending updates include security fixes.
    pub security_updates: bool,
    /// Initialization outcome.
    pub valid: bool,
    /// Ratings keyed by package name.
    pub ratings: HashMap<String, Rating>,
}

impl Default for DummyOptions {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            fetch_delay_ms: 0,
            step_delay_ms: 0,
            fail_packages: Vec::new(),
            manual_transactions: false,
            has_applications: false,
            security_updates: false,
            valid: true,
            ratings: HashMap::new(),
        }
    }
}

#[derive(Debug, Default)]
struct DummyState {
    arena: ResourceArena<DummyResource>,
    valid: bool,
    fetching: bool,
    has_applications: bool,
    upgrading: bool,
    reviews: Option<Arc<dyn ReviewsBackend>>,
}

#[derive(Debug)]
struct Shared {
    id: BackendId,
    state: RwLock<DummyState>,
    notifier: Mutex<Option<BackendNotifier>>,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, DummyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, DummyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, send: impl FnOnce(&BackendNotifier) -> bool) {
        let notifier = self.notifier.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(notifier) = notifier.as_ref() {
            send(notifier);
        }
    }

    fn find(&self, package_name: &str) -> Option<Arc<DummyResource>> {
        self.read()
            .arena
            .iter()
            .find(|r| r.package.package_name == package_name)
            .cloned()
    }

    fn load(&self, packages: Vec<DummyPackage>) {
        let mut state = self.write();
        state.arena.clear();
        let reviews = state.reviews.clone();
        for package in packages {
            let rating = reviews
                .as_ref()
                .and_then(|r| r.rating_for(&package.package_name));
            state.arena.insert_with(|id| {
                DummyResource::new(self.id.clone(), id, package).with_rating(rating)
            });
        }
    }

    /// Rewrite one package and report what changed.
    fn update(
        &self,
        id: ResourceId,
        change: impl FnOnce(&mut DummyPackage),
    ) -> Vec<ResourceProperty> {
        let properties = {
            let mut state = self.write();
            let Some(current) = state.arena.get(id).cloned() else {
                return Vec::new();
            };
            let mut package = current.package.clone();
            change(&mut package);
            let properties = changed_properties(&current.package, &package);
            if properties.is_empty() {
                return properties;
            }
            let next = DummyResource {
                package,
                ..(*current).clone()
            };
            state.arena.replace(id, next);
            properties
        };
        self.notify(|n| n.resource_changed(id, &properties));
        properties
    }

    fn upgradeable(&self) -> Vec<ResourceId> {
        self.read()
            .arena
            .iter()
            .filter(|r| r.package.state == ResourceState::Upgradeable)
            .map(|r| r.id)
            .collect()
    }
}

/// What a scripted transaction changes once it commits.
#[derive(Debug, Clone)]
enum Work {
    Install {
        resource: ResourceId,
        addons: AddonList,
    },
    Remove {
        resource: ResourceId,
    },
    ChangeAddons {
        resource: ResourceId,
        addons: AddonList,
    },
    Upgrade(Vec<ResourceId>),
}

impl Work {
    fn role(&self) -> TransactionRole {
        match self {
            Self::Install { .. } | Self::Upgrade(_) => TransactionRole::Install,
            Self::Remove { .. } => TransactionRole::Remove,
            Self::ChangeAddons { .. } => TransactionRole::ChangeAddons,
        }
    }

    fn apply(&self, shared: &Shared) {
        match self {
            Self::Install { resource, addons } => {
                shared.update(*resource, |p| {
                    p.state = ResourceState::Installed;
                    p.installed_version.clone_from(&p.available_version);
                    p.apply_addons(addons);
                });
            }
            Self::Remove { resource } => {
                shared.update(*resource, |p| {
                    p.state = ResourceState::None;
                    p.installed_version = None;
                    for addon in &mut p.addons {
                        addon.installed = false;
                    }
                });
            }
            Self::ChangeAddons { resource, addons } => {
                shared.update(*resource, |p| p.apply_addons(addons));
            }
            Self::Upgrade(resources) => {
                for resource in resources {
                    shared.update(*resource, |p| {
                        if p.state == ResourceState::Upgradeable {
                            p.state = ResourceState::Installed;
                            p.installed_version.clone_from(&p.available_version);
                        }
                    });
                }
                shared.notify(BackendNotifier::updates_count_changed);
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Script {
    shared: Arc<Shared>,
    work: Work,
    failure: Option<String>,
    step_delay: Duration,
    cancelled: Arc<AtomicBool>,
}

impl Script {
    fn steps(&self) -> Vec<TransactionUpdate> {
        let mut steps = Vec::new();
        if self.work.role().fetches_artifacts() {
            steps.push(TransactionUpdate::Status(TransactionStatus::Downloading));
            steps.push(TransactionUpdate::Progress(25));
            steps.push(TransactionUpdate::Progress(50));
        }
        steps.push(TransactionUpdate::Cancellable(false));
        steps.push(TransactionUpdate::Status(TransactionStatus::Committing));
        steps.push(TransactionUpdate::Progress(75));
        steps
    }

    fn is_cancelled(&self, handle: &TransactionHandle) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            handle.set_status(TransactionStatus::Cancelled);
            self.settle();
            return true;
        }
        false
    }

    fn finish(&self, handle: &TransactionHandle) {
        if let Some(message) = &self.failure {
            handle.fail(message.clone());
        } else {
            self.work.apply(&self.shared);
            handle.set_progress(100);
            handle.set_status(TransactionStatus::Done);
        }
        self.settle();
    }

    fn settle(&self) {
        if matches!(self.work, Work::Upgrade(_)) {
            self.shared.write().upgrading = false;
        }
    }

    fn run_inline(&self, handle: &TransactionHandle) {
        for step in self.steps() {
            if self.is_cancelled(handle) {
                return;
            }
            handle.send(step);
        }
        self.finish(handle);
    }

    async fn run(self, handle: TransactionHandle) {
        for step in self.steps() {
            tokio::time::sleep(self.step_delay).await;
            if self.is_cancelled(&handle) {
                return;
            }
            if !handle.send(step) {
                return;
            }
        }
        tokio::time::sleep(self.step_delay).await;
        if self.is_cancelled(&handle) {
            return;
        }
        self.finish(&handle);
    }
}

/// Record of transactions left for the caller to drive.
#[derive(Debug, Default)]
struct ManualLog {
    handles: Mutex<Vec<TransactionHandle>>,
    cancel_requests: AtomicUsize,
}

/// Driver of in-memory transactions.
#[derive(Debug)]
enum DummyDriver {
    Scripted(Script),
    Manual(Arc<ManualLog>),
}

impl TransactionDriver for DummyDriver {
    fn start(&mut self, handle: TransactionHandle) {
        match self {
            Self::Scripted(script) => {
                let script = script.clone();
                if script.step_delay.is_zero() {
                    script.run_inline(&handle);
                    return;
                }
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(script.run(handle));
                    }
                    Err(_) => script.run_inline(&handle),
                }
            }
            Self::Manual(log) => {
                log.handles
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(handle);
            }
        }
    }

    fn cancel(&mut self) {
        match self {
            Self::Scripted(script) => script.cancelled.store(true, Ordering::SeqCst),
            Self::Manual(log) => {
                log.cancel_requests.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Builds drivers for the backend and its updater.
#[derive(Debug, Clone)]
struct Runner {
    shared: Arc<Shared>,
    step_delay: Duration,
    fail_packages: Vec<String>,
    manual: Option<Arc<ManualLog>>,
}

impl Runner {
    fn driver(&self, work: Work, package_names: &[&str]) -> DummyDriver {
        if let Some(log) = &self.manual {
            return DummyDriver::Manual(log.clone());
        }
        let failure = package_names
            .iter()
            .find(|name| self.fail_packages.iter().any(|f| f == *name))
            .map(|name| format!("Simulated failure while processing {name}"));
        DummyDriver::Scripted(Script {
            shared: self.shared.clone(),
            work,
            failure,
            step_delay: self.step_delay,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }
}

/// Upgrades every upgradeable package of a [`DummyBackend`].
#[derive(Debug)]
pub struct DummyUpdater {
    runner: Runner,
    selected: Mutex<Vec<ResourceId>>,
    last_update: Mutex<Option<DateTime<Utc>>>,
}

impl DummyUpdater {
    fn new(runner: Runner) -> Self {
        Self {
            runner,
            selected: Mutex::new(Vec::new()),
            last_update: Mutex::new(None),
        }
    }

    fn selected(&self) -> Vec<ResourceId> {
        self.selected
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BackendUpdater for DummyUpdater {
    fn prepare(&self) {
        let upgradeable = self.runner.shared.upgradeable();
        tracing::debug!(backend = %self.runner.shared.id, count = upgradeable.len(), "Prepared update");
        *self.selected.lock().unwrap_or_else(PoisonError::into_inner) = upgradeable;
        *self
            .last_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
    }

    fn start(&self) -> Result<Option<Transaction>, BackendError> {
        let selected = self.selected();
        if selected.is_empty() {
            return Ok(None);
        }
        let shared = &self.runner.shared;
        {
            let mut state = shared.write();
            if state.upgrading {
                return Err(BackendError::Other(format!(
                    "An update is already running on '{}'",
                    shared.id
                )));
            }
            state.upgrading = true;
        }

        let names: Vec<String> = {
            let state = shared.read();
            selected
                .iter()
                .filter_map(|id| state.arena.get(*id))
                .map(|r| r.package.package_name.clone())
                .collect()
        };
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let driver = self.runner.driver(Work::Upgrade(selected), &names);
        Ok(Some(Transaction::new(
            shared.id.clone(),
            None,
            format!("Update {} packages", names.len()),
            TransactionRole::Install,
            driver,
        )))
    }

    fn is_progressing(&self) -> bool {
        self.runner.shared.read().upgrading
    }

    fn to_update(&self) -> Vec<ResourceKey> {
        self.selected()
            .into_iter()
            .map(|id| ResourceKey::new(self.runner.shared.id.clone(), id))
            .collect()
    }

    fn last_update(&self) -> Option<DateTime<Utc>> {
        *self
            .last_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// A backend serving packages from memory.
#[derive(Debug)]
pub struct DummyBackend {
    shared: Arc<Shared>,
    runner: Runner,
    updater: Arc<DummyUpdater>,
    manual: Arc<ManualLog>,
    pending: Mutex<Option<(Duration, Vec<DummyPackage>)>>,
    security_updates: bool,
}

impl DummyBackend {
    /// A valid, ready backend serving `packages`.
    pub fn new(name: impl Into<String>, packages: Vec<DummyPackage>) -> Self {
        Self::with_options(
            name,
            DummyOptions {
                packages,
                ..DummyOptions::default()
            },
        )
    }

    /// Build from configuration options.
    ///
    /// With a fetch delay the backend starts out fetching and loads its
    /// packages once connected.
    pub fn with_options(name: impl Into<String>, options: DummyOptions) -> Self {
        let id = BackendId::new(name);
        let reviews = (!options.ratings.is_empty()).then(|| {
            Arc::new(options.ratings.into_iter().collect::<StaticReviews>()) as Arc<dyn ReviewsBackend>
        });
        let delayed = options.fetch_delay_ms > 0;
        let shared = Arc::new(Shared {
            id,
            state: RwLock::new(DummyState {
                valid: options.valid,
                fetching: delayed,
                has_applications: options.has_applications,
                reviews,
                ..DummyState::default()
            }),
            notifier: Mutex::new(None),
        });

        let pending = if delayed {
            Some((Duration::from_millis(options.fetch_delay_ms), options.packages))
        } else {
            shared.load(options.packages);
            None
        };

        let manual = Arc::new(ManualLog::default());
        let runner = Runner {
            shared: shared.clone(),
            step_delay: Duration::from_millis(options.step_delay_ms),
            fail_packages: options.fail_packages,
            manual: options.manual_transactions.then(|| manual.clone()),
        };
        Self {
            updater: Arc::new(DummyUpdater::new(runner.clone())),
            shared,
            runner,
            manual,
            pending: Mutex::new(pending),
            security_updates: options.security_updates,
        }
    }

    /// Start or finish a fetch.
    pub fn set_fetching(&self, fetching: bool) {
        self.shared.write().fetching = fetching;
        self.shared.notify(|n| n.fetching_changed(fetching));
    }

    /// Replace every package. Old keys stop resolving.
    pub fn replace_packages(&self, packages: Vec<DummyPackage>) {
        self.shared.load(packages);
        if !self.shared.read().fetching {
            self.shared.notify(BackendNotifier::invalidated);
        }
    }

    /// Add one package.
    pub fn add_package(&self, package: DummyPackage) -> ResourceKey {
        let id = {
            let mut state = self.shared.write();
            let rating = state
                .reviews
                .as_ref()
                .and_then(|r| r.rating_for(&package.package_name));
            state.arena.insert_with(|id| {
                DummyResource::new(self.shared.id.clone(), id, package).with_rating(rating)
            })
        };
        self.shared.notify(BackendNotifier::invalidated);
        ResourceKey::new(self.shared.id.clone(), id)
    }

    /// Drop a package. Returns `false` if there was none.
    pub fn remove_package(&self, package_name: &str) -> bool {
        let Some(resource) = self.shared.find(package_name) else {
            return false;
        };
        self.shared.notify(|n| n.resource_removed(resource.id));
        self.shared.write().arena.remove(resource.id);
        true
    }

    /// Rewrite a package and notify the changed properties.
    pub fn update_package(
        &self,
        package_name: &str,
        change: impl FnOnce(&mut DummyPackage),
    ) -> Vec<ResourceProperty> {
        match self.shared.find(package_name) {
            Some(resource) => self.shared.update(resource.id, change),
            None => Vec::new(),
        }
    }

    /// Flip validity, as a backend losing its daemon would.
    pub fn set_valid(&self, valid: bool) {
        self.shared.write().valid = valid;
        self.shared.notify(BackendNotifier::invalidated);
    }

    /// Declare whether the backend offers applications.
    pub fn set_has_applications(&self, has_applications: bool) {
        self.shared.write().has_applications = has_applications;
    }

    /// Swap the ratings source and refresh every rating.
    pub fn set_reviews(&self, reviews: Arc<dyn ReviewsBackend>) {
        {
            let mut state = self.shared.write();
            let refreshed: Vec<DummyResource> = state
                .arena
                .iter()
                .map(|r| {
                    let rating = reviews.rating_for(&r.package.package_name);
                    (**r).clone().with_rating(rating)
                })
                .collect();
            for resource in refreshed {
                state.arena.replace(resource.id, resource);
            }
            state.reviews = Some(reviews);
        }
        self.shared
            .notify(|n| n.notify(BackendEvent::AllDataChanged(vec![ResourceProperty::Rating])));
    }

    /// Show a message to the user.
    pub fn announce(&self, message: impl Into<String>) {
        let message = message.into();
        self.shared.notify(|n| n.passive_message(message));
    }

    /// Key of a package, if present.
    pub fn key_of(&self, package_name: &str) -> Option<ResourceKey> {
        self.shared
            .find(package_name)
            .map(|r| ResourceKey::new(self.shared.id.clone(), r.id))
    }

    /// Handles of transactions waiting to be driven by the caller.
    pub fn started_handles(&self) -> Vec<TransactionHandle> {
        self.manual
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of cancellations requested on caller-driven transactions.
    pub fn cancel_requests(&self) -> usize {
        self.manual.cancel_requests.load(Ordering::SeqCst)
    }

    fn owned(&self, key: &ResourceKey) -> Result<Arc<DummyResource>, BackendError> {
        if key.backend != self.shared.id {
            return Err(BackendError::ForeignResource {
                backend: self.shared.id.clone(),
                key: key.clone(),
            });
        }
        self.shared
            .read()
            .arena
            .get(key.resource)
            .cloned()
            .ok_or_else(|| BackendError::UnknownResource(key.clone()))
    }

    fn finish_delayed_fetch(shared: &Shared, packages: Vec<DummyPackage>) {
        shared.load(packages);
        shared.write().fetching = false;
        tracing::debug!(backend = %shared.id, "Dummy fetch finished");
        shared.notify(|n| n.fetching_changed(false));
    }
}

fn search_rank(resource: &DummyResource, needle: &str) -> Option<u8> {
    if needle.is_empty() {
        return Some(0);
    }
    let package_name = resource.package.package_name.to_lowercase();
    let name = resource.package.name.to_lowercase();
    if package_name == needle || name == needle {
        Some(0)
    } else if package_name.starts_with(needle) || name.starts_with(needle) {
        Some(1)
    } else if package_name.contains(needle) || name.contains(needle) {
        Some(2)
    } else if resource.package.comment.to_lowercase().contains(needle) {
        Some(3)
    } else {
        None
    }
}

impl ResourcesBackend for DummyBackend {
    fn id(&self) -> &BackendId {
        &self.shared.id
    }

    fn connect(&self, notifier: BackendNotifier) {
        *self
            .shared
            .notifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(notifier);

        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some((delay, packages)) = pending else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = self.shared.clone();
                runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    Self::finish_delayed_fetch(&shared, packages);
                });
            }
            Err(_) => Self::finish_delayed_fetch(&self.shared, packages),
        }
    }

    fn is_valid(&self) -> bool {
        self.shared.read().valid
    }

    fn is_fetching(&self) -> bool {
        self.shared.read().fetching
    }

    fn resources(&self) -> Vec<Arc<dyn Resource>> {
        self.shared
            .read()
            .arena
            .iter()
            .map(|r| r.clone() as Arc<dyn Resource>)
            .collect()
    }

    fn resource(&self, id: ResourceId) -> Option<Arc<dyn Resource>> {
        self.shared
            .read()
            .arena
            .get(id)
            .map(|r| r.clone() as Arc<dyn Resource>)
    }

    fn search(&self, filters: &Filters) -> ResultsStream {
        let name = format!("{}:search", self.shared.id);
        let state = self.shared.read();
        if state.fetching {
            return ResultsStream::empty(name);
        }

        let needle = filters.search.to_lowercase();
        let mut hits: Vec<(u8, &str, ResourceId)> = state
            .arena
            .iter()
            .filter(|r| filters.matches(r.as_ref()))
            .filter_map(|r| search_rank(r, &needle).map(|rank| (rank, r.package.name.as_str(), r.id)))
            .collect();
        hits.sort_unstable();

        let (sender, stream) = ResultsStream::channel(name);
        let results: Vec<StreamResult> = hits
            .iter()
            .enumerate()
            .map(|(position, (_, _, id))| {
                StreamResult::new(ResourceKey::new(self.shared.id.clone(), *id), position as u32)
            })
            .collect();
        for batch in results.chunks(SEARCH_BATCH) {
            if !sender.resources_found(batch.to_vec()) {
                break;
            }
        }
        sender.finish();
        stream
    }

    fn install_application(
        &self,
        resource: &ResourceKey,
        addons: &AddonList,
    ) -> Result<Transaction, BackendError> {
        let current = self.owned(resource)?;
        let work = if current.is_installed() {
            if addons.is_empty() {
                return Err(BackendError::unsupported(resource, "install", "already installed"));
            }
            Work::ChangeAddons {
                resource: resource.resource,
                addons: addons.clone(),
            }
        } else {
            Work::Install {
                resource: resource.resource,
                addons: addons.clone(),
            }
        };
        let role = work.role();
        let driver = self.runner.driver(work, &[current.package_name()]);
        Ok(Transaction::new(
            self.shared.id.clone(),
            Some(resource.clone()),
            current.name(),
            role,
            driver,
        )
        .with_addons(addons.clone()))
    }

    fn remove_application(&self, resource: &ResourceKey) -> Result<Transaction, BackendError> {
        let current = self.owned(resource)?;
        if !current.is_installed() {
            return Err(BackendError::unsupported(resource, "remove", "not installed"));
        }
        let driver = self.runner.driver(
            Work::Remove {
                resource: resource.resource,
            },
            &[current.package_name()],
        );
        Ok(Transaction::new(
            self.shared.id.clone(),
            Some(resource.clone()),
            current.name(),
            TransactionRole::Remove,
            driver,
        ))
    }

    fn check_for_updates(&self) {
        if self.is_fetching() {
            tracing::debug!(backend = %self.shared.id, "Skipping update check while fetching");
            return;
        }
        self.updater.prepare();
        self.shared.notify(BackendNotifier::updates_count_changed);
    }

    fn updates_count(&self) -> usize {
        self.shared.upgradeable().len()
    }

    fn has_security_updates(&self) -> bool {
        self.security_updates && self.updates_count() > 0
    }

    fn has_applications(&self) -> bool {
        self.shared.read().has_applications
    }

    fn extends(&self, package_name: &str) -> bool {
        self.shared
            .read()
            .arena
            .iter()
            .any(|r| r.package.extends.iter().any(|e| e == package_name))
    }

    fn backend_updater(&self) -> Arc<dyn BackendUpdater> {
        self.updater.clone()
    }

    fn reviews_backend(&self) -> Option<Arc<dyn ReviewsBackend>> {
        self.shared.read().reviews.clone()
    }
}

/// Builds [`DummyBackend`]s from `kind = "dummy"` configuration entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct DummyFactory;

#[async_trait]
impl BackendFactory for DummyFactory {
    fn kind(&self) -> &'static str {
        DUMMY_KIND
    }

    async fn create(
        &self,
        settings: &BackendSettings,
    ) -> Result<Vec<Arc<dyn ResourcesBackend>>, BackendError> {
        let options: DummyOptions = settings.options().map_err(|e| BackendError::Options {
            backend: settings.name.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(
            backend = %settings.name,
            packages = options.packages.len(),
            "Creating dummy backend"
        );
        Ok(vec![Arc::new(DummyBackend::with_options(
            settings.name.clone(),
            options,
        ))])
    }
}
