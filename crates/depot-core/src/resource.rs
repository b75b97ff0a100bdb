//! The resource capability contract and the arena backends keep them in.
//!
//! Resources are immutable snapshots. A backend that changes a resource
//! swaps the snapshot stored under the same [`ResourceId`] and notifies the
//! model; everyone else holds a [`ResourceKey`] and resolves it on access,
//! so nobody can observe a resource after its backend dropped it.

use crate::error::ResourceError;
use depot_schema::{
    BackendId, CategorySubject, Icon, PackageState, Rating, ResourceId, ResourceKey,
    ResourceState, ResourceType,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One installable or removable unit exposed by a backend.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Backend-local id, stable for the life of the resource.
    fn id(&self) -> ResourceId;

    /// The owning backend.
    fn backend_id(&self) -> &BackendId;

    /// Process-wide address of this resource.
    fn key(&self) -> ResourceKey {
        ResourceKey::new(self.backend_id().clone(), self.id())
    }

    /// Backend-local unique package name.
    fn package_name(&self) -> &str;

    /// Cross-backend component id, if the resource has one.
    fn appstream_id(&self) -> Option<&str> {
        None
    }

    /// Display name.
    fn name(&self) -> &str;

    /// One-line summary.
    fn comment(&self) -> &str;

    /// Long description. May be a placeholder until details arrive.
    fn long_description(&self) -> &str;

    /// Icon reference.
    fn icon(&self) -> Icon;

    /// Declared category names.
    fn categories(&self) -> &[String];

    /// Installation state.
    fn state(&self) -> ResourceState;

    /// Download or installed size in bytes.
    fn size(&self) -> u64;

    /// License expression.
    fn license(&self) -> &str;

    /// Installed version, if any.
    fn installed_version(&self) -> Option<&str>;

    /// Newest available version, if known.
    fn available_version(&self) -> Option<&str>;

    /// Repository or remote the resource comes from.
    fn origin(&self) -> &str;

    /// Archive section.
    fn section(&self) -> &str;

    /// What kind of unit this is.
    fn resource_type(&self) -> ResourceType {
        ResourceType::Application
    }

    /// Mime types the application handles.
    fn mimetypes(&self) -> &[String] {
        &[]
    }

    /// Executables the resource ships.
    fn executables(&self) -> &[String] {
        &[]
    }

    /// Package names this resource is an addon for.
    fn extends(&self) -> &[String] {
        &[]
    }

    /// Whether [`Resource::invoke_application`] can do anything.
    fn can_execute(&self) -> bool {
        false
    }

    /// Launch the application.
    fn invoke_application(&self) -> Result<(), ResourceError> {
        Err(ResourceError::NotExecutable(self.name().to_string()))
    }

    /// Installation state of every addon the resource offers.
    fn addons_information(&self) -> Vec<PackageState> {
        Vec::new()
    }

    /// Popularity data, when a reviews collaborator supplied it.
    fn rating(&self) -> Option<Rating> {
        None
    }

    /// Address used by `resource_url` filters.
    fn url(&self) -> String {
        match self.appstream_id() {
            Some(id) => format!("appstream://{id}"),
            None => format!("{}://{}", self.backend_id(), self.package_name()),
        }
    }

    /// Returns `true` for units a regular user would not browse for.
    fn is_technical(&self) -> bool {
        self.resource_type().is_technical()
    }

    /// Returns `true` if a newer version can be installed.
    fn can_upgrade(&self) -> bool {
        self.state() == ResourceState::Upgradeable
    }

    /// Returns `true` if the resource is installed, upgradeable or not.
    fn is_installed(&self) -> bool {
        self.state() >= ResourceState::Installed
    }

    /// Human readable state.
    fn status(&self) -> &'static str {
        self.state().label()
    }
}

/// Adapter exposing a resource to category filter evaluation.
#[derive(Debug, Clone, Copy)]
pub struct CategoryView<'a>(pub &'a dyn Resource);

impl CategorySubject for CategoryView<'_> {
    fn has_category(&self, category: &str) -> bool {
        self.0.categories().iter().any(|c| c == category)
    }

    fn section(&self) -> &str {
        self.0.section()
    }

    fn package_name(&self) -> &str {
        self.0.package_name()
    }

    fn appstream_id(&self) -> Option<&str> {
        self.0.appstream_id()
    }
}

/// Id-keyed storage of the resources one backend owns.
///
/// Ids are handed out from a monotonic counter and never reused, so a key
/// kept past removal resolves to `None` instead of to another package.
#[derive(Debug)]
pub struct ResourceArena<R> {
    next: u64,
    items: BTreeMap<ResourceId, Arc<R>>,
}

impl<R> Default for ResourceArena<R> {
    fn default() -> Self {
        Self {
            next: 1,
            items: BTreeMap::new(),
        }
    }
}

impl<R> ResourceArena<R> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the value built by `make`, passing it the freshly allocated id.
    pub fn insert_with(&mut self, make: impl FnOnce(ResourceId) -> R) -> ResourceId {
        let id = ResourceId::new(self.next);
        self.next += 1;
        self.items.insert(id, Arc::new(make(id)));
        id
    }

    /// Look up a resource.
    pub fn get(&self, id: ResourceId) -> Option<&Arc<R>> {
        self.items.get(&id)
    }

    /// Swap in a new snapshot for an existing id. Returns the old one.
    ///
    /// Unknown ids are left alone.
    pub fn replace(&mut self, id: ResourceId, value: R) -> Option<Arc<R>> {
        let slot = self.items.get_mut(&id)?;
        Some(std::mem::replace(slot, Arc::new(value)))
    }

    /// Drop a resource for good.
    pub fn remove(&mut self, id: ResourceId) -> Option<Arc<R>> {
        self.items.remove(&id)
    }

    /// Drop every resource. Ids keep counting from where they were.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Resources in id (creation) order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<R>> {
        self.items.values()
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the arena holds nothing.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_never_reused() {
        let mut arena = ResourceArena::new();
        let a = arena.insert_with(|id| id.get());
        let b = arena.insert_with(|id| id.get());
        assert_ne!(a, b);

        arena.remove(a);
        arena.clear();
        let c = arena.insert_with(|id| id.get());
        assert!(c > b);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_replace_keeps_id_and_ignores_unknown() {
        let mut arena = ResourceArena::new();
        let id = arena.insert_with(|_| "old");
        let previous = arena.replace(id, "new");
        assert_eq!(previous.as_deref(), Some(&"old"));
        assert_eq!(arena.get(id).map(|r| **r), Some("new"));

        assert!(arena.replace(ResourceId::new(99), "ghost").is_none());
        assert_eq!(arena.len(), 1);
    }
}
