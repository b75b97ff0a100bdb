//! The `Filters` value object shared by searches and the proxy model.

use crate::resource::{CategoryView, Resource};
use depot_schema::{BackendId, Category, ResourceState};

/// What a search or a filtered view should contain.
#[derive(Debug, Clone, PartialEq)]
pub struct Filters {
    /// Restrict to members of a category.
    pub category: Option<Category>,
    /// State threshold (or exact state, see `filter_minimum_state`).
    pub state: ResourceState,
    /// `true`: state must be at least `state`. `false`: exactly `state`.
    pub filter_minimum_state: bool,
    /// Required handled mime type.
    pub mimetype: String,
    /// Free-text search.
    pub search: String,
    /// Only addons extending this package name.
    pub extends: String,
    /// Required origin.
    pub origin: String,
    /// Exact resource url, e.g. `appstream://org.kde.krita`.
    pub resource_url: Option<String>,
    /// Show every backend's copy instead of de-duplicating by appstream id.
    pub all_backends: bool,
    /// Only query this backend.
    pub backend: Option<BackendId>,
    /// `Some(false)` hides technical packages, `Some(true)` shows only them.
    pub technical: Option<bool>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            category: None,
            state: ResourceState::Broken,
            filter_minimum_state: true,
            mimetype: String::new(),
            search: String::new(),
            extends: String::new(),
            origin: String::new(),
            resource_url: None,
            all_backends: false,
            backend: None,
            technical: None,
        }
    }
}

impl Filters {
    /// Filters that list everything installed.
    pub fn installed() -> Self {
        Self {
            state: ResourceState::Installed,
            ..Self::default()
        }
    }

    /// Filters that list everything with an available upgrade.
    pub fn upgradeable() -> Self {
        Self {
            state: ResourceState::Upgradeable,
            ..Self::default()
        }
    }

    /// Filters for a text search.
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: text.into(),
            ..Self::default()
        }
    }

    /// Returns `true` when nothing restricts the result set.
    ///
    /// Such filters would list every resource of every backend, so searches
    /// with them return nothing.
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.state == ResourceState::Broken
            && self.mimetype.is_empty()
            && self.search.is_empty()
            && self.extends.is_empty()
            && self.resource_url.is_none()
            && self.origin.is_empty()
    }

    /// Check every attribute predicate. Text search is not part of this.
    pub fn matches(&self, resource: &dyn Resource) -> bool {
        if !self.extends.is_empty() && !resource.extends().iter().any(|e| *e == self.extends) {
            return false;
        }

        if !self.origin.is_empty() && resource.origin() != self.origin {
            return false;
        }

        let state_ok = if self.filter_minimum_state {
            resource.state() >= self.state
        } else {
            resource.state() == self.state
        };
        if !state_ok {
            return false;
        }

        if !self.mimetype.is_empty() && !resource.mimetypes().iter().any(|m| *m == self.mimetype) {
            return false;
        }

        if self
            .resource_url
            .as_ref()
            .is_some_and(|url| resource.url() != *url)
        {
            return false;
        }

        if self
            .technical
            .is_some_and(|technical| resource.is_technical() != technical)
        {
            return false;
        }

        self.category
            .as_ref()
            .is_none_or(|category| category.matches(&CategoryView(resource)))
    }

    /// Case-insensitive name/comment match, for backends without their own ranking.
    ///
    /// An empty search matches everything.
    pub fn matches_search(&self, resource: &dyn Resource) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        resource.name().to_lowercase().contains(&needle)
            || resource.comment().to_lowercase().contains(&needle)
    }

    /// Returns `true` if `backend` should be queried.
    pub fn includes_backend(&self, backend: &BackendId) -> bool {
        self.backend.as_ref().is_none_or(|b| b == backend)
    }
}
