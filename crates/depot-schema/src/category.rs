//! Category definitions as boolean filter trees.
//!
//! Only the evaluation model lives here; loading category definitions from
//! disk is left to whoever builds the `Category` values.

use serde::{Deserialize, Serialize};

/// Errors raised while validating a category definition.
#[derive(thiserror::Error, Debug)]
pub enum CategoryError {
    /// A wildcard filter holds a pattern `glob` cannot compile.
    #[error("Invalid wildcard '{pattern}' in category '{category}': {reason}")]
    InvalidWildcard {
        /// Category holding the pattern.
        category: String,
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// An `And`/`Or`/`Not` node has no children.
    #[error("Empty {kind} filter in category '{category}'")]
    EmptyGroup {
        /// Category holding the node.
        category: String,
        /// Which combinator is empty.
        kind: &'static str,
    },
}

/// The attributes a category filter inspects.
///
/// Implemented by the resource abstraction of the core crate, and by test doubles.
pub trait CategorySubject {
    /// Whether the subject declares the named category.
    fn has_category(&self, category: &str) -> bool;
    /// Archive section (e.g. `utils`).
    fn section(&self) -> &str;
    /// Backend-local package name.
    fn package_name(&self) -> &str;
    /// Cross-backend component id, if any.
    fn appstream_id(&self) -> Option<&str>;
}

/// One node of a category's filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum CategoryFilter {
    /// Resource declares this category name.
    CategoryName(String),
    /// Resource's archive section equals the value.
    PkgSection(String),
    /// Package name matches a glob pattern.
    PkgWildcard(String),
    /// Appstream id matches a glob pattern.
    AppstreamIdWildcard(String),
    /// Package name equals the value (mostly useful under `Not`).
    PkgName(String),
    /// Every child matches.
    And(Vec<CategoryFilter>),
    /// At least one child matches.
    Or(Vec<CategoryFilter>),
    /// No child matches.
    Not(Vec<CategoryFilter>),
}

impl CategoryFilter {
    /// Evaluate the filter against a subject.
    pub fn matches<S: CategorySubject + ?Sized>(&self, subject: &S) -> bool {
        match self {
            Self::CategoryName(name) => subject.has_category(name),
            Self::PkgSection(section) => subject.section() == section,
            Self::PkgWildcard(pattern) => wildcard_matches(pattern, subject.package_name()),
            Self::AppstreamIdWildcard(pattern) => subject
                .appstream_id()
                .is_some_and(|id| wildcard_matches(pattern, id)),
            Self::PkgName(name) => subject.package_name() == name,
            Self::And(filters) => filters.iter().all(|f| f.matches(subject)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(subject)),
            Self::Not(filters) => !filters.iter().any(|f| f.matches(subject)),
        }
    }

    fn validate(&self, category: &str) -> Result<(), CategoryError> {
        match self {
            Self::PkgWildcard(pattern) | Self::AppstreamIdWildcard(pattern) => {
                glob::Pattern::new(pattern)
                    .map(|_| ())
                    .map_err(|e| CategoryError::InvalidWildcard {
                        category: category.to_string(),
                        pattern: pattern.clone(),
                        reason: e.msg.to_string(),
                    })
            }
            Self::And(filters) | Self::Or(filters) | Self::Not(filters) => {
                if filters.is_empty() {
                    return Err(CategoryError::EmptyGroup {
                        category: category.to_string(),
                        kind: self.kind(),
                    });
                }
                filters.iter().try_for_each(|f| f.validate(category))
            }
            Self::CategoryName(_) | Self::PkgSection(_) | Self::PkgName(_) => Ok(()),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
            _ => "leaf",
        }
    }
}

fn wildcard_matches(pattern: &str, value: &str) -> bool {
    glob::Pattern::new(pattern).is_ok_and(|p| p.matches(value))
}

/// A named browsing category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, unique among siblings.
    pub name: String,
    /// Membership predicate.
    pub filter: CategoryFilter,
    /// Nested categories.
    #[serde(default)]
    pub subcategories: Vec<Category>,
}

impl Category {
    /// Create a leaf category.
    pub fn new(name: impl Into<String>, filter: CategoryFilter) -> Self {
        Self {
            name: name.into(),
            filter,
            subcategories: Vec::new(),
        }
    }

    /// Check that every wildcard compiles and no combinator is empty, recursively.
    ///
    /// # Errors
    ///
    /// Returns the first [`CategoryError`] found in this category or its subcategories.
    pub fn validate(&self) -> Result<(), CategoryError> {
        self.filter.validate(&self.name)?;
        self.subcategories.iter().try_for_each(Category::validate)
    }

    /// Whether `subject` belongs to this category.
    pub fn matches<S: CategorySubject + ?Sized>(&self, subject: &S) -> bool {
        self.filter.matches(subject)
    }

    /// Depth-first lookup by name, including `self`.
    pub fn find(&self, name: &str) -> Option<&Category> {
        if self.name == name {
            return Some(self);
        }
        self.subcategories.iter().find_map(|c| c.find(name))
    }
}
