//! Ratings collaborator interface.

use depot_schema::Rating;
use std::collections::HashMap;
use std::fmt;

/// Supplies popularity data keyed by package name.
///
/// Consumed opportunistically; nothing in the core depends on it for correctness.
pub trait ReviewsBackend: Send + Sync + fmt::Debug {
    /// Rating for a package, if known.
    fn rating_for(&self, package_name: &str) -> Option<Rating>;

    /// `true` while ratings are still loading.
    fn is_fetching(&self) -> bool {
        false
    }
}

/// In-memory ratings table.
#[derive(Debug, Clone, Default)]
pub struct StaticReviews {
    ratings: HashMap<String, Rating>,
}

impl StaticReviews {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rating of a package.
    pub fn insert(&mut self, package_name: impl Into<String>, rating: Rating) {
        self.ratings.insert(package_name.into(), rating);
    }

    /// Number of rated packages.
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    /// Returns `true` if nothing is rated.
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Rating)> for StaticReviews {
    fn from_iter<I: IntoIterator<Item = (S, Rating)>>(iter: I) -> Self {
        Self {
            ratings: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl ReviewsBackend for StaticReviews {
    fn rating_for(&self, package_name: &str) -> Option<Rating> {
        self.ratings.get(package_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_package_name() {
        let reviews: StaticReviews = [("krita", Rating::new(9.0, 120))].into_iter().collect();
        assert_eq!(reviews.rating_for("krita").map(|r| r.count), Some(120));
        assert!(reviews.rating_for("gimp").is_none());
        assert!(!reviews.is_fetching());
    }
}
