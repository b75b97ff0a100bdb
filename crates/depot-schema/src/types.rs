use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Installation state of a resource.
///
/// Ordered: `Broken < None < Installed < Upgradeable`, which is what the
/// minimum-state filter relies on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceState {
    /// The package cannot be installed or is in an inconsistent state.
    #[default]
    Broken,
    /// Available but not installed.
    None,
    /// Installed and current.
    Installed,
    /// Installed with a newer version available.
    Upgradeable,
}

impl ResourceState {
    /// Human readable label for the state.
    pub fn label(self) -> &'static str {
        match self {
            Self::Broken => "Broken",
            Self::None => "Available",
            Self::Installed => "Installed",
            Self::Upgradeable => "Upgradeable",
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What kind of unit a resource represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    /// A user-facing application.
    #[default]
    Application,
    /// An optional extension of another resource.
    Addon,
    /// Runtime or support files needed by applications.
    ApplicationSupport,
    /// A technical system package.
    System,
}

impl ResourceType {
    /// Returns `true` for units a regular user would not browse for.
    pub fn is_technical(self) -> bool {
        matches!(self, Self::ApplicationSupport | Self::System)
    }
}

/// Observable property of a resource, used to scope change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceProperty {
    /// Display name.
    Name,
    /// Short description.
    Comment,
    /// Icon reference.
    Icon,
    /// Installation state.
    State,
    /// Size in bytes.
    Size,
    /// License string.
    License,
    /// Installed version.
    InstalledVersion,
    /// Available version.
    AvailableVersion,
    /// Long description.
    LongDescription,
    /// Origin (repository or remote).
    Origin,
    /// Category membership.
    Categories,
    /// Rating from the reviews collaborator.
    Rating,
    /// Addon installation states.
    Addons,
    /// The in-flight transaction acting on the resource.
    Transaction,
}

impl ResourceProperty {
    /// Properties that change together whenever the installation state changes.
    pub const STATE_CHANGE: [Self; 4] = [
        Self::State,
        Self::Size,
        Self::InstalledVersion,
        Self::AvailableVersion,
    ];
}

/// Opaque icon reference: a theme name, a local file or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Icon {
    /// Icon theme name (e.g. `org.kde.krita`).
    Theme(String),
    /// Path to an image on disk.
    Path(PathBuf),
    /// Remote image.
    Url(String),
}

impl Default for Icon {
    fn default() -> Self {
        Self::Theme("package-x-generic".to_string())
    }
}

/// Popularity data supplied by a reviews collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rating {
    /// Average rating on a 0-10 scale.
    pub average: f32,
    /// Number of ratings the average is built from.
    pub count: u32,
}

impl Rating {
    /// Create a rating, clamping the average into `0..=10`.
    pub fn new(average: f32, count: u32) -> Self {
        Self {
            average: average.clamp(0.0, 10.0),
            count,
        }
    }

    /// Score that weighs the average by how many ratings back it.
    ///
    /// A handful of perfect votes ranks below hundreds of good ones.
    pub fn sortable(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        f64::from(self.average) * (f64::from(self.count) + 1.0).ln()
    }
}

/// Installation state of one addon, as reported by `addons_information()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageState {
    /// Package name of the addon.
    pub package_name: String,
    /// Display name.
    pub name: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Whether the addon is currently installed.
    #[serde(default)]
    pub installed: bool,
}

impl PackageState {
    /// Create an addon entry.
    pub fn new(
        package_name: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        installed: bool,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            name: name.into(),
            description: description.into(),
            installed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ordering_supports_minimum_filter() {
        assert!(ResourceState::Broken < ResourceState::None);
        assert!(ResourceState::None < ResourceState::Installed);
        assert!(ResourceState::Installed < ResourceState::Upgradeable);
    }

    #[test]
    fn test_technical_types() {
        assert!(!ResourceType::Application.is_technical());
        assert!(!ResourceType::Addon.is_technical());
        assert!(ResourceType::System.is_technical());
        assert!(ResourceType::ApplicationSupport.is_technical());
    }

    #[test]
    fn test_rating_sortable_prefers_more_votes() {
        let few = Rating::new(10.0, 2);
        let many = Rating::new(8.0, 400);
        assert!(many.sortable() > few.sortable());
        assert!(Rating::new(9.0, 0).sortable().abs() < f64::EPSILON);
    }

    #[test]
    fn test_rating_clamps_average() {
        assert!((Rating::new(42.0, 1).average - 10.0).abs() < f32::EPSILON);
    }
}
