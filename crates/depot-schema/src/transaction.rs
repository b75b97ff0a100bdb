//! Transaction status machine and role/addon value types.
//!
//! ```text
//! Queued ──> Downloading ──> Committing ──> Done
//!   │             │              ├────────> DoneWithError
//!   └─────────────┴──────────────┴────────> Cancelled
//! ```
//!
//! `Queued` may skip `Downloading` and go straight to `Committing`; only roles
//! that fetch artifacts may enter `Downloading`. A backend that cannot even
//! resolve the resource may fail a `Queued` transaction directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a transaction does to its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionRole {
    /// Install (or upgrade) the resource.
    Install,
    /// Remove the resource.
    Remove,
    /// Install and remove addons of an installed resource in one operation.
    ChangeAddons,
}

impl TransactionRole {
    /// Whether the role transfers package data before committing.
    pub fn fetches_artifacts(self) -> bool {
        matches!(self, Self::Install | Self::ChangeAddons)
    }
}

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionStatus {
    /// Waiting for its turn on the backend.
    Queued,
    /// Transferring package data.
    Downloading,
    /// Applying the change.
    Committing,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    DoneWithError,
    /// Cancelled before completion.
    Cancelled,
}

impl TransactionStatus {
    /// Returns `true` for statuses no transition may leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::DoneWithError | Self::Cancelled)
    }

    /// Returns `true` while the backend is actively working on it.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Downloading | Self::Committing)
    }

    /// Whether a transaction with `role` may move from `self` to `next`.
    pub fn can_advance_to(self, next: Self, role: TransactionRole) -> bool {
        use TransactionStatus::{Cancelled, Committing, Done, DoneWithError, Downloading, Queued};

        match (self, next) {
            (Queued, Downloading) => role.fetches_artifacts(),
            (Queued | Downloading, Committing)
            | (Queued | Downloading | Committing, DoneWithError | Cancelled)
            | (Committing, Done) => true,
            _ => false,
        }
    }

    /// User-facing description of the status for a given role.
    pub fn status_text(self, role: TransactionRole) -> &'static str {
        match self {
            Self::Queued => "Waiting",
            Self::Downloading => "Downloading",
            Self::Committing => match role {
                TransactionRole::Install => "Installing",
                TransactionRole::Remove => "Removing",
                TransactionRole::ChangeAddons => "Changing Addons",
            },
            Self::Done => "Done",
            Self::DoneWithError => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Committing => "committing",
            Self::Done => "done",
            Self::DoneWithError => "done-with-error",
            Self::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Addons to add and remove alongside a base resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddonList {
    /// Addon package names to install.
    #[serde(default)]
    pub to_install: Vec<String>,
    /// Addon package names to remove.
    #[serde(default)]
    pub to_remove: Vec<String>,
}

impl AddonList {
    /// An empty addon change.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nothing is added or removed.
    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_remove.is_empty()
    }

    /// Queue an addon for installation (and drop it from the removal list).
    pub fn add_install(&mut self, addon: impl Into<String>) {
        let addon = addon.into();
        self.to_remove.retain(|a| *a != addon);
        if !self.to_install.contains(&addon) {
            self.to_install.push(addon);
        }
    }

    /// Queue an addon for removal (and drop it from the install list).
    pub fn add_remove(&mut self, addon: impl Into<String>) {
        let addon = addon.into();
        self.to_install.retain(|a| *a != addon);
        if !self.to_remove.contains(&addon) {
            self.to_remove.push(addon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::TransactionRole::{ChangeAddons, Install, Remove};
    use super::TransactionStatus::{
        Cancelled, Committing, Done, DoneWithError, Downloading, Queued,
    };

    #[test]
    fn test_remove_skips_downloading() {
        assert!(!Queued.can_advance_to(Downloading, Remove));
        assert!(Queued.can_advance_to(Committing, Remove));
        assert!(Queued.can_advance_to(Downloading, Install));
        assert!(Queued.can_advance_to(Downloading, ChangeAddons));
    }

    #[test]
    fn test_terminal_statuses_are_final() {
        for terminal in [Done, DoneWithError, Cancelled] {
            assert!(terminal.is_terminal());
            for next in [Queued, Downloading, Committing, Done, DoneWithError, Cancelled] {
                assert!(!terminal.can_advance_to(next, Install));
            }
        }
    }

    #[test]
    fn test_done_only_from_committing() {
        assert!(!Queued.can_advance_to(Done, Install));
        assert!(!Downloading.can_advance_to(Done, Install));
        assert!(Committing.can_advance_to(Done, Install));
    }

    #[test]
    fn test_no_going_back() {
        assert!(!Committing.can_advance_to(Downloading, Install));
        assert!(!Downloading.can_advance_to(Queued, Install));
    }

    #[test]
    fn test_status_text_depends_on_role() {
        assert_eq!(Committing.status_text(Install), "Installing");
        assert_eq!(Committing.status_text(Remove), "Removing");
        assert_eq!(Committing.status_text(ChangeAddons), "Changing Addons");
        assert_eq!(Queued.status_text(Remove), "Waiting");
    }

    #[test]
    fn test_addon_list_moves_between_lists() {
        let mut addons = AddonList::new();
        assert!(addons.is_empty());
        addons.add_install("lang-de");
        addons.add_install("lang-de");
        addons.add_remove("lang-fr");
        assert_eq!(addons.to_install, vec!["lang-de"]);
        addons.add_remove("lang-de");
        assert!(addons.to_install.is_empty());
        assert_eq!(addons.to_remove, vec!["lang-fr", "lang-de"]);
    }
}
