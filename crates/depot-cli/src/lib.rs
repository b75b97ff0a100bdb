//! depot - browse and manage packages across backends
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Headless front end for `depot-core`.
//!
//! Every invocation loads the configuration, builds the enabled backends,
//! waits for their initial fetch and then runs one command against the
//! merged model. Transactions are driven to completion before exiting.
//!
//! # Configuration
//!
//! ```text
//! $DEPOT_CONFIG or ~/.config/depot/config.toml
//!
//! [model]
//! current_application_backend = "flatpak"
//!
//! [[backends]]
//! name = "apt"
//! kind = "dummy"
//! ```

pub mod cmd;
pub mod ui;

use clap::{Args, Parser, Subcommand};
use depot_core::SortRole;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "depot")]
#[command(author, version, about = "depot - browse and manage packages across backends")]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "DEPOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Only enable these backends (comma separated)
    #[arg(long, global = true, value_delimiter = ',')]
    pub backends: Vec<String>,

    /// Print machine readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Scoping shared by listing commands.
#[derive(Debug, Clone, Default, Args)]
pub struct ViewArgs {
    /// Only show resources from this backend
    #[arg(long)]
    pub backend: Option<String>,

    /// Keep duplicates of the same application from different backends
    #[arg(long)]
    pub all_backends: bool,
}

/// Filters and ordering of `depot list`.
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Only installed packages (upgradeable included)
    #[arg(long, conflicts_with = "upgradeable")]
    pub installed: bool,

    /// Only packages with an update pending
    #[arg(long)]
    pub upgradeable: bool,

    /// Only packages from this origin
    #[arg(long)]
    pub origin: Option<String>,

    /// Only packages in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Only technical packages (runtimes, system packages)
    #[arg(long)]
    pub technical: bool,

    /// Sort column: name, size, rating, state or origin
    #[arg(long, default_value_t = SortRole::Name)]
    pub sort: SortRole,

    /// Reverse the sort order
    #[arg(long)]
    pub desc: bool,

    #[command(flatten)]
    pub view: ViewArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show registered backends
    Backends,

    /// List packages
    #[command(visible_alias = "ls")]
    List(ListArgs),

    /// Search packages by name or description, most relevant first
    Search {
        /// Search text (two characters or more)
        query: String,

        #[command(flatten)]
        view: ViewArgs,
    },

    /// Show details about a package
    Info {
        /// Package name, optionally prefixed with its backend (`apt/vim`)
        package: String,
    },

    /// Install packages, or change the addons of an installed one
    #[command(visible_alias = "add")]
    Install {
        /// Packages to install
        #[arg(required = true)]
        packages: Vec<String>,

        /// Addons to install alongside
        #[arg(long = "addon")]
        addons: Vec<String>,

        /// Addons to remove
        #[arg(long = "remove-addon")]
        remove_addons: Vec<String>,
    },

    /// Remove installed packages
    #[command(visible_alias = "rm")]
    Remove {
        /// Packages to remove
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Update every backend with pending updates
    Update {
        /// Only report what would be updated
        #[arg(long)]
        check: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
