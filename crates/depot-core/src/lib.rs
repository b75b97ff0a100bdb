//! depot-core - resource aggregation and transaction coordination
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Merges any number of package backends into one queryable list and
//! serializes the install/remove/update operations performed on it.
//!
//! # Architecture
//!
//! - **Ownership**: backends own their resources in a [`resource::ResourceArena`];
//!   everyone else holds a [`depot_schema::ResourceKey`] and resolves it on access.
//! - **Events**: backends report through a [`backend::BackendNotifier`]; the
//!   [`ResourcesModel`] applies reports on its owner's task and republishes
//!   narrow [`ModelEvent`]s.
//! - **Searches**: every backend answers with a [`stream::ResultsStream`],
//!   merged and debounced by [`stream::AggregatedResultsStream`].
//! - **Transactions**: the [`TransactionModel`] runs at most one transaction
//!   per backend and queues the rest.

pub mod backend;
pub mod backends;
pub mod config;
pub mod context;
pub mod error;
pub mod filters;
pub mod model;
pub mod proxy;
pub mod registry;
pub mod resource;
pub mod reviews;
pub mod signal;
pub mod stream;
pub mod transaction;

pub use backend::{BackendEvent, BackendNotifier, BackendUpdater, ResourcesBackend};
pub use config::{BackendSettings, DepotConfig, ModelSettings};
pub use context::Context;
pub use error::{BackendError, ConfigError, ModelError, ResourceError, TransactionError};
pub use filters::Filters;
pub use model::{ModelEvent, ResourcesModel};
pub use proxy::{ProxyEvent, ResourcesProxyModel, SortOrder, SortRole};
pub use registry::{BackendFactory, BackendRegistry};
pub use resource::Resource;
pub use stream::{AggregatedResultsStream, ResultsStream, StreamResult};
pub use transaction::{Transaction, TransactionEvent, TransactionModel};
