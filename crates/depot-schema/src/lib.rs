//! depot-schema - plain data shared by every depot layer
//!
//! Identifiers, resource states, transaction status rules and category
//! filters. Nothing in here is async or owns a resource; the aggregation
//! core and the CLI both build on these types.

/// Category filter trees.
pub mod category;
/// Backend, resource and transaction identifiers.
pub mod ids;
/// Transaction status machine, roles and addon lists.
pub mod transaction;
/// Resource states, kinds, properties, icons and ratings.
pub mod types;

// Re-exports
pub use category::{Category, CategoryError, CategoryFilter, CategorySubject};
pub use ids::*;
pub use transaction::*;
pub use types::*;
