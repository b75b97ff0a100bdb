//! Backends shipped with the core.

pub mod dummy;

pub use dummy::{DummyBackend, DummyFactory, DummyOptions, DummyPackage, DummyResource};
