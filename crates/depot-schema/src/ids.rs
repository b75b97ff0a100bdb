use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Stable identifier of a backend (its configured name, e.g. `flatpak`).
///
/// Names are compared verbatim: two backends may not share an id within one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(String);

impl BackendId {
    /// Create a backend id from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Return the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::ops::Deref for BackendId {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Borrow<str> for BackendId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BackendId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BackendId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl PartialEq<str> for BackendId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for BackendId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Backend-local identifier of a resource.
///
/// Allocated by the owning backend and never reused for the lifetime of that
/// backend, so a stale id resolves to nothing instead of to a different package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Process-wide address of a resource: owning backend plus backend-local id.
///
/// Everything outside the owning backend (aggregator, proxy, transactions)
/// holds one of these instead of the resource itself and resolves it on access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Backend that owns the resource.
    pub backend: BackendId,
    /// Id inside that backend.
    pub resource: ResourceId,
}

impl ResourceKey {
    /// Build a key from its parts.
    pub fn new(backend: BackendId, resource: ResourceId) -> Self {
        Self { backend, resource }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.backend, self.resource)
    }
}

/// Identifier of a transaction, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Wrap a raw id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_id_compares_with_str() {
        let id = BackendId::new("flatpak");
        assert_eq!(id, "flatpak");
        assert_eq!(id.to_string(), "flatpak");
        assert!(id.starts_with("flat"));
    }

    #[test]
    fn test_resource_key_display() {
        let key = ResourceKey::new(BackendId::new("apt"), ResourceId::new(7));
        assert_eq!(key.to_string(), "apt#7");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&ResourceId::new(3)).unwrap();
        assert_eq!(json, "3");
        let json = serde_json::to_string(&BackendId::new("snap")).unwrap();
        assert_eq!(json, "\"snap\"");
    }
}
