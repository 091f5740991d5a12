// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifiers and property bags for addressable repository items.
//!
//! Nodes are owned by the external repository; this crate never creates or
//! deletes them, it only reads and annotates them through the ports defined
//! in [`crate::traits`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a logical store inside the repository.
///
/// Every store may have an associated archive store into which soft-deleted
/// subtrees are moved.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally unique identifier of an addressable repository item.
///
/// The item it refers to may or may not currently exist. An archived node
/// keeps the `uuid` of its live counterpart and differs only in `store`.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct NodeId {
    pub store: StoreId,
    pub uuid: String,
}

impl NodeId {
    pub fn new(store: StoreId, uuid: impl Into<String>) -> Self {
        Self {
            store,
            uuid: uuid.into(),
        }
    }

    /// The same item addressed in another store.
    pub fn in_store(&self, store: StoreId) -> Self {
        Self {
            store,
            uuid: self.uuid.clone(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.store, self.uuid)
    }
}

/// Parent-child association between two nodes.
///
/// The `name` is the association's local name. It doubles as a generic path
/// segment when the caller is not permitted to read the child's real name.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct ChildAssoc {
    pub parent: NodeId,
    pub child: NodeId,
    pub name: String,
}

impl ChildAssoc {
    pub fn new(parent: NodeId, child: NodeId, name: impl Into<String>) -> Self {
        Self {
            parent,
            child,
            name: name.into(),
        }
    }
}

/// A typed property value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(u64),
    Node(NodeId),
    Assoc(ChildAssoc),
    Flag(bool),
}

/// Ordered property bag of a node, keyed by qualified property name.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PropertyMap(BTreeMap<String, PropertyValue>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.0.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a property as text, returning `None` when absent or differently
    /// typed.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PropertyValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    pub fn timestamp(&self, key: &str) -> Option<u64> {
        match self.0.get(key) {
            Some(PropertyValue::Timestamp(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn node(&self, key: &str) -> Option<&NodeId> {
        match self.0.get(key) {
            Some(PropertyValue::Node(value)) => Some(value),
            _ => None,
        }
    }

    pub fn assoc(&self, key: &str) -> Option<&ChildAssoc> {
        match self.0.get(key) {
            Some(PropertyValue::Assoc(value)) => Some(value),
            _ => None,
        }
    }
}

impl IntoIterator for PropertyMap {
    type Item = (String, PropertyValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl FromIterator<(String, PropertyValue)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeId, PropertyMap, PropertyValue, StoreId};

    #[test]
    fn typed_getters_ignore_mismatched_values() {
        let mut properties = PropertyMap::new();
        properties.insert("name", PropertyValue::Text("report.pdf".into()));
        properties.insert("archivedDate", PropertyValue::Timestamp(1_700_000_000_000));

        assert_eq!(properties.text("name"), Some("report.pdf"));
        assert_eq!(properties.timestamp("archivedDate"), Some(1_700_000_000_000));
        assert_eq!(properties.text("archivedDate"), None);
        assert_eq!(properties.timestamp("missing"), None);
    }

    #[test]
    fn archived_equivalent_shares_uuid() {
        let live = NodeId::new(StoreId::new("workspace"), "abc-123");
        let archived = live.in_store(StoreId::new("archive"));

        assert_eq!(archived.uuid, live.uuid);
        assert_eq!(archived.to_string(), "archive://abc-123");
    }
}
