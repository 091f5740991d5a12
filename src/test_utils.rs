// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory repository for tests.
//!
//! Implements all four ports over shared state and simulates the parts of
//! the hosting repository this crate reacts to: moving a subtree into the
//! archive (writing provenance onto the subtree root only) and moving it
//! back, emitting the transition events the host would raise. The unreliable
//! `archived` flag is raised on every emitted delete event, as the platform
//! does for cascade moves too.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::convert::Infallible;
use std::rc::Rc;

use crate::access::{AccessGrant, AccessStatus, Capability, Principal};
use crate::model::{
    ASPECT_ARCHIVED, PROP_ARCHIVED_BY, PROP_ARCHIVED_DATE, PROP_ARCHIVED_ORIGINAL_PARENT,
    PROP_NAME,
};
use crate::node::{ChildAssoc, NodeId, PropertyMap, PropertyValue, StoreId};
use crate::resolve::UserProfile;
use crate::traits::{AccessControl, ArchiveDirectory, NodeStore, ProfileStore};

/// A delete transition event as raised by the host: the child association
/// the node was removed from, plus the unreliable archived flag.
pub type DeleteEvent = (ChildAssoc, bool);

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

#[derive(Clone, Debug)]
struct NodeRecord {
    properties: PropertyMap,
    aspects: BTreeSet<String>,
    /// Property keys unlocked by an aspect, removed together with it.
    aspect_properties: HashMap<String, Vec<String>>,
    parent: Option<ChildAssoc>,
}

impl NodeRecord {
    fn new(name: &str, parent: Option<ChildAssoc>) -> Self {
        let mut properties = PropertyMap::new();
        properties.insert(PROP_NAME, PropertyValue::Text(name.to_owned()));
        Self {
            properties,
            aspects: BTreeSet::new(),
            aspect_properties: HashMap::new(),
            parent,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<NodeId, NodeRecord>,
    grants: HashMap<NodeId, Vec<AccessGrant>>,
    denied_read: HashSet<(NodeId, Principal)>,
    /// Live store to (archive store, archive root node).
    archives: HashMap<StoreId, (StoreId, NodeId)>,
    profiles: HashMap<Principal, UserProfile>,
    profile_lookups: usize,
    next_id: u64,
}

/// In-memory repository implementing all ports consumed by this crate.
///
/// Not persistent and not thread-safe; test contexts only.
#[derive(Clone, Debug, Default)]
pub struct MemoryRepo {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an archive location for a live store. Returns the archive
    /// root node.
    pub fn register_archive(&self, live: &StoreId, archive: &StoreId) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        let root = NodeId::new(archive.clone(), "archive-root");
        inner
            .nodes
            .insert(root.clone(), NodeRecord::new("archive", None));
        inner
            .archives
            .insert(live.clone(), (archive.clone(), root.clone()));
        root
    }

    /// Create a parentless node, typically the root of a live store.
    pub fn add_root(&self, store: &StoreId, name: &str) -> NodeId {
        let node = self.next_node(store);
        self.inner
            .borrow_mut()
            .nodes
            .insert(node.clone(), NodeRecord::new(name, None));
        node
    }

    /// Create a child node whose association carries the node name.
    pub fn add_child(&self, parent: &NodeId, name: &str) -> NodeId {
        self.add_child_with_assoc(parent, name, name)
    }

    /// Create a child node with an association name differing from the node
    /// name.
    pub fn add_child_with_assoc(&self, parent: &NodeId, name: &str, assoc_name: &str) -> NodeId {
        let node = self.next_node(&parent.store);
        let assoc = ChildAssoc::new(parent.clone(), node.clone(), assoc_name);
        self.inner
            .borrow_mut()
            .nodes
            .insert(node.clone(), NodeRecord::new(name, Some(assoc)));
        node
    }

    pub fn set_property(&self, node: &NodeId, key: &str, value: PropertyValue) {
        let mut inner = self.inner.borrow_mut();
        let record = inner.nodes.get_mut(node).expect("node exists");
        record.properties.insert(key, value);
    }

    /// Make read evaluation fail for one caller on one node.
    pub fn deny_read(&self, node: &NodeId, caller: &Principal) {
        self.inner
            .borrow_mut()
            .denied_read
            .insert((node.clone(), caller.clone()));
    }

    pub fn add_profile(&self, user: &str, first_name: Option<&str>, last_name: Option<&str>) {
        let mut inner = self.inner.borrow_mut();
        inner.profiles.insert(
            Principal::new(user),
            UserProfile {
                user_name: user.to_owned(),
                first_name: first_name.map(str::to_owned),
                last_name: last_name.map(str::to_owned),
            },
        );
    }

    /// Number of profile lookups served so far, memoization visible.
    pub fn profile_lookups(&self) -> usize {
        self.inner.borrow().profile_lookups
    }

    pub fn aspects(&self, node: &NodeId) -> Vec<String> {
        self.inner
            .borrow()
            .nodes
            .get(node)
            .map(|record| record.aspects.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn grants(&self, node: &NodeId) -> Vec<AccessGrant> {
        self.inner.borrow().grants.get(node).cloned().unwrap_or_default()
    }

    /// Simulate the repository moving a subtree into the archive.
    ///
    /// Provenance is written onto the subtree root only, as the platform
    /// does. Returns the delete events for the whole subtree, root first,
    /// all with the archived flag raised.
    pub fn archive(&self, node: &NodeId, user: &str, at: u64) -> Vec<DeleteEvent> {
        let mut inner = self.inner.borrow_mut();
        let (archive_store, archive_root) = inner
            .archives
            .get(&node.store)
            .cloned()
            .expect("store has an archive location");

        let subtree = subtree_of(&inner.nodes, node);
        let mut events = Vec::with_capacity(subtree.len());

        for (index, member) in subtree.iter().enumerate() {
            let mut record = inner.nodes.remove(member).expect("subtree node exists");
            let live_assoc = record.parent.clone().expect("archived node has a parent");
            events.push((live_assoc.clone(), true));

            let archived = member.in_store(archive_store.clone());
            if index == 0 {
                record.parent = Some(ChildAssoc::new(
                    archive_root.clone(),
                    archived.clone(),
                    live_assoc.name.clone(),
                ));
                record.aspects.insert(ASPECT_ARCHIVED.to_owned());
                record
                    .properties
                    .insert(PROP_ARCHIVED_BY, PropertyValue::Text(user.to_owned()));
                record
                    .properties
                    .insert(PROP_ARCHIVED_DATE, PropertyValue::Timestamp(at));
                record.properties.insert(
                    PROP_ARCHIVED_ORIGINAL_PARENT,
                    PropertyValue::Assoc(live_assoc),
                );
            } else {
                record.parent = Some(ChildAssoc::new(
                    live_assoc.parent.in_store(archive_store.clone()),
                    archived.clone(),
                    live_assoc.name,
                ));
            }

            move_keyed(&mut inner.grants, member, &archived);
            move_denials(&mut inner.denied_read, member, &archived);
            inner.nodes.insert(archived, record);
        }

        events
    }

    /// Simulate the repository restoring an archived subtree to its original
    /// location. Returns the restore events, root first.
    pub fn restore(&self, archived_node: &NodeId) -> Vec<ChildAssoc> {
        let mut inner = self.inner.borrow_mut();

        let original_assoc = inner
            .nodes
            .get(archived_node)
            .and_then(|record| {
                record
                    .properties
                    .assoc(PROP_ARCHIVED_ORIGINAL_PARENT)
                    .cloned()
            })
            .expect("archived root carries its original parent association");
        let live_store = original_assoc.child.store.clone();

        let subtree = subtree_of(&inner.nodes, archived_node);
        let mut events = Vec::with_capacity(subtree.len());

        for (index, member) in subtree.iter().enumerate() {
            let mut record = inner.nodes.remove(member).expect("subtree node exists");
            let restored = member.in_store(live_store.clone());

            let assoc = if index == 0 {
                record.aspects.remove(ASPECT_ARCHIVED);
                record.properties.remove(PROP_ARCHIVED_BY);
                record.properties.remove(PROP_ARCHIVED_DATE);
                record.properties.remove(PROP_ARCHIVED_ORIGINAL_PARENT);
                original_assoc.clone()
            } else {
                let archived_assoc = record.parent.clone().expect("descendant has a parent");
                ChildAssoc::new(
                    archived_assoc.parent.in_store(live_store.clone()),
                    restored.clone(),
                    archived_assoc.name,
                )
            };

            record.parent = Some(assoc.clone());
            events.push(assoc);

            move_keyed(&mut inner.grants, member, &restored);
            move_denials(&mut inner.denied_read, member, &restored);
            inner.nodes.insert(restored, record);
        }

        events
    }

    /// Drop a node entirely, as a purge or an out-of-band deletion would.
    pub fn remove_node(&self, node: &NodeId) {
        self.inner.borrow_mut().nodes.remove(node);
    }

    fn next_node(&self, store: &StoreId) -> NodeId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        NodeId::new(store.clone(), format!("n{:04}", inner.next_id))
    }
}

/// Collect a node and all its descendants, root first, in stable order.
fn subtree_of(nodes: &HashMap<NodeId, NodeRecord>, root: &NodeId) -> Vec<NodeId> {
    let mut ordered = vec![root.clone()];
    let mut index = 0;
    while index < ordered.len() {
        let current = ordered[index].clone();
        let mut children: Vec<NodeId> = nodes
            .iter()
            .filter(|(_, record)| {
                record
                    .parent
                    .as_ref()
                    .is_some_and(|assoc| assoc.parent == current)
            })
            .map(|(id, _)| id.clone())
            .collect();
        children.sort();
        ordered.extend(children);
        index += 1;
    }
    ordered
}

fn move_keyed<T>(map: &mut HashMap<NodeId, T>, from: &NodeId, to: &NodeId) {
    if let Some(value) = map.remove(from) {
        map.insert(to.clone(), value);
    }
}

fn move_denials(denials: &mut HashSet<(NodeId, Principal)>, from: &NodeId, to: &NodeId) {
    let moved: Vec<_> = denials
        .iter()
        .filter(|(node, _)| node == from)
        .cloned()
        .collect();
    for (node, principal) in moved {
        denials.remove(&(node, principal.clone()));
        denials.insert((to.clone(), principal));
    }
}

impl NodeStore for MemoryRepo {
    type Error = Infallible;

    async fn exists(&self, node: &NodeId) -> Result<bool, Self::Error> {
        Ok(self.inner.borrow().nodes.contains_key(node))
    }

    async fn properties(&self, node: &NodeId) -> Result<Option<PropertyMap>, Self::Error> {
        Ok(self
            .inner
            .borrow()
            .nodes
            .get(node)
            .map(|record| record.properties.clone()))
    }

    async fn primary_parent(&self, node: &NodeId) -> Result<Option<ChildAssoc>, Self::Error> {
        Ok(self
            .inner
            .borrow()
            .nodes
            .get(node)
            .and_then(|record| record.parent.clone()))
    }

    async fn has_aspect(&self, node: &NodeId, aspect: &str) -> Result<bool, Self::Error> {
        Ok(self
            .inner
            .borrow()
            .nodes
            .get(node)
            .is_some_and(|record| record.aspects.contains(aspect)))
    }

    async fn add_aspect(
        &self,
        node: &NodeId,
        aspect: &str,
        properties: PropertyMap,
    ) -> Result<(), Self::Error> {
        let mut inner = self.inner.borrow_mut();
        if let Some(record) = inner.nodes.get_mut(node) {
            record.aspects.insert(aspect.to_owned());
            let mut keys = Vec::new();
            for (key, value) in properties {
                keys.push(key.clone());
                record.properties.insert(key, value);
            }
            record.aspect_properties.insert(aspect.to_owned(), keys);
        }
        Ok(())
    }

    async fn remove_aspect(&self, node: &NodeId, aspect: &str) -> Result<(), Self::Error> {
        let mut inner = self.inner.borrow_mut();
        if let Some(record) = inner.nodes.get_mut(node) {
            record.aspects.remove(aspect);
            if let Some(keys) = record.aspect_properties.remove(aspect) {
                for key in keys {
                    record.properties.remove(&key);
                }
            }
        }
        Ok(())
    }

    async fn display_path(&self, node: &NodeId) -> Result<String, Self::Error> {
        let inner = self.inner.borrow();
        let mut segments = Vec::new();
        let mut current = Some(node.clone());
        while let Some(id) = current {
            let Some(record) = inner.nodes.get(&id) else {
                break;
            };
            if let Some(name) = record.properties.text(PROP_NAME) {
                segments.insert(0, name.to_owned());
            }
            current = record.parent.as_ref().map(|assoc| assoc.parent.clone());
        }
        Ok(format!("/{}", segments.join("/")))
    }
}

impl AccessControl for MemoryRepo {
    type Error = Infallible;

    async fn evaluate_read(
        &self,
        node: &NodeId,
        caller: &Principal,
    ) -> Result<AccessStatus, Self::Error> {
        let denied = self
            .inner
            .borrow()
            .denied_read
            .contains(&(node.clone(), caller.clone()));
        Ok(if denied {
            AccessStatus::Denied
        } else {
            AccessStatus::Allowed
        })
    }

    async fn explicit_grants(&self, node: &NodeId) -> Result<Vec<AccessGrant>, Self::Error> {
        Ok(self.grants(node))
    }

    async fn grant(
        &self,
        node: &NodeId,
        principal: &Principal,
        capability: Capability,
        allow: bool,
    ) -> Result<(), Self::Error> {
        let mut inner = self.inner.borrow_mut();
        let grants = inner.grants.entry(node.clone()).or_default();
        grants.retain(|grant| {
            !(grant.principal == *principal && grant.capability == capability)
        });
        grants.push(if allow {
            AccessGrant::allowed(principal.clone(), capability)
        } else {
            AccessGrant::denied(principal.clone(), capability)
        });
        Ok(())
    }

    async fn revoke(
        &self,
        node: &NodeId,
        principal: &Principal,
        capability: Capability,
    ) -> Result<(), Self::Error> {
        let mut inner = self.inner.borrow_mut();
        if let Some(grants) = inner.grants.get_mut(node) {
            grants.retain(|grant| {
                !(grant.principal == *principal && grant.capability == capability)
            });
        }
        Ok(())
    }
}

impl ArchiveDirectory for MemoryRepo {
    type Error = Infallible;

    async fn archive_root(&self, store: &StoreId) -> Result<Option<NodeId>, Self::Error> {
        Ok(self
            .inner
            .borrow()
            .archives
            .get(store)
            .map(|(_, root)| root.clone()))
    }

    async fn archived_equivalent(&self, node: &NodeId) -> Result<Option<NodeId>, Self::Error> {
        Ok(self
            .inner
            .borrow()
            .archives
            .get(&node.store)
            .map(|(archive_store, _)| node.in_store(archive_store.clone())))
    }
}

impl ProfileStore for MemoryRepo {
    type Error = Infallible;

    async fn profile(&self, user: &Principal) -> Result<Option<UserProfile>, Self::Error> {
        let mut inner = self.inner.borrow_mut();
        inner.profile_lookups += 1;
        Ok(inner.profiles.get(user).cloned())
    }
}
