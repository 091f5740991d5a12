// SPDX-License-Identifier: MIT OR Apache-2.0

//! Port contracts towards the hosting repository.
//!
//! All reads performed through [`NodeStore`] are system-privileged; caller
//! visibility is enforced by the consumers of these traits through
//! [`AccessControl::evaluate_read`]. Implementations are expected to run
//! inside the same transactional resource as the enclosing user operation.

use std::error::Error;

use crate::access::{AccessGrant, AccessStatus, Capability, Principal};
use crate::node::{ChildAssoc, NodeId, PropertyMap, StoreId};
use crate::resolve::UserProfile;

/// Interface for reading node state and annotating nodes with aspects.
pub trait NodeStore {
    type Error: Error;

    /// Query the existence of a node.
    fn exists(&self, node: &NodeId) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Get the property bag of a node.
    ///
    /// Returns `None` when the node does not exist.
    fn properties(
        &self,
        node: &NodeId,
    ) -> impl Future<Output = Result<Option<PropertyMap>, Self::Error>>;

    /// Get the primary parent association of a node.
    ///
    /// Returns `None` when the node is a store root or does not exist.
    fn primary_parent(
        &self,
        node: &NodeId,
    ) -> impl Future<Output = Result<Option<ChildAssoc>, Self::Error>>;

    /// Query whether a node carries an aspect marker.
    fn has_aspect(
        &self,
        node: &NodeId,
        aspect: &str,
    ) -> impl Future<Output = Result<bool, Self::Error>>;

    /// Attach an aspect marker together with the properties it unlocks.
    fn add_aspect(
        &self,
        node: &NodeId,
        aspect: &str,
        properties: PropertyMap,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Remove an aspect marker and the properties it unlocked.
    fn remove_aspect(
        &self,
        node: &NodeId,
        aspect: &str,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Render the human-readable repository path of a node, including the
    /// node's own name as the last segment.
    fn display_path(&self, node: &NodeId) -> impl Future<Output = Result<String, Self::Error>>;
}

/// Interface for evaluating and mutating permissions on a node.
pub trait AccessControl {
    type Error: Error;

    /// Evaluate read access on a node for the given caller.
    fn evaluate_read(
        &self,
        node: &NodeId,
        caller: &Principal,
    ) -> impl Future<Output = Result<AccessStatus, Self::Error>>;

    /// List the permission entries explicitly set on a node, excluding
    /// inherited ones.
    fn explicit_grants(
        &self,
        node: &NodeId,
    ) -> impl Future<Output = Result<Vec<AccessGrant>, Self::Error>>;

    /// Explicitly grant (or explicitly deny, when `allow` is false) a
    /// capability on a node.
    fn grant(
        &self,
        node: &NodeId,
        principal: &Principal,
        capability: Capability,
        allow: bool,
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Remove an explicitly set permission entry from a node.
    fn revoke(
        &self,
        node: &NodeId,
        principal: &Principal,
        capability: Capability,
    ) -> impl Future<Output = Result<(), Self::Error>>;
}

/// Mapping between live stores, their archive locations and node identities
/// across the two.
pub trait ArchiveDirectory {
    type Error: Error;

    /// Get the archive root node of a store.
    ///
    /// Returns `None` when the store has no archive location, meaning
    /// deletions from it are permanent.
    fn archive_root(
        &self,
        store: &StoreId,
    ) -> impl Future<Output = Result<Option<NodeId>, Self::Error>>;

    /// Map a live-tree node reference to its archived counterpart.
    ///
    /// The returned reference is an address; it may not (yet) exist in the
    /// repository.
    fn archived_equivalent(
        &self,
        node: &NodeId,
    ) -> impl Future<Output = Result<Option<NodeId>, Self::Error>>;
}

/// Interface for looking up user profile data.
pub trait ProfileStore {
    type Error: Error;

    /// Get the profile of a user.
    ///
    /// Returns `None` when no matching profile exists.
    fn profile(
        &self,
        user: &Principal,
    ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>>;
}
