// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access synchronisation on archive transitions.
//!
//! When a node becomes the root of an archived subtree the archiving user
//! receives an explicit read grant on it, recorded with a marker aspect.
//! Explicit permissions on the original node may only have been set for a
//! group the user can later be removed from, which would silently break
//! their ability to find their own trashed items (for example via an
//! external index); the per-node grant guarantees findability and gives a
//! precise undo point. On restore the grant and the marker are removed
//! again, exactly once per restore operation even when the restore cascades
//! over a whole subtree.

use thiserror::Error;
use tracing::{debug, warn};

use crate::access::{Capability, Principal};
use crate::context::TransactionContext;
use crate::model::{
    ASPECT_READ_ACCESS_GRANTED, PROP_ARCHIVED_BY, PROP_READ_ACCESS_GRANTED_TO,
};
use crate::node::{ChildAssoc, PropertyMap, PropertyValue};
use crate::traits::{AccessControl, ArchiveDirectory, NodeStore};

#[cfg(test)]
mod tests;

/// Working-set key for nodes already handled by the restore handler within
/// the current transaction.
///
/// A single key is shared by all instances of the behaviour; two independent
/// trash-management behaviours handed the same [`TransactionContext`] would
/// collide on it.
const RESTORED_NODES_KEY: &str = "trash_warden::sync::restored-nodes";

/// Errors raised by the access synchronisation behaviour.
///
/// Only genuine port failures surface here; ambiguous events and transient
/// repository inconsistencies are logged and skipped so the behaviour never
/// fails the enclosing delete or restore on its own.
#[derive(Debug, Error)]
pub enum AccessSyncError<N, A, D>
where
    N: std::error::Error,
    A: std::error::Error,
    D: std::error::Error,
{
    #[error("node store: {0}")]
    Nodes(N),

    #[error("access control: {0}")]
    Access(A),

    #[error("archive directory: {0}")]
    Archive(D),
}

/// State-triggered behaviour reacting to delete-to-archive and
/// restore-from-archive transition events.
///
/// The hosting runtime raises [`AccessSync::on_node_deleted`] and
/// [`AccessSync::on_node_restored`] once per affected node, which within one
/// logical user operation can mean many invocations (once per node of a
/// cascading delete or restore). Both handlers run inside the transaction of
/// the enclosing operation and piggyback on its atomicity.
#[derive(Clone, Debug)]
pub struct AccessSync<N, A, D> {
    nodes: N,
    access: A,
    archive: D,
}

impl<N, A, D> AccessSync<N, A, D>
where
    N: NodeStore,
    A: AccessControl,
    D: ArchiveDirectory,
{
    pub fn new(nodes: N, access: A, archive: D) -> Self {
        Self {
            nodes,
            access,
            archive,
        }
    }

    /// Handle a candidate archive transition.
    ///
    /// The `archived` flag delivered with the event is not reliable: it can
    /// be raised for operations which are no genuine archive-root moves,
    /// such as cascading restores. Genuineness is re-derived from the
    /// presence of the `archivedBy` property on the archived node, which the
    /// repository writes onto the subtree root at the moment of archiving
    /// and nowhere else.
    pub async fn on_node_deleted(
        &self,
        assoc: &ChildAssoc,
        archived: bool,
    ) -> Result<(), AccessSyncError<N::Error, A::Error, D::Error>> {
        let deleted = &assoc.child;

        if !archived {
            debug!(node = %deleted, "not handling deletion, not an archive operation");
            return Ok(());
        }

        let archive_root = self
            .archive
            .archive_root(&deleted.store)
            .await
            .map_err(AccessSyncError::Archive)?;
        if archive_root.is_none() {
            debug!(node = %deleted, "not handling deletion, store has no archive");
            return Ok(());
        }

        let Some(archived_node) = self
            .archive
            .archived_equivalent(deleted)
            .await
            .map_err(AccessSyncError::Archive)?
        else {
            warn!(node = %deleted, "no archived equivalent for node deleted in current txn");
            return Ok(());
        };

        // The event may fire before the archive move is visible; tolerated
        // and skipped, never fatal for the enclosing transaction.
        if !self
            .nodes
            .exists(&archived_node)
            .await
            .map_err(AccessSyncError::Nodes)?
        {
            warn!(
                node = %archived_node,
                "node known to have been archived in current txn does not exist"
            );
            return Ok(());
        }

        let properties = self
            .nodes
            .properties(&archived_node)
            .await
            .map_err(AccessSyncError::Nodes)?
            .unwrap_or_default();

        // Only a top-level archive move carries archivedBy on the node
        // itself at this point; cascade moves and restore-induced re-deletes
        // do not.
        let Some(archived_by) = properties.text(PROP_ARCHIVED_BY) else {
            debug!(node = %deleted, "not handling deletion, not an archive operation");
            return Ok(());
        };
        let archived_by = Principal::new(archived_by);

        let grants = self
            .access
            .explicit_grants(&archived_node)
            .await
            .map_err(AccessSyncError::Access)?;
        if grants.iter().any(|grant| grant.allows_read_for(&archived_by)) {
            return Ok(());
        }

        debug!(
            node = %archived_node,
            user = %archived_by,
            "adding explicit read permission to archived node"
        );
        self.access
            .grant(&archived_node, &archived_by, Capability::Read, true)
            .await
            .map_err(AccessSyncError::Access)?;

        let mut marker = PropertyMap::new();
        marker.insert(
            PROP_READ_ACCESS_GRANTED_TO,
            PropertyValue::Text(archived_by.as_str().to_owned()),
        );
        self.nodes
            .add_aspect(&archived_node, ASPECT_READ_ACCESS_GRANTED, marker)
            .await
            .map_err(AccessSyncError::Nodes)?;

        Ok(())
    }

    /// Handle a restore-from-archive transition.
    ///
    /// Only the root of a restore operation performs grant cleanup; cascade
    /// restores of descendants in the same transaction are recognised
    /// through the transaction-scoped working set and skipped.
    pub async fn on_node_restored(
        &self,
        txn: &mut TransactionContext,
        assoc: &ChildAssoc,
    ) -> Result<(), AccessSyncError<N::Error, A::Error, D::Error>> {
        let restored = &assoc.child;

        let archive_root = self
            .archive
            .archive_root(&restored.store)
            .await
            .map_err(AccessSyncError::Archive)?;
        if archive_root.is_none() {
            debug!(node = %restored, "not handling restoration, not a restore from archive");
            return Ok(());
        }

        // The parent of a cascade child is a node restored earlier in this
        // transaction. Restore events address it in the live tree while
        // earlier delete bookkeeping may know it by its archived reference,
        // so both are checked against the working set.
        let archived_parent = self
            .archive
            .archived_equivalent(&assoc.parent)
            .await
            .map_err(AccessSyncError::Archive)?;

        let restored_in_txn = txn.working_set(RESTORED_NODES_KEY);
        let parent_restored_in_txn = restored_in_txn.contains(&assoc.parent)
            || archived_parent
                .as_ref()
                .is_some_and(|parent| restored_in_txn.contains(parent));

        if parent_restored_in_txn {
            debug!(node = %restored, "not handling restoration, cascade of a parent restore");
        } else if self
            .nodes
            .has_aspect(restored, ASPECT_READ_ACCESS_GRANTED)
            .await
            .map_err(AccessSyncError::Nodes)?
        {
            let properties = self
                .nodes
                .properties(restored)
                .await
                .map_err(AccessSyncError::Nodes)?
                .unwrap_or_default();

            if let Some(granted_to) = properties.text(PROP_READ_ACCESS_GRANTED_TO) {
                let granted_to = Principal::new(granted_to);
                debug!(
                    node = %restored,
                    user = %granted_to,
                    "removing explicit read permission granted as part of trash management"
                );
                self.access
                    .revoke(restored, &granted_to, Capability::Read)
                    .await
                    .map_err(AccessSyncError::Access)?;
            } else {
                warn!(node = %restored, "grant marker present without grantedTo property");
            }

            self.nodes
                .remove_aspect(restored, ASPECT_READ_ACCESS_GRANTED)
                .await
                .map_err(AccessSyncError::Nodes)?;
        }

        // Recorded regardless of whether any cleanup fired, so cascade
        // children arriving later in this transaction are recognised.
        txn.working_set(RESTORED_NODES_KEY)
            .insert(restored.clone());

        Ok(())
    }
}
