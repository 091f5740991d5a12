// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata resolution for archived items.
//!
//! Archival provenance lives on the root of an archived subtree only. Given
//! any node within such a subtree the resolver climbs the ancestor chain
//! until it finds the provenance, assembling a display path on the way.
//! Ancestors the caller may not read are consulted through a narrow
//! fallback: their properties are used only when they carry the archived
//! aspect, only the provenance fields are taken from them, and their path
//! segment is the association's local name rather than the real node name.

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::access::Principal;
use crate::model::{ASPECT_ARCHIVED, PROP_MODIFIER, PROP_NAME, Provenance};
use crate::node::{NodeId, PropertyMap};
use crate::traits::{AccessControl, NodeStore, ProfileStore};

mod users;

pub use users::{UserDisplay, UserDisplayCache, UserProfile};

/// Path prefix used when the original location of an archived item is no
/// longer known, so a partial path is never mistaken for a complete one.
const UNKNOWN_LOCATION_SEGMENT: &str = "?";

/// Errors raised during metadata resolution.
///
/// These are genuine port failures only; inconsistent repository data
/// degrades to absent provenance fields instead.
#[derive(Debug, Error)]
pub enum ResolveError<N, A, P>
where
    N: std::error::Error,
    A: std::error::Error,
    P: std::error::Error,
{
    #[error("node store: {0}")]
    Nodes(N),

    #[error("access control: {0}")]
    Access(A),

    #[error("profile store: {0}")]
    Profiles(P),
}

/// Resolved metadata of one archived item, assembled for rendering.
///
/// Transient and per-request; never persisted. Absent provenance fields mean
/// "unknown", not failure.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TrashEntry {
    pub node: NodeId,
    pub modifier: Option<UserDisplay>,
    pub archiver: Option<UserDisplay>,
    pub archived_on: Option<u64>,
    pub display_path: String,
}

/// Resolver turning located nodes into [`TrashEntry`] records.
pub struct TrashResolver<N, A, P> {
    nodes: N,
    access: A,
    profiles: P,
}

impl<N, A, P> TrashResolver<N, A, P>
where
    N: NodeStore,
    A: AccessControl,
    P: ProfileStore,
{
    pub fn new(nodes: N, access: A, profiles: P) -> Self {
        Self {
            nodes,
            access,
            profiles,
        }
    }

    /// Resolve a batch of nodes, preserving input order.
    ///
    /// All entries of the batch share one [`UserDisplayCache`], so a user
    /// appearing on several items is looked up once.
    pub async fn resolve_batch(
        &self,
        nodes: &[NodeId],
        caller: &Principal,
    ) -> Result<Vec<TrashEntry>, ResolveError<N::Error, A::Error, P::Error>> {
        let mut users = UserDisplayCache::new();
        let mut entries = Vec::with_capacity(nodes.len());

        for node in nodes {
            entries.push(self.resolve(node, caller, &mut users).await?);
        }

        Ok(entries)
    }

    /// Resolve a single node known to lie within an archived subtree, either
    /// as its root or as a descendant.
    ///
    /// The cache is caller-owned so that external pagination drivers can
    /// share it across however they chunk one logical result set.
    pub async fn resolve(
        &self,
        node: &NodeId,
        caller: &Principal,
        users: &mut UserDisplayCache,
    ) -> Result<TrashEntry, ResolveError<N::Error, A::Error, P::Error>> {
        let properties = self
            .nodes
            .properties(node)
            .await
            .map_err(ResolveError::Nodes)?
            .unwrap_or_default();

        let modifier = properties.text(PROP_MODIFIER).map(Principal::new);
        let mut provenance = Provenance::from_properties(&properties);
        let mut segments: Vec<String> = Vec::new();

        // Walk up until an ancestor carrying provenance is found. When the
        // node itself is the archive root the loop runs zero iterations.
        let mut current = node.clone();
        while !provenance.is_archive_root() {
            let Some(assoc) = self
                .nodes
                .primary_parent(&current)
                .await
                .map_err(ResolveError::Nodes)?
            else {
                break;
            };
            let parent = assoc.parent.clone();

            let read_access = self
                .access
                .evaluate_read(&parent, caller)
                .await
                .map_err(ResolveError::Access)?;

            let (parent_properties, segment) = if read_access.is_allowed() {
                let parent_properties = self
                    .nodes
                    .properties(&parent)
                    .await
                    .map_err(ResolveError::Nodes)?
                    .unwrap_or_default();
                let segment = parent_properties
                    .text(PROP_NAME)
                    .map(str::to_owned)
                    .unwrap_or_else(|| assoc.name.clone());
                (parent_properties, segment)
            } else {
                // Elevated fallback, gated strictly on the ancestor being an
                // archive root itself. Only the provenance fields are taken
                // from it; the segment name must not leak the real name.
                let parent_properties = if self
                    .nodes
                    .has_aspect(&parent, ASPECT_ARCHIVED)
                    .await
                    .map_err(ResolveError::Nodes)?
                {
                    self.nodes
                        .properties(&parent)
                        .await
                        .map_err(ResolveError::Nodes)?
                        .unwrap_or_default()
                } else {
                    PropertyMap::new()
                };
                (parent_properties, assoc.name.clone())
            };

            provenance = Provenance::from_properties(&parent_properties);
            segments.insert(0, segment);
            current = parent;
        }

        if !provenance.is_archive_root() {
            debug!(node = %node, "no ancestor carries archival provenance");
        }

        let display_path = self.assemble_path(&provenance, segments).await?;

        let modifier = match &modifier {
            Some(user) => Some(
                users
                    .resolve(&self.profiles, user)
                    .await
                    .map_err(ResolveError::Profiles)?,
            ),
            None => None,
        };
        let archiver = match &provenance.archived_by {
            Some(user) => Some(
                users
                    .resolve(&self.profiles, user)
                    .await
                    .map_err(ResolveError::Profiles)?,
            ),
            None => None,
        };

        Ok(TrashEntry {
            node: node.clone(),
            modifier,
            archiver,
            archived_on: provenance.archived_on,
            display_path,
        })
    }

    /// Prefix the collected relative segments with the original location of
    /// the archived subtree, or with the unknown-location sentinel when that
    /// location is gone.
    async fn assemble_path(
        &self,
        provenance: &Provenance,
        segments: Vec<String>,
    ) -> Result<String, ResolveError<N::Error, A::Error, P::Error>> {
        let original_parent = provenance
            .original_parent
            .as_ref()
            .map(|assoc| assoc.parent.clone());

        let mut path = match original_parent {
            Some(parent)
                if self
                    .nodes
                    .exists(&parent)
                    .await
                    .map_err(ResolveError::Nodes)? =>
            {
                self.nodes
                    .display_path(&parent)
                    .await
                    .map_err(ResolveError::Nodes)?
            }
            _ => UNKNOWN_LOCATION_SEGMENT.to_owned(),
        };

        for segment in segments {
            path.push('/');
            path.push_str(&segment);
        }

        Ok(path)
    }
}
