// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content-model keys and archival provenance.
//!
//! The repository writes the archived aspect and the provenance properties
//! onto the root of a subtree at the moment it is moved into the archive.
//! Descendants of that root carry neither. The grant-marker aspect and its
//! `grantedTo` property are owned by this crate: they record that the
//! access-synchronisation behaviour added an explicit read grant which must
//! be cleaned up again on restore.

use serde::{Deserialize, Serialize};

use crate::access::Principal;
use crate::node::{ChildAssoc, PropertyMap};

/// Aspect marking the root node of an archived subtree.
pub const ASPECT_ARCHIVED: &str = "sys:archived";

/// User who performed the archive operation. Present only on archive roots.
pub const PROP_ARCHIVED_BY: &str = "sys:archivedBy";

/// Timestamp of the archive operation. Present only on archive roots.
pub const PROP_ARCHIVED_DATE: &str = "sys:archivedDate";

/// Association the node had to its parent before archiving.
pub const PROP_ARCHIVED_ORIGINAL_PARENT: &str = "sys:archivedOriginalParentAssoc";

/// Human-readable node name.
pub const PROP_NAME: &str = "cm:name";

/// User who last modified the node.
pub const PROP_MODIFIER: &str = "cm:modifier";

/// Marker aspect recording that trash management granted an explicit read
/// permission on this node. At most one marker per node; its presence is
/// authoritative for cleanup on restore and must never be read as a general
/// permission record.
pub const ASPECT_READ_ACCESS_GRANTED: &str = "trash:userReadAccessGranted";

/// Principal the explicit read grant was added for.
pub const PROP_READ_ACCESS_GRANTED_TO: &str = "trash:readAccessGrantedTo";

/// Archival provenance of a subtree root: who archived it, when, and where
/// it lived before.
///
/// All fields are optional because inconsistent repository data must degrade
/// to "unknown" rather than fail. A non-absent `archived_by` is the signal
/// that the carrying node is a genuine archive root.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub archived_by: Option<Principal>,
    pub archived_on: Option<u64>,
    pub original_parent: Option<ChildAssoc>,
}

impl Provenance {
    /// Extract provenance from a node's properties.
    pub fn from_properties(properties: &PropertyMap) -> Self {
        Self {
            archived_by: properties
                .text(PROP_ARCHIVED_BY)
                .map(|user| Principal::new(user)),
            archived_on: properties.timestamp(PROP_ARCHIVED_DATE),
            original_parent: properties.assoc(PROP_ARCHIVED_ORIGINAL_PARENT).cloned(),
        }
    }

    /// Whether the properties these were read from belong to an archive root.
    pub fn is_archive_root(&self) -> bool {
        self.archived_by.is_some()
    }
}
