// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trash management for hierarchical content repositories.
//!
//! Two subsystems keep a repository's "trash" usable:
//!
//! - [`sync`] keeps read-access permissions consistent as items move between
//!   the live tree and the archive: the archiving user receives an explicit,
//!   marker-recorded read grant on every subtree they archive, removed again
//!   exactly once when the subtree is restored.
//! - [`resolve`] turns nodes of archived subtrees into renderable entries,
//!   walking up to the nearest ancestor carrying archival provenance with a
//!   permission-aware fallback for ancestors the caller may not read.
//!
//! The repository itself (hierarchy, property storage, permission
//! evaluation, archive locations) is an external collaborator, consumed
//! through the ports in [`traits`].

pub mod access;
pub mod context;
pub mod model;
pub mod node;
pub mod resolve;
pub mod sync;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

pub use access::{AccessGrant, AccessStatus, Capability, Principal};
pub use context::TransactionContext;
pub use model::Provenance;
pub use node::{ChildAssoc, NodeId, PropertyMap, PropertyValue, StoreId};
pub use resolve::{
    ResolveError, TrashEntry, TrashResolver, UserDisplay, UserDisplayCache, UserProfile,
};
pub use sync::{AccessSync, AccessSyncError};
