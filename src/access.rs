// SPDX-License-Identifier: MIT OR Apache-2.0

//! Principals, access evaluation results and explicitly set grants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An authority permissions can be evaluated for or granted to: a user name
/// or a group identifier.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of evaluating a capability on a node for a caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AccessStatus {
    Allowed,
    Denied,
}

impl AccessStatus {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessStatus::Allowed)
    }
}

/// Capabilities that can be granted on a node.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum Capability {
    Read,
    Write,
    Delete,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Delete => "delete",
        };

        write!(f, "{}", s)
    }
}

/// An explicitly set permission entry on a node.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub principal: Principal,
    pub capability: Capability,
    pub status: AccessStatus,
}

impl AccessGrant {
    pub fn allowed(principal: Principal, capability: Capability) -> Self {
        Self {
            principal,
            capability,
            status: AccessStatus::Allowed,
        }
    }

    pub fn denied(principal: Principal, capability: Capability) -> Self {
        Self {
            principal,
            capability,
            status: AccessStatus::Denied,
        }
    }

    /// Whether this entry is an ALLOWED read grant for the given principal.
    pub fn allows_read_for(&self, principal: &Principal) -> bool {
        self.status.is_allowed()
            && self.capability == Capability::Read
            && &self.principal == principal
    }
}
