// SPDX-License-Identifier: MIT OR Apache-2.0

//! Display information for the users referenced by archived items.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::access::Principal;
use crate::traits::ProfileStore;

/// Literal account name of the repository's system user. Tenant deployments
/// suffix it with `@<tenant>`.
const SYSTEM_USER_NAME: &str = "System";

/// Profile data of a known user.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Renderable user information for a trash entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UserDisplay {
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: String,
}

/// Memoization of resolved user display objects.
///
/// Scoped to one resolution batch, not globally: repeated users within one
/// paginated result set are resolved once, while profile changes become
/// visible on the next request.
#[derive(Debug, Default)]
pub struct UserDisplayCache(HashMap<Principal, UserDisplay>);

impl UserDisplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn resolve<P>(
        &mut self,
        profiles: &P,
        user: &Principal,
    ) -> Result<UserDisplay, P::Error>
    where
        P: ProfileStore,
    {
        if let Some(display) = self.0.get(user) {
            return Ok(display.clone());
        }

        let profile = profiles.profile(user).await?;
        let display = build_user_display(user, profile);
        self.0.insert(user.clone(), display.clone());

        Ok(display)
    }
}

fn build_user_display(user: &Principal, profile: Option<UserProfile>) -> UserDisplay {
    match profile {
        Some(profile) => {
            let first_name = profile
                .first_name
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();
            let last_name = profile
                .last_name
                .as_deref()
                .map(str::trim)
                .unwrap_or_default();

            let display_name = match (first_name.is_empty(), last_name.is_empty()) {
                (false, false) => format!("{} {}", first_name, last_name),
                (false, true) => first_name.to_owned(),
                (true, false) => last_name.to_owned(),
                (true, true) => user.as_str().to_owned(),
            };

            UserDisplay {
                user_name: user.as_str().to_owned(),
                first_name: Some(first_name.to_owned()),
                last_name: Some(last_name.to_owned()),
                display_name,
            }
        }
        None if is_system_user(user.as_str()) => UserDisplay {
            user_name: user.as_str().to_owned(),
            first_name: Some("System".to_owned()),
            last_name: Some("User".to_owned()),
            display_name: "System User".to_owned(),
        },
        None => UserDisplay {
            user_name: user.as_str().to_owned(),
            first_name: None,
            last_name: None,
            display_name: user.as_str().to_owned(),
        },
    }
}

/// The literal system account name, optionally carrying a tenant qualifier.
fn is_system_user(user: &str) -> bool {
    match user.strip_prefix(SYSTEM_USER_NAME) {
        Some("") => true,
        Some(rest) => rest.starts_with('@') && rest.len() > 1,
        None => false,
    }
}
