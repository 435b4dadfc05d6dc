//! Role authorization policy
//!
//! Decides whether an authenticated user may stay on a page or has to be sent
//! to the role-status waiting page.

use serde::{Deserialize, Serialize};
use tradelink_core::{RedirectTarget, RequiredAction, RoleStatus, UserRole};

/// What a page requires from the signed-in user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAuthorizationPolicy {
    /// Role the page is restricted to; `None` accepts any approved role
    pub required_role: Option<UserRole>,
    /// Set by the role-status page itself, which must never be redirected to
    /// itself
    pub skip_role_redirect: bool,
}

impl RoleAuthorizationPolicy {
    pub fn new(required_role: Option<UserRole>, skip_role_redirect: bool) -> Self {
        Self {
            required_role,
            skip_role_redirect,
        }
    }

    /// Policy for a page restricted to one role
    pub fn for_role(role: UserRole) -> Self {
        Self::new(Some(role), false)
    }

    /// Policy for pages that render their own role status
    pub fn skip_redirect() -> Self {
        Self::new(None, true)
    }

    /// Decide for an authenticated user
    pub fn decide(
        &self,
        resolved_role: Option<UserRole>,
        resolved_status: Option<RoleStatus>,
    ) -> RequiredAction {
        if self.skip_role_redirect {
            return RequiredAction::Allow;
        }

        let status_granted = resolved_status.is_some_and(|status| status.is_granted());
        let role_matches = match self.required_role {
            None => true,
            Some(required) => resolved_role == Some(required),
        };

        if status_granted && role_matches {
            RequiredAction::Allow
        } else {
            RequiredAction::Redirect(RedirectTarget::RoleStatus)
        }
    }
}
