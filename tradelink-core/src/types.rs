//! Core data type definitions

use serde::{Deserialize, Serialize};

/// Persisted credentials of the signed-in user
///
/// Access and refresh tokens travel as a pair: every writer sets or clears
/// both of them together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
}

impl Session {
    /// A session exists only once a non-empty access token is stored
    pub fn has_access_token(&self) -> bool {
        self.access_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.user_id.is_none()
    }
}

/// Marketplace role a user asked to act as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Seller,
    Wholesaler,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Seller => write!(f, "seller"),
            UserRole::Wholesaler => write!(f, "wholesaler"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "seller" => Ok(UserRole::Seller),
            "wholesaler" => Ok(UserRole::Wholesaler),
            _ => Err(format!("Unknown user role: {}", s)),
        }
    }
}

/// Backend-tracked approval state of the requested role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleStatus {
    NotRequested,
    Pending,
    Accepted,
    /// Produced when the backend reports a boolean `approved: true`
    Approved,
    Rejected,
    Error,
}

impl RoleStatus {
    /// Statuses that grant access to role-gated pages
    pub fn is_granted(&self) -> bool {
        matches!(self, RoleStatus::Accepted | RoleStatus::Approved)
    }
}

impl std::fmt::Display for RoleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoleStatus::NotRequested => write!(f, "not_requested"),
            RoleStatus::Pending => write!(f, "pending"),
            RoleStatus::Accepted => write!(f, "accepted"),
            RoleStatus::Approved => write!(f, "approved"),
            RoleStatus::Rejected => write!(f, "rejected"),
            RoleStatus::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for RoleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "not_requested" => Ok(RoleStatus::NotRequested),
            "pending" => Ok(RoleStatus::Pending),
            "accepted" => Ok(RoleStatus::Accepted),
            "approved" => Ok(RoleStatus::Approved),
            "rejected" => Ok(RoleStatus::Rejected),
            "error" => Ok(RoleStatus::Error),
            _ => Err(format!("Unknown role status: {}", s)),
        }
    }
}

/// States of the authentication machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    #[default]
    Idle,
    Authenticating,
    Authenticated,
    Unauthenticated,
    Error,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthState::Idle => write!(f, "idle"),
            AuthState::Authenticating => write!(f, "authenticating"),
            AuthState::Authenticated => write!(f, "authenticated"),
            AuthState::Unauthenticated => write!(f, "unauthenticated"),
            AuthState::Error => write!(f, "error"),
        }
    }
}

/// Where a page has to go instead of rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectTarget {
    /// Login entry point; the session is gone or was never there
    Login,
    /// Waiting page showing the role approval status (soft redirect)
    RoleStatus,
}

impl std::fmt::Display for RedirectTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RedirectTarget::Login => write!(f, "login"),
            RedirectTarget::RoleStatus => write!(f, "role_status"),
        }
    }
}

/// Outcome of an authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequiredAction {
    Allow,
    Redirect(RedirectTarget),
}

impl RequiredAction {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RequiredAction::Allow)
    }
}
