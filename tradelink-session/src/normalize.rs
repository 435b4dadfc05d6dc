//! Backend response normalization
//!
//! The backend answers with flat (`{status, role}`) or nested (`{data: {...}}`)
//! shapes and two spellings of token keys. Everything shape-dependent lives here.

use serde_json::Value;
use tradelink_core::{RoleStatus, UserRole};

/// Role and approval status resolved from a role-status response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleStatusInfo {
    pub role: Option<UserRole>,
    /// `None` when the backend reported a status this client does not know
    pub status: Option<RoleStatus>,
}

/// Token pair minted by the refresh or OTP verification endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    /// Non-rotating backends only return a new access token
    pub refresh: Option<String>,
}

/// Look a field up at the top level first, then under `data`
fn field<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    body.get(key)
        .or_else(|| body.get("data").and_then(|data| data.get(key)))
}

fn string_field(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| field(body, key))
        .find_map(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Normalize a role-status response
///
/// A string `status` is taken as is. Without one, the status is derived from
/// `approved`: `true` is approved, `null` is not requested, anything else
/// (including a missing field) is pending.
pub fn normalize_role_status(body: &Value) -> RoleStatusInfo {
    let status = match field(body, "status") {
        Some(Value::String(status)) => status.parse::<RoleStatus>().ok(),
        _ => match field(body, "approved") {
            Some(Value::Bool(true)) => Some(RoleStatus::Approved),
            Some(Value::Null) => Some(RoleStatus::NotRequested),
            _ => Some(RoleStatus::Pending),
        },
    };

    let role = field(body, "role")
        .and_then(Value::as_str)
        .and_then(|role| role.parse::<UserRole>().ok());

    RoleStatusInfo { role, status }
}

/// Extract a token pair, accepting `access`/`refresh` and
/// `access_token`/`refresh_token`
pub fn extract_token_pair(body: &Value) -> Option<TokenPair> {
    let access = string_field(body, &["access", "access_token"])?;
    let refresh = string_field(body, &["refresh", "refresh_token"]);

    Some(TokenPair { access, refresh })
}

/// Extract the user id from `user_id`, `id` or `user.id`, numeric or string
pub fn extract_user_id(body: &Value) -> Option<String> {
    let value = field(body, "user_id")
        .or_else(|| field(body, "user").and_then(|user| user.get("id")))
        .or_else(|| field(body, "id"))?;

    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_role_status() {
        let info = normalize_role_status(&json!({ "status": "accepted", "role": "wholesaler" }));

        assert_eq!(info.status, Some(RoleStatus::Accepted));
        assert_eq!(info.role, Some(UserRole::Wholesaler));
    }

    #[test]
    fn test_nested_role_with_derived_status() {
        let approved = normalize_role_status(&json!({
            "approved": true,
            "data": { "role": "Seller" }
        }));
        assert_eq!(approved.status, Some(RoleStatus::Approved));
        assert_eq!(approved.role, Some(UserRole::Seller));

        let never_requested = normalize_role_status(&json!({ "approved": null, "data": {} }));
        assert_eq!(never_requested.status, Some(RoleStatus::NotRequested));
        assert_eq!(never_requested.role, None);

        let waiting = normalize_role_status(&json!({ "approved": false }));
        assert_eq!(waiting.status, Some(RoleStatus::Pending));
    }

    #[test]
    fn test_unknown_status_is_not_treated_as_accepted() {
        let info = normalize_role_status(&json!({ "status": "on_hold", "role": "seller" }));

        assert_eq!(info.status, None);
        assert_eq!(info.role, Some(UserRole::Seller));
    }

    #[test]
    fn test_token_pair_key_variants() {
        let short = extract_token_pair(&json!({ "access": "a1", "refresh": "r1" })).unwrap();
        assert_eq!(short.access, "a1");
        assert_eq!(short.refresh.as_deref(), Some("r1"));

        let long = extract_token_pair(&json!({
            "data": { "access_token": "a2", "refresh_token": "r2" }
        }))
        .unwrap();
        assert_eq!(long.access, "a2");
        assert_eq!(long.refresh.as_deref(), Some("r2"));

        let access_only = extract_token_pair(&json!({ "access": "a3" })).unwrap();
        assert_eq!(access_only.refresh, None);

        assert!(extract_token_pair(&json!({ "message": "Invalid JSON response" })).is_none());
        assert!(extract_token_pair(&json!({ "access": "" })).is_none());
    }

    #[test]
    fn test_user_id_shapes() {
        assert_eq!(extract_user_id(&json!({ "user_id": 12 })).as_deref(), Some("12"));
        assert_eq!(
            extract_user_id(&json!({ "user": { "id": "u-9" } })).as_deref(),
            Some("u-9")
        );
        assert_eq!(
            extract_user_id(&json!({ "data": { "id": 3 } })).as_deref(),
            Some("3")
        );
        assert_eq!(extract_user_id(&json!({ "access": "a" })), None);
    }
}
