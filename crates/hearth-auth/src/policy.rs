//! Permission gate for UI affordances.
//!
//! Permission sets are fetched from the server alongside the objects they
//! describe. These lookups only decide whether to offer an action; the
//! server remains the authority and re-checks every mutation.

use serde::{Deserialize, Serialize};

/// Server verdict attached to a permission entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationStatus {
    pub authorized: bool,

    /// Why the action is unavailable, suitable for a tooltip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuthorizationStatus {
    pub fn allowed() -> Self {
        Self {
            authorized: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            authorized: false,
            reason: Some(reason.into()),
        }
    }
}

/// Permission on one named input of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputPermission {
    pub path: String,

    /// Absent means the input is permitted.
    #[serde(default)]
    pub is_authorized: Option<AuthorizationStatus>,
}

impl InputPermission {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        status_allows(self.is_authorized.as_ref())
    }
}

/// Permission on a named action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPermission {
    #[serde(alias = "name")]
    pub action: String,

    /// Absent means the action is permitted.
    #[serde(default)]
    pub is_authorized: Option<AuthorizationStatus>,

    #[serde(default)]
    pub input_permissions: Vec<InputPermission>,
}

impl ActionPermission {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        status_allows(self.is_authorized.as_ref())
    }

    /// Reason the action is unavailable, if the server gave one.
    pub fn denial_reason(&self) -> Option<&str> {
        self.is_authorized
            .as_ref()
            .filter(|s| !s.authorized)
            .and_then(|s| s.reason.as_deref())
    }
}

/// Result of [`has_action_permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionPermissionCheck<'a> {
    pub authorized: bool,
    pub action_permission: Option<&'a ActionPermission>,
}

/// Result of [`has_input_permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPermissionCheck {
    pub authorized: bool,
}

/// Looks up `action` in `permissions`.
///
/// An action missing from the set is not authorized.
pub fn has_action_permission<'a>(
    permissions: &'a [ActionPermission],
    action: &str,
) -> ActionPermissionCheck<'a> {
    let action_permission = permissions.iter().find(|p| p.action == action);
    ActionPermissionCheck {
        authorized: action_permission.is_some_and(ActionPermission::is_allowed),
        action_permission,
    }
}

/// Looks up `input` in `input_permissions`.
///
/// An input missing from the set is not authorized.
pub fn has_input_permission(input_permissions: &[InputPermission], input: &str) -> InputPermissionCheck {
    InputPermissionCheck {
        authorized: input_permissions
            .iter()
            .find(|p| p.path == input)
            .is_some_and(InputPermission::is_allowed),
    }
}

fn status_allows(status: Option<&AuthorizationStatus>) -> bool {
    status.is_none_or(|s| s.authorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn permissions() -> Vec<ActionPermission> {
        serde_json::from_value(json!([
            { "name": "updatePost", "isAuthorized": { "authorized": true } },
            {
                "name": "updateNetwork",
                "isAuthorized": { "authorized": false, "reason": "Admins only" },
                "inputPermissions": [{ "path": "input.name" }]
            },
            {
                "action": "updateSpaceMemberRole",
                "inputPermissions": [
                    { "path": "input.roleId", "isAuthorized": { "authorized": true } },
                    { "path": "input.memberId", "isAuthorized": { "authorized": false } }
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_authorized_action() {
        let perms = permissions();
        let check = has_action_permission(&perms, "updatePost");
        assert!(check.authorized);
        assert_eq!(check.action_permission.unwrap().action, "updatePost");
    }

    #[test]
    fn test_denied_action_keeps_entry() {
        let perms = permissions();
        let check = has_action_permission(&perms, "updateNetwork");
        assert!(!check.authorized);
        let entry = check.action_permission.unwrap();
        assert_eq!(entry.denial_reason(), Some("Admins only"));
    }

    #[test]
    fn test_unknown_action() {
        let perms = permissions();
        let check = has_action_permission(&perms, "deleteNetwork");
        assert!(!check.authorized);
        assert!(check.action_permission.is_none());
        assert!(!has_action_permission(&[], "updatePost").authorized);
    }

    #[test]
    fn test_absent_status_authorizes() {
        let perms = permissions();
        let check = has_action_permission(&perms, "updateSpaceMemberRole");
        assert!(check.authorized);
        assert_eq!(check.action_permission.unwrap().denial_reason(), None);
    }

    #[test]
    fn test_input_permissions() {
        let perms = permissions();
        let inputs = &has_action_permission(&perms, "updateSpaceMemberRole")
            .action_permission
            .unwrap()
            .input_permissions;

        assert!(has_input_permission(inputs, "input.roleId").authorized);
        assert!(!has_input_permission(inputs, "input.memberId").authorized);
        assert!(!has_input_permission(inputs, "input.other").authorized);

        let network = &perms[1].input_permissions;
        assert!(has_input_permission(network, "input.name").authorized);
    }

    #[test]
    fn test_status_constructors() {
        assert!(AuthorizationStatus::allowed().authorized);
        let denied = AuthorizationStatus::denied("nope");
        assert!(!denied.authorized);
        assert_eq!(denied.reason.as_deref(), Some("nope"));
    }
}
