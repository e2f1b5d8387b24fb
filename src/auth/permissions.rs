//! Permission, role and principal record types
//!
//! These types mirror the records served by the clinical records backend.
//! They are deserialized straight from the wire and then held as immutable
//! snapshots by the [`PermissionService`](crate::auth::PermissionService).
//!
//! Permission codes follow the `"<resource>.<action>"` convention, for
//! example `"patient.create"` or `"document.upload"`. Matching is always an
//! exact, case-sensitive string comparison: `"patient.*"` is just another code
//! and never implies `"patient.create"`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a backend record
///
/// Depending on the deployment, the backend hands out either integer
/// primary keys or UUID strings. Both are accepted and kept as-is.
///
/// # Examples
///
/// ```rust
/// use clinic_access::auth::permissions::RecordId;
///
/// let numeric: RecordId = serde_json::from_str("42").unwrap();
/// let text: RecordId = serde_json::from_str("\"6f1c\"").unwrap();
///
/// assert_eq!(numeric.to_string(), "42");
/// assert_eq!(text.to_string(), "6f1c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Numeric(id) => write!(f, "{}", id),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Numeric(id)
    }
}

impl From<i32> for RecordId {
    fn from(id: i32) -> Self {
        RecordId::Numeric(i64::from(id))
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId::Text(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

/// Atomic authorization unit
///
/// `code` is unique within a tenant and is the primary lookup key.
/// `tenant_id` is only present in the admin-management variant of the
/// record; `None` marks a global permission visible across tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: RecordId,
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<RecordId>,
}

impl Permission {
    /// Build a permission for `resource`/`action` with a conventional code
    ///
    /// Mostly useful in tests and fixtures; the name doubles as description.
    pub fn new(id: impl Into<RecordId>, resource: &str, action: &str) -> Self {
        let code = PermissionCode::build(resource, action);
        Self {
            id: id.into(),
            name: code.clone(),
            description: String::new(),
            code,
            resource: resource.to_string(),
            action: action.to_string(),
            created_at: None,
            tenant_id: None,
        }
    }

    /// Whether this is a global permission shared by every tenant
    pub fn is_global(&self) -> bool {
        self.tenant_id.is_none()
    }
}

/// Named bundle of permissions assigned to a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<Permission>,
    /// System-defined roles cannot be deleted
    #[serde(default)]
    pub is_system_role: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Role {
    pub fn new(id: impl Into<RecordId>, name: &str, permissions: Vec<Permission>) -> Self {
        Self {
            id: id.into(),
            name: name.to_string(),
            description: String::new(),
            permissions,
            is_system_role: false,
            created_at: None,
        }
    }

    /// Exact-match lookup of a permission code in this role
    pub fn grants(&self, code: &str) -> bool {
        self.permissions.iter().any(|p| p.code == code)
    }
}

/// The authenticated actor whose permissions are evaluated
///
/// A principal holds at most one role. `is_superuser` bypasses every
/// check, including when no role is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: RecordId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub role: Option<Role>,
}

impl Principal {
    /// Regular principal with the given role
    pub fn with_role(id: impl Into<RecordId>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            is_superuser: false,
            is_staff: false,
            role: Some(role),
        }
    }

    /// Principal without any role
    pub fn without_role(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            is_superuser: false,
            is_staff: false,
            role: None,
        }
    }

    /// Superuser principal, optionally carrying a role
    pub fn superuser(id: impl Into<RecordId>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            username: None,
            email: None,
            is_superuser: true,
            is_staff: true,
            role,
        }
    }

    /// Permissions granted through the assigned role, empty without one
    pub fn permissions(&self) -> &[Permission] {
        self.role
            .as_ref()
            .map(|role| role.permissions.as_slice())
            .unwrap_or(&[])
    }
}

/// Helpers for the `"<resource>.<action>"` code convention
pub struct PermissionCode;

impl PermissionCode {
    /// Join resource and action into a permission code
    ///
    /// ```rust
    /// use clinic_access::auth::permissions::PermissionCode;
    ///
    /// assert_eq!(PermissionCode::build("patient", "create"), "patient.create");
    /// ```
    pub fn build(resource: &str, action: &str) -> String {
        format!("{}.{}", resource, action)
    }

    /// Split a code into `(resource, action)` at the first `.`
    ///
    /// Returns `None` when the code has no separator or either half is empty.
    pub fn split(code: &str) -> Option<(&str, &str)> {
        let (resource, action) = code.split_once('.')?;
        if resource.is_empty() || action.is_empty() {
            return None;
        }
        Some((resource, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_code_build() {
        assert_eq!(PermissionCode::build("document", "read"), "document.read");
        assert_eq!(PermissionCode::build("", ""), ".");
    }

    #[test]
    fn test_permission_code_split() {
        assert_eq!(PermissionCode::split("patient.create"), Some(("patient", "create")));
        assert_eq!(
            PermissionCode::split("report.export.pdf"),
            Some(("report", "export.pdf"))
        );
        assert_eq!(PermissionCode::split("patient"), None);
        assert_eq!(PermissionCode::split(".create"), None);
        assert_eq!(PermissionCode::split("patient."), None);
    }

    #[test]
    fn test_permission_new_uses_convention() {
        let perm = Permission::new(1, "patient", "create");
        assert_eq!(perm.code, "patient.create");
        assert_eq!(perm.resource, "patient");
        assert_eq!(perm.action, "create");
        assert!(perm.is_global());
    }

    #[test]
    fn test_permission_deserializes_wire_shape() {
        let json = r#"{
            "id": 7,
            "code": "patient.create",
            "name": "Create patient",
            "description": "Register new patients",
            "resource": "patient",
            "action": "create",
            "created_at": "2024-03-01T10:00:00Z"
        }"#;

        let perm: Permission = serde_json::from_str(json).unwrap();
        assert_eq!(perm.id, RecordId::Numeric(7));
        assert_eq!(perm.name, "Create patient");
        assert!(perm.created_at.is_some());
        assert!(perm.tenant_id.is_none());
    }

    #[test]
    fn test_permission_with_tenant_and_uuid_id() {
        let json = r#"{
            "id": "0b9f6d2e-2f4a-4a53-9c1e-0d1f1e5b7c11",
            "code": "document.upload",
            "resource": "document",
            "action": "upload",
            "tenant_id": 3,
            "created_at": null
        }"#;

        let perm: Permission = serde_json::from_str(json).unwrap();
        assert!(matches!(perm.id, RecordId::Text(_)));
        assert_eq!(perm.tenant_id, Some(RecordId::Numeric(3)));
        assert!(!perm.is_global());
        assert_eq!(perm.name, "");
    }

    #[test]
    fn test_role_deserializes_wire_shape() {
        let json = r#"{
            "id": 2,
            "name": "Clinician",
            "description": "Front-line clinical staff",
            "permissions": [
                {"id": 1, "code": "patient.read", "resource": "patient", "action": "read"}
            ],
            "is_system_role": true,
            "created_at": "2024-01-15T08:30:00Z"
        }"#;

        let role: Role = serde_json::from_str(json).unwrap();
        assert!(role.is_system_role);
        assert!(role.grants("patient.read"));
        assert!(!role.grants("patient.READ"));
    }

    #[test]
    fn test_principal_defaults_flags() {
        let principal: Principal = serde_json::from_str(r#"{"id": 10, "role": null}"#).unwrap();
        assert!(!principal.is_superuser);
        assert!(!principal.is_staff);
        assert!(principal.role.is_none());
        assert!(principal.permissions().is_empty());
    }

    #[test]
    fn test_role_grants_is_exact_match() {
        let role = Role::new(1, "Wildcard", vec![Permission::new(1, "patient", "*")]);
        assert!(role.grants("patient.*"));
        assert!(!role.grants("patient.create"));
    }
}
