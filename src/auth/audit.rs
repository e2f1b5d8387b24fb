use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::permissions::Principal;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub principal_id: String,
    pub code: String,
    pub allowed: bool,
    pub reason: String, // "superuser", "granted", "not_granted", "no_role", "no_principal"
}

impl AuditEntry {
    pub fn new(
        principal: Option<&Principal>,
        session_id: Option<&str>,
        code: &str,
        allowed: bool,
        reason: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.unwrap_or_default().to_string(),
            principal_id: principal.map(|p| p.id.to_string()).unwrap_or_default(),
            code: code.to_string(),
            allowed,
            reason: reason.to_string(),
        }
    }
}

/// Emit an authorization decision on the `audit` target
pub fn audit_permission_decision(
    principal: Option<&Principal>,
    session_id: Option<&str>,
    code: &str,
    allowed: bool,
    reason: &str,
) -> AuditEntry {
    let entry = AuditEntry::new(principal, session_id, code, allowed, reason);

    info!(
        target: "audit",
        audit_type = "authorization",
        session_id = %entry.session_id,
        principal_id = %entry.principal_id,
        code = %entry.code,
        allowed = %entry.allowed,
        reason = %entry.reason,
        "Authorization decision"
    );

    entry
}
