//! Permission evaluation for the current session
//!
//! [`PermissionService`] is the single authority for "may the current
//! principal do X". It is constructed explicitly, shared by `Arc`, and lives
//! for one login session; [`PermissionService::logout`] resets it.
//!
//! # Two data paths
//!
//! - Boolean checks (`has_permission` and friends) and the enumeration
//!   helpers read the principal's embedded role. They are synchronous and
//!   never depend on network freshness.
//! - Catalog lookups (`catalog`, `catalog_permission`, `catalog_by_module`)
//!   read the time-bounded [`PermissionCache`], refreshing it first when due.
//!
//! A cache refresh never feeds back into the principal's role. The role
//! snapshot stays authoritative until the principal itself is replaced.
//!
//! # Refresh races
//!
//! Refreshes are not serialized. Two callers that both observe an expired
//! cache both fetch, and the later completion wins. Each publication is a
//! complete snapshot, so readers never observe a partial catalog.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant as WallInstant;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::audit::audit_permission_decision;
use super::cache::{CacheConfig, PermissionCache, PermissionSnapshot, RefreshStatus};
use super::permissions::{Permission, PermissionCode, Principal, Role};
use super::AuthzError;
use crate::logging::sanitize_log_message;
use crate::observability::metrics::{
    record_cache_refresh, record_cache_size, record_permission_check, RefreshOutcome,
};
use crate::services::api::BackendError;
use crate::services::permissions::PermissionBackend;

/// Why a check came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    /// No principal is set
    NoPrincipal,
    /// Superuser bypass
    Superuser,
    /// Principal has no role
    NoRole,
    /// Role contains the code
    Granted,
    /// Role lacks the code
    NotGranted,
}

impl DecisionReason {
    pub fn is_allowed(&self) -> bool {
        matches!(self, DecisionReason::Superuser | DecisionReason::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::NoPrincipal => "no_principal",
            DecisionReason::Superuser => "superuser",
            DecisionReason::NoRole => "no_role",
            DecisionReason::Granted => "granted",
            DecisionReason::NotGranted => "not_granted",
        }
    }
}

/// Session-scoped permission evaluator backed by a remote permission source
pub struct PermissionService {
    backend: Arc<dyn PermissionBackend>,
    principal: RwLock<Option<Arc<Principal>>>,
    session_id: RwLock<Option<String>>,
    cache: PermissionCache,
}

impl PermissionService {
    pub fn new(backend: Arc<dyn PermissionBackend>, config: CacheConfig) -> Self {
        Self {
            backend,
            principal: RwLock::new(None),
            session_id: RwLock::new(None),
            cache: PermissionCache::new(config),
        }
    }

    pub fn backend(&self) -> &Arc<dyn PermissionBackend> {
        &self.backend
    }

    /// Start a session for `principal` and load the permission catalog
    ///
    /// The refresh ignores the expiry window. A failed fetch is logged and
    /// leaves the previous catalog in place.
    pub async fn initialize(&self, principal: Principal) {
        let session_id = Uuid::new_v4().to_string();
        info!(
            principal_id = %principal.id,
            session_id = %session_id,
            superuser = principal.is_superuser,
            role = principal.role.as_ref().map(|r| r.name.as_str()).unwrap_or("-"),
            "Initializing permission session"
        );

        *self.principal.write() = Some(Arc::new(principal));
        *self.session_id.write() = Some(session_id);

        self.refresh_now().await;
    }

    /// Replace the principal without touching the cache
    pub fn set_current_principal(&self, principal: Principal) {
        debug!(principal_id = %principal.id, "Replacing current principal");
        *self.principal.write() = Some(Arc::new(principal));
    }

    /// Re-fetch the principal profile from the backend and adopt it
    pub async fn reload_principal(&self) -> Result<Arc<Principal>, BackendError> {
        let principal = self.backend.fetch_principal().await?;
        self.set_current_principal(principal);
        self.current_principal()
            .ok_or_else(|| BackendError::Decode("principal vanished during reload".to_string()))
    }

    pub fn current_principal(&self) -> Option<Arc<Principal>> {
        self.principal.read().clone()
    }

    /// Session id used to correlate audit events, set by `initialize`
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn current_role(&self) -> Option<Role> {
        self.current_principal()
            .and_then(|principal| principal.role.clone())
    }

    pub fn is_super_admin(&self) -> bool {
        self.current_principal()
            .map(|p| p.is_superuser)
            .unwrap_or(false)
    }

    pub fn is_staff(&self) -> bool {
        self.current_principal()
            .map(|p| p.is_staff)
            .unwrap_or(false)
    }

    /// Evaluate `code` against the current principal
    pub fn decide(&self, code: &str) -> DecisionReason {
        let Some(principal) = self.current_principal() else {
            return DecisionReason::NoPrincipal;
        };
        // Superuser bypass comes before any role access
        if principal.is_superuser {
            return DecisionReason::Superuser;
        }
        match &principal.role {
            None => DecisionReason::NoRole,
            Some(role) if role.grants(code) => DecisionReason::Granted,
            Some(_) => DecisionReason::NotGranted,
        }
    }

    pub fn has_permission(&self, code: &str) -> bool {
        let reason = self.decide(code);
        let allowed = reason.is_allowed();

        let resource = PermissionCode::split(code)
            .map(|(resource, _)| resource)
            .unwrap_or("unknown");
        record_permission_check(resource, allowed, reason == DecisionReason::Superuser);

        debug!(code = %code, allowed, reason = reason.as_str(), "Permission check");
        allowed
    }

    /// `true` iff every code is granted; `true` for an empty list
    pub fn has_all_permissions<I, S>(&self, codes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().all(|code| self.has_permission(code.as_ref()))
    }

    /// `true` iff at least one code is granted; `false` for an empty list
    pub fn has_any_permission<I, S>(&self, codes: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        codes.into_iter().any(|code| self.has_permission(code.as_ref()))
    }

    pub fn has_resource_permission(&self, resource: &str, action: &str) -> bool {
        self.has_permission(&PermissionCode::build(resource, action))
    }

    /// Like [`has_permission`](Self::has_permission) but fails with
    /// [`AuthzError::PermissionDenied`] carrying the code
    pub fn check_permission(&self, code: &str) -> Result<(), AuthzError> {
        if self.has_permission(code) {
            return Ok(());
        }

        let reason = self.decide(code);
        let principal = self.current_principal();
        let session_id = self.session_id();
        audit_permission_decision(
            principal.as_deref(),
            session_id.as_deref(),
            code,
            false,
            reason.as_str(),
        );

        Err(AuthzError::PermissionDenied { code: code.to_string() })
    }

    /// Permissions attached to the principal's role, empty without one
    pub fn user_permissions(&self) -> Vec<Permission> {
        self.current_principal()
            .map(|principal| principal.permissions().to_vec())
            .unwrap_or_default()
    }

    pub fn permissions_by_resource(&self, resource: &str) -> Vec<Permission> {
        self.user_permissions()
            .into_iter()
            .filter(|p| p.resource == resource)
            .collect()
    }

    /// Distinct resources across the principal's permissions, sorted
    pub fn accessible_resources(&self) -> Vec<String> {
        self.user_permissions()
            .into_iter()
            .map(|p| p.resource)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct actions the principal holds on `resource`, sorted
    pub fn resource_actions(&self, resource: &str) -> Vec<String> {
        self.permissions_by_resource(resource)
            .into_iter()
            .map(|p| p.action)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The principal's permissions on `resource`, grouped by action
    pub fn permissions_by_module(&self, resource: &str) -> BTreeMap<String, Vec<Permission>> {
        group_by_action(self.permissions_by_resource(resource))
    }

    /// Refresh the catalog if the expiry window has passed
    pub async fn refresh_permissions_cache(&self) {
        if !self.cache.is_due(Instant::now()) {
            record_cache_refresh(RefreshOutcome::Skipped, std::time::Duration::ZERO);
            return;
        }
        self.refresh_now().await;
    }

    /// Force the next refresh and perform it immediately
    pub async fn invalidate_cache(&self) {
        debug!("Invalidating permission cache");
        self.cache.mark_stale();
        self.refresh_permissions_cache().await;
    }

    /// Current catalog, refreshed first when due
    pub async fn catalog(&self) -> Arc<PermissionSnapshot> {
        self.refresh_permissions_cache().await;
        self.cache.snapshot()
    }

    /// Look up a catalog record by code
    pub async fn catalog_permission(&self, code: &str) -> Option<Permission> {
        self.catalog().await.get(code).cloned()
    }

    /// Catalog records of `resource` grouped by action, for role editors
    pub async fn catalog_by_module(&self, resource: &str) -> BTreeMap<String, Vec<Permission>> {
        group_by_action(self.catalog().await.by_resource(resource))
    }

    pub fn refresh_status(&self) -> RefreshStatus {
        self.cache.status()
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    /// End the session: drop principal, catalog and refresh bookkeeping
    pub fn logout(&self) {
        let principal = self.principal.write().take();
        self.session_id.write().take();
        self.cache.clear();
        record_cache_size(0);

        if let Some(principal) = principal {
            info!(principal_id = %principal.id, "Permission session ended");
        }
    }

    async fn refresh_now(&self) {
        let start = WallInstant::now();

        match self.backend.fetch_permissions().await {
            Ok(permissions) => {
                let count = permissions.len();
                self.cache.replace(permissions, Instant::now());
                record_cache_refresh(RefreshOutcome::Success, start.elapsed());
                record_cache_size(count);
                debug!(entries = count, "Permission cache refreshed");
            }
            Err(error) => {
                let message = sanitize_log_message(&error.to_string());
                warn!(
                    error = %message,
                    transient = error.is_transient(),
                    "Permission cache refresh failed, keeping previous state"
                );
                self.cache.record_failure(message);
                record_cache_refresh(RefreshOutcome::Failure, start.elapsed());
            }
        }
    }
}

fn group_by_action(permissions: Vec<Permission>) -> BTreeMap<String, Vec<Permission>> {
    let mut grouped: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
    for permission in permissions {
        grouped
            .entry(permission.action.clone())
            .or_default()
            .push(permission);
    }
    grouped
}
