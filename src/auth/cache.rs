//! Time-bounded cache of permission records
//!
//! The cache maps permission codes to the [`Permission`] records fetched from
//! the remote permissions endpoint. It is a derived view: the principal's role
//! stays the source of truth for boolean checks, while the cache backs the
//! catalog lookups used by role-editing screens.
//!
//! Refreshes never mutate the published map. A new [`PermissionSnapshot`] is
//! built completely and then swapped in, so a reader either sees the old
//! catalog or the new one and never an empty intermediate state.
//!
//! Expiry rule: the cache is due for refresh when it has never been refreshed
//! or when strictly more than the expiry window has elapsed since the last
//! successful refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::permissions::Permission;

/// Default expiry window for the permission cache
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(300);

/// What happens to the cached catalog when a refresh fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheRefreshPolicy {
    /// Keep serving the last successfully fetched catalog
    #[default]
    KeepStaleOnError,
    /// Drop the catalog so lookups come back empty until the next success
    ClearOnError,
}

/// Configuration for the permission cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a refreshed catalog is considered fresh
    pub expiry: Duration,
    /// Behavior on refresh failure
    pub refresh_policy: CacheRefreshPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry: DEFAULT_CACHE_EXPIRY,
            refresh_policy: CacheRefreshPolicy::KeepStaleOnError,
        }
    }
}

/// Immutable code → permission map
#[derive(Debug, Clone, Default)]
pub struct PermissionSnapshot {
    entries: HashMap<String, Permission>,
}

impl PermissionSnapshot {
    /// Build a snapshot keyed by permission code
    ///
    /// Later records win when the same code appears twice.
    pub fn from_permissions(permissions: Vec<Permission>) -> Self {
        let entries = permissions
            .into_iter()
            .map(|permission| (permission.code.clone(), permission))
            .collect();
        Self { entries }
    }

    pub fn get(&self, code: &str) -> Option<&Permission> {
        self.entries.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Permission> {
        self.entries.values()
    }

    /// All records of one resource, sorted by code for stable output
    pub fn by_resource(&self, resource: &str) -> Vec<Permission> {
        let mut permissions: Vec<Permission> = self
            .entries
            .values()
            .filter(|p| p.resource == resource)
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        permissions
    }
}

/// Observable outcome of the refresh cycle
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    /// Completion time of the last successful refresh, `None` if never or invalidated
    pub last_refreshed_at: Option<Instant>,
    /// Message of the most recent failure, cleared on success
    pub last_error: Option<String>,
    /// Number of successful refreshes
    pub refresh_count: u64,
    /// Number of failed refreshes
    pub failure_count: u64,
}

impl RefreshStatus {
    /// Whether the latest refresh attempt failed
    pub fn is_degraded(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Holder for the current snapshot and its refresh bookkeeping
///
/// Locks are held only for the duration of a pointer swap or a field update,
/// never across an await point.
pub struct PermissionCache {
    config: CacheConfig,
    snapshot: RwLock<Arc<PermissionSnapshot>>,
    status: RwLock<RefreshStatus>,
}

impl PermissionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            snapshot: RwLock::new(Arc::new(PermissionSnapshot::default())),
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Current snapshot; stays valid even if a refresh swaps in a new one
    pub fn snapshot(&self) -> Arc<PermissionSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().is_empty()
    }

    /// Whether a refresh should be attempted at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        match self.status.read().last_refreshed_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.config.expiry,
        }
    }

    /// Reset the refresh timestamp so the next check is due
    pub fn mark_stale(&self) {
        self.status.write().last_refreshed_at = None;
    }

    /// Publish a freshly fetched catalog
    pub fn replace(&self, permissions: Vec<Permission>, completed_at: Instant) {
        let next = Arc::new(PermissionSnapshot::from_permissions(permissions));
        *self.snapshot.write() = next;

        let mut status = self.status.write();
        status.last_refreshed_at = Some(completed_at);
        status.last_error = None;
        status.refresh_count += 1;
    }

    /// Record a failed refresh; the timestamp is left untouched
    pub fn record_failure(&self, error: String) {
        if self.config.refresh_policy == CacheRefreshPolicy::ClearOnError {
            *self.snapshot.write() = Arc::new(PermissionSnapshot::default());
        }

        let mut status = self.status.write();
        status.last_error = Some(error);
        status.failure_count += 1;
    }

    /// Drop the catalog and all bookkeeping
    pub fn clear(&self) {
        *self.snapshot.write() = Arc::new(PermissionSnapshot::default());
        *self.status.write() = RefreshStatus::default();
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.read().clone()
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Permission> {
        vec![
            Permission::new(1, "patient", "create"),
            Permission::new(2, "patient", "read"),
            Permission::new(3, "document", "upload"),
        ]
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.expiry, Duration::from_secs(300));
        assert_eq!(config.refresh_policy, CacheRefreshPolicy::KeepStaleOnError);
    }

    #[test]
    fn test_snapshot_keyed_by_code() {
        let snapshot = PermissionSnapshot::from_permissions(catalog());
        assert_eq!(snapshot.len(), 3);
        assert!(snapshot.contains("patient.create"));
        assert!(!snapshot.contains("patient.delete"));
        assert_eq!(snapshot.get("document.upload").map(|p| p.action.as_str()), Some("upload"));
    }

    #[test]
    fn test_snapshot_duplicate_codes_last_wins() {
        let mut first = Permission::new(1, "patient", "read");
        first.name = "old".to_string();
        let mut second = Permission::new(2, "patient", "read");
        second.name = "new".to_string();

        let snapshot = PermissionSnapshot::from_permissions(vec![first, second]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("patient.read").unwrap().name, "new");
    }

    #[test]
    fn test_snapshot_by_resource_sorted() {
        let snapshot = PermissionSnapshot::from_permissions(catalog());
        let codes: Vec<String> = snapshot
            .by_resource("patient")
            .into_iter()
            .map(|p| p.code)
            .collect();
        assert_eq!(codes, vec!["patient.create", "patient.read"]);
        assert!(snapshot.by_resource("billing").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_refreshed_is_due() {
        let cache = PermissionCache::default();
        assert!(cache.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_boundary() {
        let cache = PermissionCache::default();
        cache.replace(catalog(), Instant::now());

        tokio::time::advance(Duration::from_secs(4 * 60 + 59)).await;
        assert!(!cache.is_due(Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        // Exactly at the window edge is still fresh
        assert!(!cache.is_due(Instant::now()));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.is_due(Instant::now()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_stale_forces_due() {
        let cache = PermissionCache::default();
        cache.replace(catalog(), Instant::now());
        assert!(!cache.is_due(Instant::now()));

        cache.mark_stale();
        assert!(cache.is_due(Instant::now()));
        // Contents survive, only the timestamp is reset
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_stale_snapshot_and_timestamp() {
        let cache = PermissionCache::default();
        let refreshed_at = Instant::now();
        cache.replace(catalog(), refreshed_at);

        let before = cache.snapshot();
        cache.record_failure("connection refused".to_string());

        let status = cache.status();
        assert_eq!(status.last_refreshed_at, Some(refreshed_at));
        assert_eq!(status.last_error.as_deref(), Some("connection refused"));
        assert_eq!(status.failure_count, 1);
        assert!(status.is_degraded());
        assert!(Arc::ptr_eq(&before, &cache.snapshot()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_with_clear_policy_empties_snapshot() {
        let cache = PermissionCache::new(CacheConfig {
            expiry: DEFAULT_CACHE_EXPIRY,
            refresh_policy: CacheRefreshPolicy::ClearOnError,
        });
        cache.replace(catalog(), Instant::now());

        cache.record_failure("timeout".to_string());
        assert!(cache.is_empty());
        assert!(cache.status().last_refreshed_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_last_error() {
        let cache = PermissionCache::default();
        cache.record_failure("boom".to_string());
        assert!(cache.status().is_degraded());

        cache.replace(catalog(), Instant::now());
        let status = cache.status();
        assert!(!status.is_degraded());
        assert_eq!(status.refresh_count, 1);
        assert_eq!(status.failure_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_swaps_without_touching_old_snapshot() {
        let cache = PermissionCache::default();
        cache.replace(catalog(), Instant::now());
        let held = cache.snapshot();

        cache.replace(vec![Permission::new(9, "report", "export")], Instant::now());

        // A reader holding the old snapshot keeps a consistent view
        assert_eq!(held.len(), 3);
        assert_eq!(cache.len(), 1);
        assert!(cache.snapshot().contains("report.export"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_everything() {
        let cache = PermissionCache::default();
        cache.replace(catalog(), Instant::now());
        cache.clear();

        assert!(cache.is_empty());
        let status = cache.status();
        assert!(status.last_refreshed_at.is_none());
        assert_eq!(status.refresh_count, 0);
    }
}
