//! Remote source of permission records
//!
//! [`PermissionBackend`] is the seam between the permission service and the
//! network. The production implementation talks to the records backend over
//! HTTP; [`MockPermissionBackend`] serves scripted data for tests and for
//! running the probe offline.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::auth::permissions::{Permission, Principal};
use crate::services::api::{ApiClient, ApiClientConfig, BackendError, BackendStats};

/// Source of permission records and principal profiles
#[async_trait]
pub trait PermissionBackend: Send + Sync {
    /// Fetch the full permission list visible to the current session
    async fn fetch_permissions(&self) -> Result<Vec<Permission>, BackendError>;

    /// Fetch the authenticated principal, including role and permissions
    async fn fetch_principal(&self) -> Result<Principal, BackendError>;

    /// Cheap reachability probe
    async fn health_check(&self) -> Result<bool, BackendError>;

    /// Request statistics
    async fn stats(&self) -> BackendStats;
}

/// Production backend over the REST API
#[derive(Clone)]
pub struct HttpPermissionBackend {
    client: ApiClient,
}

impl HttpPermissionBackend {
    pub fn new(config: ApiClientConfig) -> Result<Self, BackendError> {
        let client = ApiClient::new(config)?;
        info!(base_url = %client.config().base_url, "Permission backend client created");
        Ok(Self { client })
    }

    pub fn from_client(client: ApiClient) -> Self {
        Self { client }
    }

    /// Underlying REST client, shared with other services
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn set_token(&self, token: Option<String>) {
        self.client.set_token(token);
    }
}

#[async_trait]
impl PermissionBackend for HttpPermissionBackend {
    async fn fetch_permissions(&self) -> Result<Vec<Permission>, BackendError> {
        let path = self.client.config().permissions_path.clone();
        let permissions: Vec<Permission> = self.client.get_list(&path).await?;
        debug!(count = permissions.len(), "Fetched permission list");
        Ok(permissions)
    }

    async fn fetch_principal(&self) -> Result<Principal, BackendError> {
        let path = self.client.config().profile_path.clone();
        self.client.get_json(&path).await
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        if !self.client.has_token() {
            return Err(BackendError::InvalidRequest("No session token configured".to_string()));
        }
        let path = self.client.config().profile_path.clone();
        self.client.get_json::<serde_json::Value>(&path).await?;
        Ok(true)
    }

    async fn stats(&self) -> BackendStats {
        self.client.stats()
    }
}

/// Scripted backend for tests and offline runs
pub struct MockPermissionBackend {
    permissions: RwLock<Vec<Permission>>,
    principal: RwLock<Option<Principal>>,
    delay: RwLock<Option<Duration>>,
    should_fail: AtomicBool,
    fetch_count: AtomicU64,
}

impl MockPermissionBackend {
    pub fn new(permissions: Vec<Permission>) -> Self {
        Self {
            permissions: RwLock::new(permissions),
            principal: RwLock::new(None),
            delay: RwLock::new(None),
            should_fail: AtomicBool::new(false),
            fetch_count: AtomicU64::new(0),
        }
    }

    /// Serve `principal` from [`PermissionBackend::fetch_principal`]
    pub fn with_principal(self, principal: Principal) -> Self {
        *self.principal.write() = Some(principal);
        self
    }

    /// Make every fetch wait before answering
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.write() = Some(delay);
        self
    }

    pub fn set_permissions(&self, permissions: Vec<Permission>) {
        *self.permissions.write() = permissions;
    }

    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::SeqCst);
    }

    /// Number of permission fetches attempted so far
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let delay = *self.delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockPermissionBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl PermissionBackend for MockPermissionBackend {
    async fn fetch_permissions(&self) -> Result<Vec<Permission>, BackendError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("mock backend unavailable".to_string()));
        }
        Ok(self.permissions.read().clone())
    }

    async fn fetch_principal(&self) -> Result<Principal, BackendError> {
        self.simulate_latency().await;

        if self.should_fail.load(Ordering::SeqCst) {
            return Err(BackendError::Connection("mock backend unavailable".to_string()));
        }
        self.principal
            .read()
            .clone()
            .ok_or(BackendError::Unauthorized(401))
    }

    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(!self.should_fail.load(Ordering::SeqCst))
    }

    async fn stats(&self) -> BackendStats {
        BackendStats {
            total_requests: self.fetch_count(),
            ..BackendStats::default()
        }
    }
}
