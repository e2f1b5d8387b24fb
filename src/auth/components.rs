//! Access components for dependency injection
//!
//! Bundles the permission service with the clients it shares a session
//! token with, so a host application builds them once per session from
//! configuration and hands them to whatever needs them.

use std::sync::Arc;

use anyhow::Result;

use crate::auth::cache::CacheConfig;
use crate::auth::evaluator::PermissionService;
use crate::config::AppConfig;
use crate::services::admin::RoleAdminClient;
use crate::services::api::{ApiClient, BackendStats};
use crate::services::permissions::{HttpPermissionBackend, MockPermissionBackend, PermissionBackend};

/// Bundle of everything a session needs for access control
#[derive(Clone)]
pub struct AccessComponents {
    /// Evaluator for the current session
    pub permissions: Arc<PermissionService>,
    /// Role and permission management
    pub admin: Option<RoleAdminClient>,
    /// Shared REST client, absent for mock components
    pub api: Option<ApiClient>,
}

impl AccessComponents {
    /// Components talking to the configured backend
    pub fn new_production(config: &AppConfig) -> Result<Self> {
        let api = ApiClient::new(config.api.to_client_config())?;
        let backend: Arc<dyn PermissionBackend> =
            Arc::new(HttpPermissionBackend::from_client(api.clone()));
        let permissions = Arc::new(PermissionService::new(
            backend,
            config.cache.to_cache_config(),
        ));

        Ok(Self {
            permissions,
            admin: Some(RoleAdminClient::new(api.clone())),
            api: Some(api),
        })
    }

    /// Components over a scripted backend
    pub fn new_mock(backend: Arc<MockPermissionBackend>) -> Self {
        let permissions = Arc::new(PermissionService::new(backend, CacheConfig::default()));
        Self {
            permissions,
            admin: None,
            api: None,
        }
    }

    /// Adopt a new session token after (re-)authentication
    pub fn set_token(&self, token: Option<String>) {
        if let Some(api) = &self.api {
            api.set_token(token);
        }
    }

    /// Snapshot of cache and backend statistics for monitoring
    pub async fn get_stats(&self) -> AccessStats {
        let status = self.permissions.refresh_status();
        let backend = self.permissions.backend().stats().await;

        AccessStats {
            cache_entries: self.permissions.cache().len(),
            cache_refreshes: status.refresh_count,
            cache_refresh_failures: status.failure_count,
            last_refresh_error: status.last_error,
            backend,
        }
    }
}

/// Statistics about the access layer
#[derive(Debug, Clone)]
pub struct AccessStats {
    pub cache_entries: usize,
    pub cache_refreshes: u64,
    pub cache_refresh_failures: u64,
    pub last_refresh_error: Option<String>,
    pub backend: BackendStats,
}
