use std::fmt;
use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::auth::cache::{CacheConfig, CacheRefreshPolicy};
use crate::services::api::ApiClientConfig;

#[derive(Debug, Deserialize, Serialize, Validate, Default)]
pub struct AppConfig {
    #[garde(dive)]
    #[serde(default)]
    pub api: ApiConfig,

    #[garde(dive)]
    #[serde(default)]
    pub cache: CacheSettings,

    #[garde(dive)]
    #[serde(default)]
    pub logging: LoggingConfig,

    #[garde(skip)]
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Deserialize, Serialize, Validate)]
pub struct ApiConfig {
    #[garde(length(min = 1), custom(validate_base_url))]
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[garde(range(min = 100, max = 120_000))]
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[garde(pattern(r"^/"))]
    #[serde(default = "default_permissions_path")]
    pub permissions_path: String,

    #[garde(pattern(r"^/"))]
    #[serde(default = "default_profile_path")]
    pub profile_path: String,

    #[garde(pattern(r"^/"))]
    #[serde(default = "default_roles_path")]
    pub roles_path: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_permissions_path() -> String {
    "/api/permissions/".to_string()
}

fn default_profile_path() -> String {
    "/api/auth/me/".to_string()
}

fn default_roles_path() -> String {
    "/api/roles/".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout_ms: default_request_timeout_ms(),
            permissions_path: default_permissions_path(),
            profile_path: default_profile_path(),
            roles_path: default_roles_path(),
        }
    }
}

// Token stays out of debug output
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("permissions_path", &self.permissions_path)
            .field("profile_path", &self.profile_path)
            .field("roles_path", &self.roles_path)
            .finish()
    }
}

impl ApiConfig {
    pub fn to_client_config(&self) -> ApiClientConfig {
        ApiClientConfig {
            base_url: self.base_url.clone(),
            token: self.token.clone(),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            permissions_path: self.permissions_path.clone(),
            profile_path: self.profile_path.clone(),
            roles_path: self.roles_path.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CacheSettings {
    #[garde(range(min = 1, max = 86_400))]
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,

    #[garde(skip)]
    #[serde(default)]
    pub refresh_policy: CacheRefreshPolicy,
}

fn default_cache_ttl() -> u64 {
    300
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl(),
            refresh_policy: CacheRefreshPolicy::default(),
        }
    }
}

impl CacheSettings {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig {
            expiry: Duration::from_secs(self.ttl_seconds),
            refresh_policy: self.refresh_policy,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct LoggingConfig {
    #[garde(length(min = 1))]
    #[serde(default = "default_log_level")]
    pub level: String, // trace, debug, info, warn, error

    #[garde(pattern(r"^(json|pretty)$"))]
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    #[default]
    Production,
}

fn validate_base_url(value: &str, _: &()) -> garde::Result {
    let url = reqwest::Url::parse(value).map_err(|_| garde::Error::new("Invalid URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(garde::Error::new(format!("Unsupported URL scheme: {}", other))),
    }
}
