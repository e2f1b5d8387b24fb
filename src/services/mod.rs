pub mod admin;
pub mod api;
pub mod permissions;

pub use admin::{PermissionDraft, RoleAdminClient, RoleDraft};
pub use api::{ApiClient, ApiClientConfig, BackendError, BackendStats};
pub use permissions::{HttpPermissionBackend, MockPermissionBackend, PermissionBackend};
