//! Role and permission management client
//!
//! Admin screens manage the same records the permission service evaluates.
//! This client covers the list/get/create/update/delete calls for both, on
//! top of the shared [`ApiClient`].

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::permissions::{Permission, PermissionCode, RecordId, Role};
use crate::services::api::{ApiClient, BackendError};

/// Request body for creating or updating a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Ids of the permissions granted by the role
    pub permission_ids: Vec<RecordId>,
}

impl RoleDraft {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            permission_ids: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: &[Permission]) -> Self {
        self.permission_ids = permissions.iter().map(|p| p.id.clone()).collect();
        self
    }

    fn validate(&self) -> Result<(), BackendError> {
        if self.name.trim().is_empty() {
            return Err(BackendError::InvalidRequest("Role name cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Request body for creating or updating a permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDraft {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource: String,
    pub action: String,
}

impl PermissionDraft {
    /// Draft with a conventional `resource.action` code
    pub fn new(resource: &str, action: &str, name: &str) -> Self {
        Self {
            code: PermissionCode::build(resource, action),
            name: name.to_string(),
            description: String::new(),
            resource: resource.to_string(),
            action: action.to_string(),
        }
    }

    fn validate(&self) -> Result<(), BackendError> {
        match PermissionCode::split(&self.code) {
            Some((resource, action)) if resource == self.resource && action == self.action => Ok(()),
            _ => Err(BackendError::InvalidRequest(format!(
                "Permission code {} does not match {}.{}",
                self.code, self.resource, self.action
            ))),
        }
    }
}

/// CRUD client for roles and permissions
#[derive(Clone)]
pub struct RoleAdminClient {
    client: ApiClient,
}

impl RoleAdminClient {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn roles_path(&self) -> String {
        self.client.config().roles_path.clone()
    }

    fn role_path(&self, id: &RecordId) -> String {
        format!("{}/{}/", self.roles_path().trim_end_matches('/'), id)
    }

    fn permissions_path(&self) -> String {
        self.client.config().permissions_path.clone()
    }

    fn permission_path(&self, id: &RecordId) -> String {
        format!("{}/{}/", self.permissions_path().trim_end_matches('/'), id)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, BackendError> {
        self.client.get_list(&self.roles_path()).await
    }

    pub async fn get_role(&self, id: &RecordId) -> Result<Role, BackendError> {
        self.client.get_json(&self.role_path(id)).await
    }

    pub async fn create_role(&self, draft: &RoleDraft) -> Result<Role, BackendError> {
        draft.validate()?;
        let role: Role = self
            .client
            .send_json(Method::POST, &self.roles_path(), draft)
            .await?;
        info!(role_id = %role.id, role = %role.name, "Role created");
        Ok(role)
    }

    pub async fn update_role(&self, id: &RecordId, draft: &RoleDraft) -> Result<Role, BackendError> {
        draft.validate()?;
        let role: Role = self
            .client
            .send_json(Method::PUT, &self.role_path(id), draft)
            .await?;
        info!(role_id = %role.id, role = %role.name, "Role updated");
        Ok(role)
    }

    /// Delete a role; system roles are refused without contacting the backend
    pub async fn delete_role(&self, role: &Role) -> Result<(), BackendError> {
        if role.is_system_role {
            return Err(BackendError::InvalidRequest(format!(
                "System role {} cannot be deleted",
                role.name
            )));
        }
        self.client.delete(&self.role_path(&role.id)).await?;
        info!(role_id = %role.id, role = %role.name, "Role deleted");
        Ok(())
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, BackendError> {
        self.client.get_list(&self.permissions_path()).await
    }

    pub async fn get_permission(&self, id: &RecordId) -> Result<Permission, BackendError> {
        self.client.get_json(&self.permission_path(id)).await
    }

    pub async fn create_permission(&self, draft: &PermissionDraft) -> Result<Permission, BackendError> {
        draft.validate()?;
        let permission: Permission = self
            .client
            .send_json(Method::POST, &self.permissions_path(), draft)
            .await?;
        info!(code = %permission.code, "Permission created");
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        id: &RecordId,
        draft: &PermissionDraft,
    ) -> Result<Permission, BackendError> {
        draft.validate()?;
        self.client
            .send_json(Method::PUT, &self.permission_path(id), draft)
            .await
    }

    pub async fn delete_permission(&self, id: &RecordId) -> Result<(), BackendError> {
        self.client.delete(&self.permission_path(id)).await?;
        info!(permission_id = %id, "Permission deleted");
        Ok(())
    }
}
