pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod observability;
pub mod services;

pub use auth::{AccessComponents, AuthzError, PermissionService};
pub use config::*;
pub use error::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

/// Outcome of a probe run, printed by the binary
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ProbeReport {
    pub principal_id: String,
    pub superuser: bool,
    pub staff: bool,
    pub role: Option<String>,
    pub checks: BTreeMap<String, bool>,
    pub resources: BTreeMap<String, Vec<String>>,
    pub catalog: BTreeMap<String, Vec<String>>,
    pub cache_error: Option<String>,
}

/// Log in with the configured token, evaluate what was asked and report
///
/// The principal comes from the profile endpoint; the permission catalog is
/// loaded through [`PermissionService::initialize`].
pub async fn run_probe(config: &AppConfig, cli: &Cli) -> Result<ProbeReport, AppError> {
    if config.api.token.is_none() {
        return Err(AppError::Config(
            "no session token; pass --token or set CLINIC_TOKEN".to_string(),
        ));
    }

    let components = AccessComponents::new_production(config)?;
    let service: Arc<PermissionService> = components.permissions.clone();

    let principal = service.backend().fetch_principal().await?;
    info!(principal_id = %principal.id, "Profile loaded");
    service.initialize(principal).await;

    let mut report = describe_session(&service, &cli.checks);

    if cli.catalog {
        let catalog = service.catalog().await;
        for permission in catalog.iter() {
            report
                .catalog
                .entry(permission.resource.clone())
                .or_default()
                .push(permission.code.clone());
        }
        for codes in report.catalog.values_mut() {
            codes.sort();
        }
    }

    if !cli.resources {
        report.resources.clear();
    }
    report.cache_error = service.refresh_status().last_error;

    service.logout();
    Ok(report)
}

/// Evaluate `checks` and list accessible resources for the current session
pub fn describe_session(service: &PermissionService, checks: &[String]) -> ProbeReport {
    let principal = service.current_principal();

    let checks = checks
        .iter()
        .map(|code| (code.clone(), service.has_permission(code)))
        .collect();

    let resources = service
        .accessible_resources()
        .into_iter()
        .map(|resource| {
            let actions = service.resource_actions(&resource);
            (resource, actions)
        })
        .collect();

    ProbeReport {
        principal_id: principal.as_ref().map(|p| p.id.to_string()).unwrap_or_default(),
        superuser: service.is_super_admin(),
        staff: service.is_staff(),
        role: service.current_role().map(|role| role.name),
        checks,
        resources,
        catalog: BTreeMap::new(),
        cache_error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::permissions::{Permission, Principal, Role};
    use crate::services::MockPermissionBackend;

    #[test]
    fn test_describe_session() {
        let service = PermissionService::new(
            Arc::new(MockPermissionBackend::default()),
            crate::auth::CacheConfig::default(),
        );
        let role = Role::new(
            1,
            "Nurse",
            vec![
                Permission::new(1, "patient", "read"),
                Permission::new(2, "patient", "update"),
                Permission::new(3, "document", "read"),
            ],
        );
        service.set_current_principal(Principal::with_role(3, role));

        let report = describe_session(
            &service,
            &["patient.read".to_string(), "billing.view".to_string()],
        );

        assert_eq!(report.principal_id, "3");
        assert_eq!(report.role.as_deref(), Some("Nurse"));
        assert_eq!(report.checks["patient.read"], true);
        assert_eq!(report.checks["billing.view"], false);
        assert_eq!(report.resources["patient"], vec!["read", "update"]);
        assert_eq!(report.resources.len(), 2);
    }

    #[tokio::test]
    async fn test_run_probe_requires_token() {
        let config = AppConfig::default();
        let result = run_probe(&config, &Cli::default()).await;
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
