use thiserror::Error;

pub mod audit;
pub mod cache;
pub mod components;
pub mod evaluator;
pub mod permissions;

pub use audit::*;
pub use cache::*;
pub use components::*;
pub use evaluator::*;
pub use permissions::*;

/// Failure raised by explicit permission checks
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("Permission denied: {code}")]
    PermissionDenied { code: String },
}

impl AuthzError {
    /// The permission code that was refused
    pub fn code(&self) -> &str {
        match self {
            AuthzError::PermissionDenied { code } => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::PermissionDenied { code: "report.export".to_string() };
        assert_eq!(err.to_string(), "Permission denied: report.export");
        assert_eq!(err.code(), "report.export");
    }

    #[test]
    fn test_authz_error_propagates_with_question_mark() {
        fn guarded(service: &PermissionService) -> Result<&'static str, AuthzError> {
            service.check_permission("patient.update")?;
            Ok("updated")
        }

        let service = PermissionService::new(
            std::sync::Arc::new(crate::services::MockPermissionBackend::default()),
            CacheConfig::default(),
        );
        let err = guarded(&service).unwrap_err();
        assert_eq!(err.code(), "patient.update");

        service.set_current_principal(Principal::superuser(1, None));
        assert_eq!(guarded(&service), Ok("updated"));
    }
}
