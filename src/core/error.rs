//! Error types and HTTP status mapping.
//!
//! Errors fall into three families that drive startup behaviour:
//! - fatal at construction (handler chain assembly, policy install,
//!   controller group construction), which abort startup;
//! - transient and expected (identities or dependent objects not yet
//!   present), which are retried on a fixed interval;
//! - everything else, which surfaces to API clients as a status code.

use http::StatusCode;
use thiserror::Error;

/// Common kplane error conditions.
#[derive(Debug, Error)]
pub enum PlaneError {
    /// Request could not be parsed or is semantically invalid.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Object does not exist in the addressed logical cluster.
    #[error("{resource} {name:?} not found")]
    NotFound { resource: String, name: String },

    /// Object already exists in the addressed logical cluster.
    #[error("{resource} {name:?} already exists")]
    AlreadyExists { resource: String, name: String },

    /// Request rejected by admission (quota exceeded, disallowed verb).
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Request body exceeds the listener's limit.
    #[error("request body exceeds {limit} bytes")]
    RequestTooLarge { limit: usize },

    /// HTTP method is not supported on the addressed path.
    #[error("method {method} not allowed")]
    MethodNotAllowed { method: String },

    /// An export identity cannot be computed yet because the export is missing.
    #[error("identity for export {export:?} not yet available")]
    IdentityNotYetAvailable { export: String },

    /// A bootstrap phase failed for a reason other than cancellation.
    #[error("bootstrap phase {phase} failed: {message}")]
    PhaseFailed { phase: String, message: String },

    /// A controller group could not be constructed.
    #[error("controller group {group} failed to install: {message}")]
    ControllerInstall { group: String, message: String },

    /// Handler chain could not be assembled.
    #[error("handler chain assembly failed: {message}")]
    ChainAssembly { message: String },

    /// A post-start hook with this name is already registered.
    #[error("post-start hook {name:?} already registered")]
    DuplicateHook { name: String },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl PlaneError {
    /// Create an InvalidRequest error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a NotFound error.
    pub fn not_found(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Create a Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a PhaseFailed error.
    pub fn phase_failed(phase: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::PhaseFailed {
            phase: phase.into(),
            message: message.to_string(),
        }
    }

    /// Create a ControllerInstall error.
    pub fn controller_install(group: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::ControllerInstall {
            group: group.into(),
            message: message.to_string(),
        }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is an expected transient condition worth retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::IdentityNotYetAvailable { .. } | Self::NotFound { .. }
        )
    }

    /// Check if this error aborts startup when raised during construction.
    pub fn is_fatal_at_construction(&self) -> bool {
        matches!(
            self,
            Self::ChainAssembly { .. } | Self::ControllerInstall { .. } | Self::DuplicateHook { .. }
        )
    }

    /// Map this error to the status code returned to API clients.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::AlreadyExists { .. } => StatusCode::CONFLICT,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::IdentityNotYetAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::PhaseFailed { .. }
            | Self::ControllerInstall { .. }
            | Self::ChainAssembly { .. }
            | Self::DuplicateHook { .. }
            | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable reason, used in API error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "BadRequest",
            Self::NotFound { .. } => "NotFound",
            Self::AlreadyExists { .. } => "AlreadyExists",
            Self::Forbidden { .. } => "Forbidden",
            Self::MethodNotAllowed { .. } => "MethodNotAllowed",
            Self::RequestTooLarge { .. } => "RequestEntityTooLarge",
            Self::IdentityNotYetAvailable { .. } => "ServiceUnavailable",
            _ => "InternalError",
        }
    }
}

/// Result type using PlaneError.
pub type PlaneResult<T> = Result<T, PlaneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retriable() {
        assert!(PlaneError::IdentityNotYetAvailable {
            export: "tenancy.kplane.io".into()
        }
        .is_retriable());
        assert!(PlaneError::not_found("apiexports", "x").is_retriable());
        assert!(!PlaneError::forbidden("quota").is_retriable());
        assert!(!PlaneError::phase_failed("PolicyInstall", "boom").is_retriable());
    }

    #[test]
    fn construction_errors_are_fatal() {
        assert!(PlaneError::controller_install("quota", "bad").is_fatal_at_construction());
        assert!(PlaneError::ChainAssembly {
            message: "no fallback".into()
        }
        .is_fatal_at_construction());
        assert!(!PlaneError::invalid("x").is_fatal_at_construction());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            PlaneError::already_exists("configmaps", "a").http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PlaneError::forbidden("exceeded quota").http_status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            PlaneError::not_found("configmaps", "a").reason(),
            "NotFound"
        );
    }
}
