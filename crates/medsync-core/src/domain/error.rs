//! Domain-level error taxonomy for MedSync.

/// MedSync domain errors.
#[derive(Debug, thiserror::Error)]
pub enum MedsyncError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("integration job not found: {0}")]
    JobNotFound(uuid::Uuid),

    #[error("mapping not found: {0}")]
    MappingNotFound(uuid::Uuid),

    #[error("prescription not found: {0}")]
    PrescriptionNotFound(uuid::Uuid),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MedsyncError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type for MedSync domain operations.
pub type Result<T> = std::result::Result<T, MedsyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medsync_error_display() {
        let err = MedsyncError::invalid("dose must not be blank");
        assert!(err.to_string().contains("invalid argument"));
        assert!(err.to_string().contains("dose must not be blank"));

        let id = uuid::Uuid::new_v4();
        let err = MedsyncError::JobNotFound(id);
        assert!(err.to_string().contains("integration job not found"));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn test_serialization_error_converts() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: MedsyncError = parse_err.into();
        assert!(matches!(err, MedsyncError::Serialization(_)));
        assert!(err.to_string().starts_with("serialization error"));
    }
}
