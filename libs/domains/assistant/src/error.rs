use domain_catalog::CatalogError;
use thiserror::Error;

/// Error taxonomy for command processing. Pending and cancelled states
/// are not errors; they live in [`crate::command::CommandOutcome`].
#[derive(Error, Debug)]
pub enum AssistantError {
    /// Malformed, missing, or out-of-range input field.
    #[error("{0}")]
    Validation(String),

    /// Entity reference could not be resolved (not found or ambiguous).
    #[error("{0}")]
    Resolution(String),

    /// A business rule blocks the operation.
    #[error("{0}")]
    Conflict(String),

    /// The continuation token does not match a stored pending action.
    #[error("The pending request expired or is invalid.")]
    PendingExpired,

    /// LLM transport or response parsing failure.
    #[error("{0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AssistantResult<T> = Result<T, AssistantError>;

impl From<CatalogError> for AssistantError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(msg) => AssistantError::Resolution(msg),
            CatalogError::Conflict(msg) => AssistantError::Conflict(msg),
            CatalogError::InsufficientStock { .. } => AssistantError::Conflict(err.to_string()),
            CatalogError::Validation(msg) => AssistantError::Validation(msg),
            CatalogError::Internal(msg) => AssistantError::Internal(msg),
        }
    }
}
