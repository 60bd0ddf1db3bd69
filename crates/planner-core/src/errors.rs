/// Error taxonomy shared by every layer of the planner.
///
/// Variants carry internal detail for logs. What the user sees is decided by
/// the command router, never by `Display` on these values.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PlannerError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid format: {0}")]
    Format(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl PlannerError {
    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Format(_) => "format",
            Self::Permission(_) => "permission",
            Self::NotFound(_) => "not_found",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::Storage(_) => "storage",
        }
    }

    /// Whether the failure was caused by the request rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::Permission(_) | Self::NotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PlannerError>;
