use thiserror::Error;

/// Failure of the single outbound call to the completion service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("model service unavailable: {0}")]
    Unavailable(String),
    #[error("model service rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("model service rejected credentials: {0}")]
    Auth(String),
    #[error("model request timed out after {0}s")]
    Timeout(u64),
    #[error("model response was malformed: {0}")]
    MalformedResponse(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule document `{path}` could not be read: {reason}")]
    Unreadable { path: String, reason: String },
    #[error("rule document `{0}` is empty")]
    Empty(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DiagnosisError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to load diagnosis rules")]
    RuleUnavailable(#[source] RuleError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    RuleUnavailable,
    Model,
}

impl DiagnosisError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::RuleUnavailable(_) => FailureKind::RuleUnavailable,
            Self::Model(_) => FailureKind::Model,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<RuleError> for DiagnosisError {
    fn from(value: RuleError) -> Self {
        Self::RuleUnavailable(value)
    }
}

/// Caller-facing form of a failed request.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text placed in the envelope's `error` field.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. } | Self::Internal { message, .. } => message,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } | Self::Internal { correlation_id, .. } => {
                correlation_id
            }
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Internal { .. } => 500,
        }
    }
}

impl From<DiagnosisError> for InterfaceError {
    fn from(value: DiagnosisError) -> Self {
        match value {
            DiagnosisError::Validation(message) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            rule @ DiagnosisError::RuleUnavailable(_) => {
                Self::Internal { message: rule.to_string(), correlation_id: "unassigned".to_owned() }
            }
            DiagnosisError::Model(error) => {
                Self::Internal { message: error.to_string(), correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
