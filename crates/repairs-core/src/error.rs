use std::fmt;

/// Machine-readable error codes surfaced in HTTP error bodies and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidConfig,
    TicketNotFound,
    ValidationFailed,
    Unauthorized,
    StoreWriteFailed,
    StoreReadFailed,
    RelayUnavailable,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::InvalidConfig => "E1004",
            Self::TicketNotFound => "E2001",
            Self::ValidationFailed => "E2005",
            Self::Unauthorized => "E4001",
            Self::StoreWriteFailed => "E5001",
            Self::StoreReadFailed => "E5003",
            Self::RelayUnavailable => "E6003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidConfig => "Invalid configuration",
            Self::TicketNotFound => "Repair not found",
            Self::ValidationFailed => "Invalid repair payload",
            Self::Unauthorized => "Unauthorized",
            Self::StoreWriteFailed => "Repair store write failed",
            Self::StoreReadFailed => "Repair store read failed",
            Self::RelayUnavailable => "Chat relay upstream unavailable",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and callers.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in the repairs config.toml and retry."),
            Self::InvalidConfig => {
                Some("Check SECRET_API_KEY, PORT and the REPAIRS_* overrides.")
            }
            Self::TicketNotFound => None,
            Self::ValidationFailed => Some("Provide non-empty item and description fields."),
            Self::Unauthorized => Some("Send `Authorization: Bearer <api key>`."),
            Self::StoreWriteFailed => Some("Check disk space and write permissions."),
            Self::StoreReadFailed => Some("Check that the repair database is readable."),
            Self::RelayUnavailable => Some("Verify the Azure OpenAI endpoint and deployment."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Failures of the ticket operations.
///
/// Store errors are carried unchanged; the variant only records whether the
/// failing call was a write or a read.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("repair '{id}' not found")]
    NotFound { id: String },

    #[error("failed to store repair ticket: {0:#}")]
    WriteFailed(anyhow::Error),

    #[error("failed to read repair tickets: {0:#}")]
    ReadFailed(anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RepairError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::TicketNotFound,
            Self::WriteFailed(_) => ErrorCode::StoreWriteFailed,
            Self::ReadFailed(_) => ErrorCode::StoreReadFailed,
            Self::Config(_) => ErrorCode::InvalidConfig,
        }
    }
}
