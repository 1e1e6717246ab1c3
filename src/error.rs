use crate::ebay::trading::TradingError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("`{code}`: {message}")]
pub struct SyncError {
    code: &'static str,
    message: String,
    kind: SyncErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// Required reference data is absent (country, subdivision, currency, ...).
    NotFound,
    /// More than one record carries the same external id.
    Duplicate,
    /// The marketplace answered with an error payload.
    RemoteRejection,
    /// Computed and reported values disagree.
    Integrity,
    /// Transport level failure talking to the marketplace.
    Remote,
    InvalidPayload,
    Storage,
    InvalidTransition,
}

impl SyncError {
    fn new(code: &'static str, message: impl Into<String>, kind: SyncErrorKind) -> Self {
        Self {
            code,
            message: message.into(),
            kind,
        }
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::NotFound)
    }

    pub fn duplicate(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::Duplicate)
    }

    pub fn remote_rejection(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::RemoteRejection)
    }

    pub fn integrity(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::Integrity)
    }

    pub fn remote(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::Remote)
    }

    pub fn invalid_payload(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::InvalidPayload)
    }

    pub fn storage(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::Storage)
    }

    pub fn invalid_transition(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, message, SyncErrorKind::InvalidTransition)
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn kind(&self) -> SyncErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }
}

impl From<TradingError> for SyncError {
    fn from(value: TradingError) -> Self {
        match value {
            TradingError::Rejected { call, messages } => Self::remote_rejection(
                "call_failed",
                format!("{call} rejected: {}", messages.join(", ")),
            ),
            other => Self::remote("trading_api", other.to_string()),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::storage("store", value.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
