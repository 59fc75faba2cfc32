use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::access::RequestStatus;

#[derive(Debug, Error, Diagnostic)]
pub enum PortalError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("unknown parameter category: {0}")]
    UnknownCategory(String),

    #[error("unknown state or union territory: {0}")]
    UnknownState(String),

    #[error("coastal region {coast} is not listed under {state}")]
    UnknownCoast { state: String, coast: String },

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("invalid request status: {0}")]
    InvalidStatus(String),

    #[error("You already have a PENDING request. Please wait for Admin approval.")]
    PendingRequestExists,

    #[error("request {id} is already {from}; cannot move it to {to}")]
    InvalidTransition {
        id: i64,
        from: RequestStatus,
        to: RequestStatus,
    },

    #[error("access request not found: {0}")]
    RequestNotFound(i64),

    #[error("operation requires the Admin role")]
    Forbidden,

    #[error("data access not granted (current status: {status})")]
    AccessNotGranted { status: String },

    #[error("storage request failed: {0}")]
    StorageHttp(String),

    #[error("storage returned status {status}: {message}")]
    StorageStatus { status: u16, message: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("error reading file {file}: {message}")]
    UnreadableUpload { file: String, message: String },

    #[error("unsupported upload format: {0} (upload a .csv file)")]
    UnsupportedUpload(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("certificate rendering failed: {0}")]
    Certificate(String),

    #[error("failed to write export: {0}")]
    Export(String),
}
