use thiserror::Error;

/// Failures that end a relay session. Client disconnects are carried here too
/// so the session can tell a vanished peer apart from a broken upstream.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Upstream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Client disconnected")]
    ClientGone,
}

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    Conflict(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Username already exists")]
    UserExists,

    #[error("Already registered: {0}")]
    NumberTaken(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User is disabled")]
    UserDisabled,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("No student profile for user {0}")]
    NotAStudent(u64),

    #[error("Invalid CSV file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid Excel file: {0}")]
    Excel(#[from] calamine::XlsxError),

    #[error("Workbook has no worksheets")]
    EmptyWorkbook,

    #[error(transparent)]
    Store(#[from] StoreError),
}
