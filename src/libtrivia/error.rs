use thiserror::Error;

/// A fault in the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("question is required")]
    MissingText,
    #[error("answer is required")]
    MissingAnswer,
    #[error("difficulty must be between 1 and 5, got {0}")]
    DifficultyOutOfRange(i64),
}

/// A request body that is JSON but not of the expected shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("`{0}` is required")]
    Missing(&'static str),
    #[error("`{0}` must be {1}")]
    WrongType(&'static str, &'static str),
    #[error("unrecognized request body")]
    Unrecognized,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// The outcomes a request can fail with, each mapped to one HTTP status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Unprocessable Content")]
    Unprocessable,
    #[error("Internal Server Error")]
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        log::error!("[DB] Storage fault: {}", err);
        ApiError::Internal
    }
}

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        log::debug!("[HTTP] Rejected payload: {}", err);
        ApiError::Unprocessable
    }
}
