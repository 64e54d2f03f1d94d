use std::io::Cursor;

use rocket::{
    http::{ContentType, Status},
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::Serialize;
use thiserror::Error;

/// The broad class of an error, as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    InvalidState,
    PaymentNotVerified,
    QuotaExceeded,
    Internal,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("the student is not registered for this event")]
    NotRegistered,
    #[error("the student has already been checked in")]
    AlreadyCheckedIn,
    #[error("payment has not been verified")]
    PaymentNotVerified,
    #[error("event creation limit reached")]
    QuotaExceeded,
    #[error("the request took too long and was abandoned")]
    DeadlineExceeded,
    #[error("database error: {0}")]
    Database(diesel::result::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Unauthenticated => ErrorKind::Unauthenticated,
            ApiError::Forbidden(_) => ErrorKind::Forbidden,
            ApiError::NotFound(_) | ApiError::NotRegistered => {
                ErrorKind::NotFound
            }
            ApiError::Conflict(_) | ApiError::AlreadyCheckedIn => {
                ErrorKind::Conflict
            }
            ApiError::InvalidState(_) => ErrorKind::InvalidState,
            ApiError::PaymentNotVerified => ErrorKind::PaymentNotVerified,
            ApiError::QuotaExceeded => ErrorKind::QuotaExceeded,
            ApiError::DeadlineExceeded
            | ApiError::Database(_)
            | ApiError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> Status {
        if let ApiError::DeadlineExceeded = self {
            return Status::ServiceUnavailable;
        }
        match self.kind() {
            ErrorKind::Validation => Status::BadRequest,
            ErrorKind::Unauthenticated => Status::Unauthorized,
            ErrorKind::PaymentNotVerified => Status::PaymentRequired,
            ErrorKind::Forbidden | ErrorKind::QuotaExceeded => Status::Forbidden,
            ErrorKind::NotFound => Status::NotFound,
            ErrorKind::Conflict | ErrorKind::InvalidState => Status::Conflict,
            ErrorKind::Internal => Status::InternalServerError,
        }
    }

    /// The message shown to clients. Internal details are never included.
    fn public_message(&self) -> String {
        match self {
            ApiError::Database(_) | ApiError::Internal(_) => {
                "an internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        ApiError::Conflict(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        ApiError::InvalidState(msg.into())
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                ApiError::Conflict(format!(
                    "a conflicting record already exists ({})",
                    info.message()
                ))
            }
            e => ApiError::Database(e),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match &self {
            ApiError::Database(_) | ApiError::Internal(_) => {
                tracing::error!("{self}")
            }
            ApiError::DeadlineExceeded => tracing::warn!("{self}"),
            _ => tracing::trace!("Refusing request: {self}"),
        }

        let body = serde_json::to_string(&ErrorBody {
            error: self.kind(),
            message: self.public_message(),
        })
        .map_err(|_| Status::InternalServerError)?;

        Response::build()
            .status(self.status())
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

macro_rules! json_catcher {
    ($name:ident, $code:literal, $kind:expr, $message:literal) => {
        #[catch($code)]
        pub fn $name() -> Json<ErrorBody> {
            Json(ErrorBody {
                error: $kind,
                message: $message.to_string(),
            })
        }
    };
}

json_catcher!(bad_request, 400, ErrorKind::Validation, "malformed request");
json_catcher!(
    unauthorized,
    401,
    ErrorKind::Unauthenticated,
    "a valid bearer token is required"
);
json_catcher!(
    forbidden,
    403,
    ErrorKind::Forbidden,
    "you may not perform this action"
);
json_catcher!(not_found, 404, ErrorKind::NotFound, "no such resource");
json_catcher!(conflict, 409, ErrorKind::Conflict, "conflict");
json_catcher!(
    unprocessable,
    422,
    ErrorKind::Validation,
    "the request body could not be understood"
);
json_catcher!(internal, 500, ErrorKind::Internal, "an internal error occurred");

#[cfg(test)]
mod tests {
    use rocket::http::Status;

    use super::{ApiError, ErrorKind};

    #[test]
    fn statuses_follow_kinds() {
        assert_eq!(ApiError::PaymentNotVerified.status(), Status::PaymentRequired);
        assert_eq!(ApiError::AlreadyCheckedIn.status(), Status::Conflict);
        assert_eq!(ApiError::NotRegistered.kind(), ErrorKind::NotFound);
        assert_eq!(ApiError::QuotaExceeded.status(), Status::Forbidden);
        assert_eq!(
            ApiError::invalid_state("done").status(),
            Status::Conflict
        );
        assert_eq!(
            ApiError::DeadlineExceeded.status(),
            Status::ServiceUnavailable
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let error = ApiError::Internal("disk on fire".to_string());
        assert!(!error.public_message().contains("disk"));
        assert_eq!(
            ApiError::validation("bad email").public_message(),
            "bad email"
        );
    }
}
