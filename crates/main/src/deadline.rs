use std::{
    convert::Infallible,
    time::{Duration, Instant},
};

use rocket::{
    request::{self, FromRequest},
    Request,
};

use crate::{config::AppConfig, error::ApiError};

/// The point in time after which an operation must not commit.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Deadline(Instant::now() + duration)
    }

    /// A deadline far enough away that it never fires.
    pub fn unbounded() -> Self {
        Deadline::after(Duration::from_secs(60 * 60 * 24))
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Call before committing (and between expensive stages). Returning the
    /// error from a transaction closure rolls the transaction back.
    pub fn check(&self) -> Result<(), ApiError> {
        if self.expired() {
            Err(ApiError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Deadline {
    type Error = Infallible;

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, Infallible> {
        let ms = request
            .rocket()
            .state::<AppConfig>()
            .map(|config| config.request_deadline_ms)
            .unwrap_or_else(|| AppConfig::default().request_deadline_ms);

        request::Outcome::Success(
            *request.local_cache(|| Deadline::after(Duration::from_millis(ms))),
        )
    }
}
