use chrono::{NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{self, FromRequest},
    Request,
};
use serde::Serialize;

use crate::{
    schema::{sessions, users},
    session::hash_token,
    DbConn,
};

text_enum! {
    /// What a user account may do. `Guest` is an account whose access has
    /// been revoked.
    pub enum Role {
        EventAdmin => "EventAdmin",
        AcademicAdmin => "AcademicAdmin",
        Organizer => "Organizer",
        SubOrganizer => "SubOrganizer",
        Guest => "Guest",
    }
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::EventAdmin | Role::AcademicAdmin)
    }

    /// Roles that may create events (against their quota).
    pub fn may_organize(&self) -> bool {
        matches!(self, Role::Organizer | Role::SubOrganizer)
    }
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub public_id: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub role: Role,
    pub event_creation_limit: i64,
    pub access_expiry_date: Option<NaiveDate>,
    pub must_change_password: bool,
    pub created_at: NaiveDateTime,
}

type WithPublicId<'a> = diesel::dsl::Eq<users::public_id, &'a str>;

type WithEmail<'a> = diesel::dsl::Eq<users::email, &'a str>;

impl User {
    pub fn with_public_id(pid: &str) -> WithPublicId<'_> {
        users::public_id.eq(pid)
    }

    pub fn with_email(email: &str) -> WithEmail<'_> {
        users::email.eq(email)
    }

    /// Whether the account's access window has closed. Accounts without an
    /// expiry date never expire.
    pub fn access_expired(&self, today: NaiveDate) -> bool {
        match self.access_expiry_date {
            Some(expiry) => expiry < today,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingOrMalformedToken,
    NoDatabase,
    Unauthorized,
    AccessExpired,
    PasswordChangeRequired,
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AuthError;

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, AuthError> {
        let db = try_outcome!(request
            .guard::<DbConn>()
            .await
            .map_error(|(t, _)| (t, AuthError::NoDatabase)));

        let token_hash = match bearer_token(request) {
            Some(token) => hash_token(token),
            None => {
                return request::Outcome::Error((
                    Status::Unauthorized,
                    AuthError::MissingOrMalformedToken,
                ));
            }
        };

        let now = Utc::now().naive_utc();
        let user = db
            .run(move |conn| {
                sessions::table
                    .filter(sessions::token_hash.eq(token_hash))
                    .filter(sessions::expires_at.gt(now))
                    .inner_join(users::table)
                    .select(User::as_select())
                    .first::<User>(conn)
                    .optional()
            })
            .await;

        match user {
            Ok(Some(user)) => {
                if user.access_expired(now.date()) {
                    tracing::trace!("Access window for {} has closed", user.public_id);
                    request::Outcome::Error((
                        Status::Forbidden,
                        AuthError::AccessExpired,
                    ))
                } else {
                    request::Outcome::Success(user)
                }
            }
            Ok(None) => request::Outcome::Error((
                Status::Unauthorized,
                AuthError::Unauthorized,
            )),
            Err(e) => {
                tracing::error!("Failed to resolve session: {e}");
                request::Outcome::Error((
                    Status::InternalServerError,
                    AuthError::NoDatabase,
                ))
            }
        }
    }
}

/// A signed-in user who has already replaced their one-time password. Every
/// route other than the password change itself requires this guard.
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ActiveUser {
    type Error = AuthError;

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, AuthError> {
        let user = try_outcome!(request.guard::<User>().await);

        if user.must_change_password {
            return request::Outcome::Error((
                Status::Forbidden,
                AuthError::PasswordChangeRequired,
            ));
        }

        request::Outcome::Success(ActiveUser(user))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::Role;

    #[test]
    fn roles_round_trip_through_their_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
        assert!("Superuser".parse::<Role>().is_err());
    }

    #[test]
    fn expiry_is_inclusive_of_the_last_day() {
        let user = super::User {
            id: 1,
            public_id: "u".to_string(),
            email: "a@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Organizer,
            event_creation_limit: 1,
            access_expiry_date: NaiveDate::from_ymd_opt(2025, 12, 31),
            must_change_password: true,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        };
        assert!(!user.access_expired(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()));
        assert!(user.access_expired(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    }
}
