use chrono::{Duration, NaiveDateTime, Utc};
use db::{
    schema::{sessions, users},
    session::hash_token,
    user::{Role, User},
    DbConn,
};
use diesel::prelude::*;
use rocket::{serde::json::Json, State};
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    config::AppConfig,
    credentials::verify_password,
    error::{ApiError, ApiResult},
    util::secure_random,
};

/// Length of a bearer token. Only its digest is stored.
pub const TOKEN_LEN: usize = 48;

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub must_change_password: bool,
    pub expires_at: NaiveDateTime,
}

/// Checks the credentials and opens a session. The same error is returned for
/// an unknown email as for a wrong password.
#[tracing::instrument(skip(conn, password))]
pub fn open_session(
    conn: &mut SqliteConnection,
    email: &str,
    password: &str,
    ttl_hours: i64,
) -> Result<LoginResponse, ApiError> {
    let user = users::table
        .filter(User::with_email(email.trim()))
        .select(User::as_select())
        .first::<User>(conn)
        .optional()?;

    let user = match user {
        Some(user) if verify_password(password, &user.password_hash) => user,
        _ => {
            tracing::trace!("Refused login");
            return Err(ApiError::Unauthenticated);
        }
    };

    let now = Utc::now().naive_utc();
    if user.access_expired(now.date()) {
        return Err(ApiError::forbidden("your access to the platform has expired"));
    }

    let token = secure_random(TOKEN_LEN);
    let expires_at = now + Duration::hours(ttl_hours);
    diesel::insert_into(sessions::table)
        .values((
            sessions::token_hash.eq(hash_token(&token)),
            sessions::user_id.eq(user.id),
            sessions::created_at.eq(now),
            sessions::expires_at.eq(expires_at),
        ))
        .execute(conn)?;

    tracing::info!("Opened session for {}", user.public_id);
    Ok(LoginResponse {
        token,
        role: user.role,
        must_change_password: user.must_change_password,
        expires_at,
    })
}

#[post("/auth/login", data = "<form>")]
pub async fn login(
    db: DbConn,
    span: TracingSpan,
    config: &State<AppConfig>,
    form: Json<LoginForm>,
) -> ApiResult<LoginResponse> {
    let ttl_hours = config.session_ttl_hours;
    let span = span.0;
    let response = db
        .run(move |conn| {
            let _guard = span.enter();
            open_session(conn, &form.email, &form.password, ttl_hours)
        })
        .await?;
    Ok(Json(response))
}
