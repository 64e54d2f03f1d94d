use db::{schema::users, user::User, DbConn};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    credentials::{hash_password, verify_password, MIN_PASSWORD_LEN},
    error::{ApiError, ApiResult},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChanged {
    pub message: &'static str,
    pub must_change_password: bool,
}

/// Replaces the caller's password. This is the one route open to users who
/// still hold a one-time password, and using it lifts that restriction.
#[post("/auth/change-password", data = "<form>")]
pub async fn change_password(
    db: DbConn,
    user: User,
    span: TracingSpan,
    form: Json<ChangePasswordForm>,
) -> ApiResult<PasswordChanged> {
    let form = form.into_inner();
    if form.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "the new password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let stored = user.password_hash.clone();
    let new_hash = rocket::tokio::task::spawn_blocking(move || {
        if !verify_password(&form.old_password, &stored) {
            return Err(ApiError::forbidden("the current password is incorrect"));
        }
        hash_password(&form.new_password)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))??;

    let span = span.0;
    db.run(move |conn| {
        let _guard = span.enter();
        diesel::update(users::table.find(user.id))
            .set((
                users::password_hash.eq(new_hash),
                users::must_change_password.eq(false),
            ))
            .execute(conn)?;
        tracing::info!("Password changed for {}", user.public_id);
        Ok::<_, ApiError>(())
    })
    .await?;

    Ok(Json(PasswordChanged {
        message: "password changed",
        must_change_password: false,
    }))
}
