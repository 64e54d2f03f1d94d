use chrono::Utc;
use db::{
    schema::users,
    user::{Role, User},
    DbConn,
};
use diesel::prelude::*;
use rocket::{response::status::Created, serde::json::Json};
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    credentials::{hash_password, MIN_PASSWORD_LEN},
    error::ApiError,
    util::{gen_uuid, is_valid_email},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SetupForm {
    pub email: String,
    pub password: String,
    /// Also create an academic administrator with the same password.
    pub academic_admin_email: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupDone {
    pub admins: Vec<User>,
}

fn insert_admin(
    conn: &mut SqliteConnection,
    email: &str,
    role: Role,
    password_hash: &str,
) -> QueryResult<User> {
    diesel::insert_into(users::table)
        .values((
            users::public_id.eq(gen_uuid().to_string()),
            users::email.eq(email),
            users::password_hash.eq(password_hash),
            users::role.eq(role),
            users::event_creation_limit.eq(0),
            users::must_change_password.eq(false),
            users::created_at.eq(Utc::now().naive_utc()),
        ))
        .returning(User::as_returning())
        .get_result(conn)
}

/// Creates the first administrator accounts. Only permitted while no event
/// administrator exists.
#[post("/admin/setup", data = "<form>")]
pub async fn do_setup(
    db: DbConn,
    span: TracingSpan,
    form: Json<SetupForm>,
) -> Result<Created<Json<SetupDone>>, ApiError> {
    let form = form.into_inner();
    let email = form.email.trim().to_string();
    let academic_email = form
        .academic_admin_email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    for address in std::iter::once(&email).chain(academic_email.iter()) {
        if !is_valid_email(address) {
            return Err(ApiError::validation(format!(
                "{address} is not a valid email address"
            )));
        }
    }
    if academic_email.as_deref() == Some(email.as_str()) {
        return Err(ApiError::validation(
            "the two administrators need different email addresses",
        ));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "passwords must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let password = form.password;
    let password_hash =
        rocket::tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;

    let span = span.0;
    let admins = db
        .run(move |conn| {
            let _guard = span.enter();
            conn.immediate_transaction(|conn| {
                let existing = users::table
                    .filter(users::role.eq(Role::EventAdmin))
                    .count()
                    .get_result::<i64>(conn)?;
                if existing > 0 {
                    return Err(ApiError::forbidden(
                        "setup has already been performed",
                    ));
                }

                let mut admins = vec![insert_admin(
                    conn,
                    &email,
                    Role::EventAdmin,
                    &password_hash,
                )?];
                if let Some(academic_email) = &academic_email {
                    admins.push(insert_admin(
                        conn,
                        academic_email,
                        Role::AcademicAdmin,
                        &password_hash,
                    )?);
                }
                tracing::info!("Created {} administrator account(s)", admins.len());
                Ok(admins)
            })
        })
        .await?;

    Ok(Created::new("/admin/users").body(Json(SetupDone { admins })))
}
