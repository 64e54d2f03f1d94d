use db::{schema::sessions, session::hash_token, DbConn};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};

use super::PresentedToken;

#[derive(Serialize)]
pub struct LoggedOut {
    pub message: &'static str,
}

#[post("/auth/logout")]
pub async fn logout(db: DbConn, token: PresentedToken) -> ApiResult<LoggedOut> {
    let token_hash = hash_token(&token.0);
    let n = db
        .run(move |conn| {
            diesel::delete(
                sessions::table.filter(sessions::token_hash.eq(token_hash)),
            )
            .execute(conn)
        })
        .await?;
    if n == 0 {
        return Err(ApiError::Unauthenticated);
    }
    Ok(Json(LoggedOut {
        message: "logged out",
    }))
}
