//! Platform administration: organizer accounts, the global event list and
//! clubs.

use db::{
    club::Club,
    schema::{clubs, users},
    user::{ActiveUser, Role, User},
    DbConn,
};
use diesel::prelude::*;
use rocket::{response::status::Created, serde::json::Json};
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    deadline::Deadline,
    error::{ApiError, ApiResult},
    events::{
        manage::{self, EventFilter, EventView},
        routes::Deleted,
    },
    permissions::{require, Permission},
    util::gen_uuid,
};

pub mod setup;

#[get("/admin/users")]
pub async fn list_users(db: DbConn, user: ActiveUser) -> ApiResult<Vec<User>> {
    let accounts = db
        .run(move |conn| -> Result<_, ApiError> {
            require(&user.0, Permission::AdministerPlatform, conn)?;
            Ok(users::table
                .filter(users::role.ne_all([Role::EventAdmin, Role::AcademicAdmin]))
                .order_by(users::created_at.asc())
                .select(User::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(accounts))
}

#[derive(Deserialize, Debug)]
pub struct RoleChange {
    pub role: Role,
}

/// Changes an organizer's role. Demoting to `Guest` also takes away any
/// remaining event quota.
#[tracing::instrument(skip(conn, deadline, caller))]
pub fn set_role(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    public_id: &str,
    role: Role,
) -> Result<User, ApiError> {
    if !matches!(role, Role::Organizer | Role::SubOrganizer | Role::Guest) {
        return Err(ApiError::validation(format!(
            "{role} cannot be assigned here"
        )));
    }

    conn.immediate_transaction(|conn| {
        require(caller, Permission::AdministerPlatform, conn)?;

        let target = users::table
            .filter(User::with_public_id(public_id))
            .select(User::as_select())
            .first::<User>(conn)
            .optional()?
            .ok_or(ApiError::NotFound("user"))?;
        if target.role.is_admin() {
            return Err(ApiError::forbidden(
                "administrator accounts cannot be changed here",
            ));
        }

        let limit = if role == Role::Guest {
            0
        } else {
            target.event_creation_limit
        };
        let updated = diesel::update(users::table.find(target.id))
            .set((
                users::role.eq(role),
                users::event_creation_limit.eq(limit),
            ))
            .returning(User::as_returning())
            .get_result(conn)?;

        deadline.check()?;
        tracing::info!("{} is now {}", updated.public_id, updated.role);
        Ok(updated)
    })
}

#[put("/admin/users/<id>/role", data = "<body>")]
pub async fn change_role(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    id: &str,
    body: Json<RoleChange>,
) -> ApiResult<User> {
    let id = id.to_string();
    let span = span.0;
    let updated = db
        .run(move |conn| {
            let _guard = span.enter();
            set_role(conn, &deadline, &user.0, &id, body.role)
        })
        .await?;
    Ok(Json(updated))
}

#[get("/admin/events")]
pub async fn list_all_events(
    db: DbConn,
    user: ActiveUser,
) -> ApiResult<Vec<EventView>> {
    let events = db
        .run(move |conn| -> Result<_, ApiError> {
            require(&user.0, Permission::AdministerPlatform, conn)?;
            Ok(manage::list_events(
                conn,
                EventFilter {
                    fests_only: false,
                    include_past: true,
                },
            )?)
        })
        .await?;
    Ok(Json(events))
}

#[delete("/admin/events/<id>")]
pub async fn delete_any_event(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    id: &str,
) -> ApiResult<Deleted> {
    let id = id.to_string();
    let span = span.0;
    let event = db
        .run(move |conn| {
            let _guard = span.enter();
            require(&user.0, Permission::AdministerPlatform, conn)?;
            manage::delete_event(conn, &deadline, &user.0, &id)
        })
        .await?;
    Ok(Json(Deleted {
        id: event.public_id,
        message: "event and all associated data deleted",
    }))
}

#[get("/clubs")]
pub async fn list_clubs(db: DbConn) -> ApiResult<Vec<Club>> {
    let all = db
        .run(|conn| {
            clubs::table
                .order_by(clubs::club_name.asc())
                .select(Club::as_select())
                .load(conn)
        })
        .await?;
    Ok(Json(all))
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewClub {
    pub club_id: Option<String>,
    pub club_name: String,
    pub club_description: Option<String>,
    pub club_logo_url: Option<String>,
}

#[post("/admin/clubs", data = "<body>")]
pub async fn create_club(
    db: DbConn,
    user: ActiveUser,
    span: TracingSpan,
    body: Json<NewClub>,
) -> Result<Created<Json<Club>>, ApiError> {
    let club = body.into_inner();
    let name = club.club_name.trim().to_string();
    if name.is_empty() {
        return Err(ApiError::validation("clubName is required"));
    }
    let club_id = club
        .club_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| gen_uuid().to_string());

    let span = span.0;
    let created = db
        .run(move |conn| -> Result<_, ApiError> {
            let _guard = span.enter();
            require(&user.0, Permission::AdministerPlatform, conn)?;
            Ok(diesel::insert_into(clubs::table)
                .values((
                    clubs::club_id.eq(&club_id),
                    clubs::club_name.eq(&name),
                    clubs::club_description.eq(&club.club_description),
                    clubs::club_logo_url.eq(&club.club_logo_url),
                ))
                .returning(Club::as_returning())
                .get_result(conn)?)
        })
        .await?;
    Ok(Created::new("/clubs").body(Json(created)))
}

#[derive(Serialize)]
pub struct ClubDeleted {
    pub id: String,
}

/// Events that belonged to the club are kept and lose their club.
#[delete("/admin/clubs/<id>")]
pub async fn delete_club(
    db: DbConn,
    user: ActiveUser,
    id: &str,
) -> ApiResult<ClubDeleted> {
    let id = id.to_string();
    let deleted = db
        .run(move |conn| -> Result<_, ApiError> {
            require(&user.0, Permission::AdministerPlatform, conn)?;
            let n = diesel::delete(clubs::table.find(&id)).execute(conn)?;
            if n == 0 {
                return Err(ApiError::NotFound("club"));
            }
            Ok(ClubDeleted { id })
        })
        .await?;
    Ok(Json(deleted))
}
