use db::{schema::events, user::Role, user::User};
use diesel::prelude::*;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy)]
/// A permission for a given resource on the system.
pub enum Permission {
    /// Approve or reject requests awaiting an event administrator.
    ReviewEventRequests,
    /// Approve or reject a request made under the given fest (by row id).
    ActOnFestRequest(i64),
    /// Create new events, subject to the creation quota.
    CreateEvents,
    /// Modify the details of an event. Only the owner may do so.
    EditEvent(i64),
    /// Run an event: check people in, verify payments, manage the organizing
    /// team and send attendance reports. Owners and event administrators.
    ManageEvent(i64),
    /// Manage organizer accounts, clubs and the global event list.
    AdministerPlatform,
    ImportAcademicRecords,
}

/// Returns whether a requester has the requisite permission on the given
/// object.
#[tracing::instrument(skip(conn))]
pub fn has_permission(
    user: &User,
    permission: &Permission,
    conn: &mut SqliteConnection,
) -> QueryResult<bool> {
    match permission {
        Permission::ReviewEventRequests | Permission::AdministerPlatform => {
            Ok(user.role == Role::EventAdmin)
        }
        Permission::ImportAcademicRecords => {
            Ok(user.role == Role::AcademicAdmin)
        }
        Permission::CreateEvents => {
            Ok(user.role.may_organize())
        }
        Permission::ActOnFestRequest(fest_id) => {
            if user.role != Role::Organizer {
                return Ok(false);
            }
            owns_event(user, *fest_id, conn)
        }
        Permission::EditEvent(event_id) => owns_event(user, *event_id, conn),
        Permission::ManageEvent(event_id) => {
            if user.role == Role::EventAdmin {
                return Ok(true);
            }
            owns_event(user, *event_id, conn)
        }
    }
}

/// Revoked accounts keep their `organizer_id` on past events but lose every
/// right over them.
fn owns_event(
    user: &User,
    event_id: i64,
    conn: &mut SqliteConnection,
) -> QueryResult<bool> {
    if !user.role.may_organize() {
        return Ok(false);
    }
    let organizer = events::table
        .find(event_id)
        .select(events::organizer_id)
        .first::<i64>(conn)
        .optional()?;
    Ok(organizer == Some(user.id))
}

/// Like [`has_permission`], but fails with `Forbidden` when the permission is
/// missing.
pub fn require(
    user: &User,
    permission: Permission,
    conn: &mut SqliteConnection,
) -> Result<(), ApiError> {
    if has_permission(user, &permission, conn)? {
        Ok(())
    } else {
        Err(ApiError::forbidden(match permission {
            Permission::ReviewEventRequests
            | Permission::AdministerPlatform => {
                "only event administrators may do this"
            }
            Permission::ImportAcademicRecords => {
                "only academic administrators may do this"
            }
            Permission::CreateEvents => "your account may not create events",
            Permission::ActOnFestRequest(_) => {
                "only the organizer of the parent fest may act on this request"
            }
            Permission::EditEvent(_) => "only the event's organizer may edit it",
            Permission::ManageEvent(_) => {
                "only the event's organizer or an event administrator may do this"
            }
        }))
    }
}
