//! Event creation against the organizer's quota.

use chrono::{NaiveDateTime, Utc};
use db::{
    event::{Event, RegistrationType},
    event_request::{RequestScope, RequestStatus},
    schema::{clubs, event_requests, events, users},
    user::{Role, User},
};
use diesel::prelude::*;
use serde_json::Value;

use crate::{
    deadline::Deadline,
    error::ApiError,
    permissions::{require, Permission},
    util::gen_uuid,
};

/// A validated event, ready to be stored.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub event_name: String,
    pub event_desc: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub venue: String,
    pub club_id: Option<String>,
    /// Public id of the parent fest, for sub-events.
    pub parent_id: Option<String>,
    pub registration_type: RegistrationType,
    pub is_paid_event: bool,
    pub has_leaderboard: bool,
    pub show_leaderboard_marks: bool,
    pub registration_locked: bool,
    pub registration_schema: Value,
    pub contact_details: Value,
    pub banner_url: Option<String>,
    pub payment_qr_codes: Vec<String>,
}

pub fn check_window(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<(), ApiError> {
    if end <= start {
        return Err(ApiError::validation("endTime must be after startTime"));
    }
    Ok(())
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.event_name.trim().is_empty() {
            return Err(ApiError::validation("eventName is required"));
        }
        if self.venue.trim().is_empty() {
            return Err(ApiError::validation("venue is required"));
        }
        check_window(self.start_time, self.end_time)?;
        if !self.registration_schema.is_array() {
            return Err(ApiError::validation(
                "registrationSchema must be a JSON list",
            ));
        }
        if !self.contact_details.is_object() {
            return Err(ApiError::validation(
                "contactDetails must be a JSON object",
            ));
        }
        Ok(())
    }
}

/// Checks that `organizer` may hang a sub-event off `parent`, and that the
/// sub-event's window lies inside the parent's.
fn check_parent(
    conn: &mut SqliteConnection,
    organizer: &User,
    parent: &Event,
    draft: &EventDraft,
) -> Result<(), ApiError> {
    if parent.parent_id.is_some() {
        return Err(ApiError::validation(
            "sub-events can only be created under a top-level event",
        ));
    }
    if draft.start_time < parent.start_time || draft.end_time > parent.end_time
    {
        return Err(ApiError::validation(
            "a sub-event must take place within its fest",
        ));
    }

    let allowed = match organizer.role {
        Role::Organizer => parent.organizer_id == organizer.id,
        Role::SubOrganizer => {
            let approved = event_requests::table
                .filter(event_requests::requestor_email.eq(&organizer.email))
                .filter(event_requests::scope.eq(RequestScope::PartOfFest))
                .filter(event_requests::status.eq(RequestStatus::Approved))
                .filter(event_requests::parent_fest_id.eq(parent.id))
                .count()
                .get_result::<i64>(conn)?;
            approved > 0
        }
        _ => false,
    };
    if !allowed {
        return Err(ApiError::forbidden(
            "you may not create sub-events under this fest",
        ));
    }
    Ok(())
}

/// Creates an event and spends one unit of the creator's quota. Both happen
/// in one transaction; the decrement only applies if the counter still holds
/// the value that was checked.
#[tracing::instrument(skip(conn, deadline, draft), fields(event_name = %draft.event_name))]
pub fn create_event(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    organizer: &User,
    draft: &EventDraft,
) -> Result<Event, ApiError> {
    draft.validate()?;

    conn.immediate_transaction(|conn| {
        require(organizer, Permission::CreateEvents, conn)?;

        let limit = users::table
            .find(organizer.id)
            .select(users::event_creation_limit)
            .first::<i64>(conn)?;
        if limit <= 0 {
            return Err(ApiError::QuotaExceeded);
        }

        if let Some(club_id) = &draft.club_id {
            let exists = clubs::table
                .find(club_id)
                .count()
                .get_result::<i64>(conn)?;
            if exists == 0 {
                return Err(ApiError::NotFound("club"));
            }
        }

        let parent_id = match &draft.parent_id {
            Some(pid) => {
                let parent = events::table
                    .filter(Event::with_public_id(pid))
                    .select(Event::as_select())
                    .first(conn)
                    .optional()?
                    .ok_or(ApiError::NotFound("parent event"))?;
                check_parent(conn, organizer, &parent, draft)?;
                Some(parent.id)
            }
            None if organizer.role == Role::SubOrganizer => {
                return Err(ApiError::forbidden(
                    "sub-organizers may only create sub-events of their fest",
                ));
            }
            None => None,
        };

        let event = diesel::insert_into(events::table)
            .values((
                events::public_id.eq(gen_uuid().to_string()),
                events::event_name.eq(draft.event_name.trim()),
                events::event_desc.eq(&draft.event_desc),
                events::start_time.eq(draft.start_time),
                events::end_time.eq(draft.end_time),
                events::venue.eq(draft.venue.trim()),
                events::organizer_id.eq(organizer.id),
                events::club_id.eq(&draft.club_id),
                events::parent_id.eq(parent_id),
                events::registration_type.eq(draft.registration_type),
                events::is_paid_event.eq(draft.is_paid_event),
                events::has_leaderboard.eq(draft.has_leaderboard),
                events::show_leaderboard_marks.eq(draft.show_leaderboard_marks),
                events::registration_locked.eq(draft.registration_locked),
                events::registration_schema
                    .eq(draft.registration_schema.to_string()),
                events::payment_qr_codes
                    .eq(serde_json::to_string(&draft.payment_qr_codes)
                        .map_err(|e| ApiError::Internal(e.to_string()))?),
                events::banner_url.eq(&draft.banner_url),
                events::contact_details.eq(draft.contact_details.to_string()),
                events::created_at.eq(Utc::now().naive_utc()),
            ))
            .returning(Event::as_returning())
            .get_result(conn)?;

        let n = diesel::update(users::table)
            .filter(users::id.eq(organizer.id))
            .filter(users::event_creation_limit.eq(limit))
            .set(users::event_creation_limit.eq(limit - 1))
            .execute(conn)?;
        if n == 0 {
            return Err(ApiError::QuotaExceeded);
        }

        deadline.check()?;

        tracing::info!(
            "Created event {} ({} creations left)",
            event.public_id,
            limit - 1
        );
        Ok(event)
    })
}
