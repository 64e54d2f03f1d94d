use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use db::{
    event::{Event, RegistrationType},
    schema::{clubs, events, users},
    user::User,
};
use diesel::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::{
    deadline::Deadline,
    error::ApiError,
    permissions::{require, Permission},
};

use super::create::check_window;

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubEventSummary {
    pub id: String,
    pub event_name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    pub id: String,
    pub event_name: String,
    pub event_desc: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub venue: String,
    pub organizer_email: String,
    pub club_id: Option<String>,
    pub parent_id: Option<String>,
    pub registration_type: RegistrationType,
    pub is_paid_event: bool,
    pub has_leaderboard: bool,
    pub show_leaderboard_marks: bool,
    pub registration_locked: bool,
    pub registration_schema: Value,
    #[serde(rename = "paymentQRCodes")]
    pub payment_qr_codes: Vec<String>,
    pub banner_url: Option<String>,
    pub contact_details: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_events: Option<Vec<SubEventSummary>>,
}

impl EventView {
    pub fn new(
        event: Event,
        organizer_email: String,
        parent_public_id: Option<String>,
    ) -> Self {
        Self {
            payment_qr_codes: event.qr_codes(),
            registration_schema: event.registration_schema_json(),
            contact_details: event.contact_details_json(),
            id: event.public_id,
            event_name: event.event_name,
            event_desc: event.event_desc,
            start_time: event.start_time,
            end_time: event.end_time,
            venue: event.venue,
            organizer_email,
            club_id: event.club_id,
            parent_id: parent_public_id,
            registration_type: event.registration_type,
            is_paid_event: event.is_paid_event,
            has_leaderboard: event.has_leaderboard,
            show_leaderboard_marks: event.show_leaderboard_marks,
            registration_locked: event.registration_locked,
            banner_url: event.banner_url,
            sub_events: None,
        }
    }
}

pub fn find_event(
    conn: &mut SqliteConnection,
    public_id: &str,
) -> Result<Event, ApiError> {
    events::table
        .filter(Event::with_public_id(public_id))
        .select(Event::as_select())
        .first(conn)
        .optional()?
        .ok_or(ApiError::NotFound("event"))
}

/// Turns rows (with their organizer's email) into views, filling in parent
/// public ids with one extra query.
fn to_views(
    conn: &mut SqliteConnection,
    rows: Vec<(Event, String)>,
) -> QueryResult<Vec<EventView>> {
    let parent_ids = rows
        .iter()
        .filter_map(|(event, _)| event.parent_id)
        .collect::<Vec<_>>();
    let parents = if parent_ids.is_empty() {
        HashMap::new()
    } else {
        events::table
            .filter(events::id.eq_any(parent_ids))
            .select((events::id, events::public_id))
            .load::<(i64, String)>(conn)?
            .into_iter()
            .collect::<HashMap<_, _>>()
    };

    Ok(rows
        .into_iter()
        .map(|(event, email)| {
            let parent = event.parent_id.and_then(|id| parents.get(&id).cloned());
            EventView::new(event, email, parent)
        })
        .collect())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    /// Only top-level events with at least one sub-event.
    pub fests_only: bool,
    /// Include events that have already ended.
    pub include_past: bool,
}

pub fn list_events(
    conn: &mut SqliteConnection,
    filter: EventFilter,
) -> QueryResult<Vec<EventView>> {
    let mut query = events::table
        .inner_join(users::table)
        .select((Event::as_select(), users::email))
        .order_by((events::start_time.asc(), events::id.asc()))
        .into_boxed();

    if !filter.include_past {
        query = query.filter(events::end_time.ge(Utc::now().naive_utc()));
    }

    let rows = query.load::<(Event, String)>(conn)?;

    let rows = if filter.fests_only {
        let parents_with_children = events::table
            .filter(events::parent_id.is_not_null())
            .select(events::parent_id)
            .distinct()
            .load::<Option<i64>>(conn)?;
        rows.into_iter()
            .filter(|(event, _)| {
                event.parent_id.is_none()
                    && parents_with_children.contains(&Some(event.id))
            })
            .collect()
    } else {
        rows
    };

    to_views(conn, rows)
}

pub fn events_owned_by(
    conn: &mut SqliteConnection,
    user: &User,
) -> QueryResult<Vec<EventView>> {
    let rows = events::table
        .inner_join(users::table)
        .filter(events::organizer_id.eq(user.id))
        .select((Event::as_select(), users::email))
        .order_by((events::start_time.asc(), events::id.asc()))
        .load::<(Event, String)>(conn)?;
    to_views(conn, rows)
}

/// An event with its sub-events.
pub fn event_detail(
    conn: &mut SqliteConnection,
    public_id: &str,
) -> Result<EventView, ApiError> {
    let event = find_event(conn, public_id)?;
    let email = users::table
        .find(event.organizer_id)
        .select(users::email)
        .first::<String>(conn)?;
    let event_id = event.id;

    let mut view = to_views(conn, vec![(event, email)])?
        .pop()
        .ok_or(ApiError::NotFound("event"))?;

    let subs = events::table
        .filter(events::parent_id.eq(event_id))
        .order_by((events::start_time.asc(), events::id.asc()))
        .select((
            events::public_id,
            events::event_name,
            events::start_time,
            events::end_time,
        ))
        .load::<(String, String, NaiveDateTime, NaiveDateTime)>(conn)?;

    view.sub_events = Some(
        subs.into_iter()
            .map(|(id, event_name, start_time, end_time)| SubEventSummary {
                id,
                event_name,
                start_time,
                end_time,
            })
            .collect(),
    );
    Ok(view)
}

/// The editable subset of an event. `None` leaves a field unchanged.
/// Registration rules are fixed once the event exists.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub event_name: Option<String>,
    pub event_desc: Option<String>,
    pub start_time: Option<NaiveDateTime>,
    pub end_time: Option<NaiveDateTime>,
    pub venue: Option<String>,
    pub club_id: Option<String>,
    pub contact_details: Option<Value>,
    pub banner_url: Option<String>,
    pub payment_qr_codes: Option<Vec<String>>,
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = events)]
struct EventChanges {
    event_name: Option<String>,
    event_desc: Option<String>,
    start_time: Option<NaiveDateTime>,
    end_time: Option<NaiveDateTime>,
    venue: Option<String>,
    club_id: Option<String>,
    contact_details: Option<String>,
    banner_url: Option<String>,
    payment_qr_codes: Option<String>,
}

impl EventChanges {
    fn is_empty(&self) -> bool {
        self.event_name.is_none()
            && self.event_desc.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.venue.is_none()
            && self.club_id.is_none()
            && self.contact_details.is_none()
            && self.banner_url.is_none()
            && self.payment_qr_codes.is_none()
    }
}

/// A sub-event must stay inside its fest, and a fest must keep containing
/// all of its sub-events.
fn check_nesting(
    conn: &mut SqliteConnection,
    event: &Event,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<(), ApiError> {
    if let Some(parent_id) = event.parent_id {
        let (fest_start, fest_end) = events::table
            .find(parent_id)
            .select((events::start_time, events::end_time))
            .first::<(NaiveDateTime, NaiveDateTime)>(conn)?;
        if start < fest_start || end > fest_end {
            return Err(ApiError::validation(
                "a sub-event must take place within its fest",
            ));
        }
    }

    let outside = events::table
        .filter(events::parent_id.eq(event.id))
        .filter(events::start_time.lt(start).or(events::end_time.gt(end)))
        .count()
        .get_result::<i64>(conn)?;
    if outside > 0 {
        return Err(ApiError::validation(
            "the fest must still contain all of its sub-events",
        ));
    }
    Ok(())
}

#[tracing::instrument(skip(conn, deadline, patch))]
pub fn update_event(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    user: &User,
    public_id: &str,
    patch: &EventPatch,
) -> Result<Event, ApiError> {
    if let Some(details) = &patch.contact_details {
        if !details.is_object() {
            return Err(ApiError::validation(
                "contactDetails must be a JSON object",
            ));
        }
    }

    conn.immediate_transaction(|conn| {
        let event = find_event(conn, public_id)?;
        require(user, Permission::EditEvent(event.id), conn)?;

        let start = patch.start_time.unwrap_or(event.start_time);
        let end = patch.end_time.unwrap_or(event.end_time);
        check_window(start, end)?;
        if patch.start_time.is_some() || patch.end_time.is_some() {
            check_nesting(conn, &event, start, end)?;
        }

        if let Some(club_id) = &patch.club_id {
            let exists = clubs::table
                .find(club_id)
                .count()
                .get_result::<i64>(conn)?;
            if exists == 0 {
                return Err(ApiError::NotFound("club"));
            }
        }

        let changes = EventChanges {
            event_name: patch
                .event_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            event_desc: patch.event_desc.clone(),
            start_time: patch.start_time,
            end_time: patch.end_time,
            venue: patch
                .venue
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            club_id: patch.club_id.clone(),
            contact_details: patch.contact_details.as_ref().map(Value::to_string),
            banner_url: patch.banner_url.clone(),
            payment_qr_codes: patch
                .payment_qr_codes
                .as_ref()
                .map(|codes| {
                    serde_json::to_string(codes)
                        .map_err(|e| ApiError::Internal(e.to_string()))
                })
                .transpose()?,
        };

        if changes.is_empty() {
            return Ok(event);
        }

        let updated = diesel::update(events::table.find(event.id))
            .set(&changes)
            .returning(Event::as_returning())
            .get_result(conn)?;

        deadline.check()?;
        Ok(updated)
    })
}

/// Deletes an event. Sub-events, teams, members, scores and requirements go
/// with it.
#[tracing::instrument(skip(conn, deadline))]
pub fn delete_event(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    user: &User,
    public_id: &str,
) -> Result<Event, ApiError> {
    conn.immediate_transaction(|conn| {
        let event = find_event(conn, public_id)?;
        require(user, Permission::ManageEvent(event.id), conn)?;

        diesel::delete(events::table.find(event.id)).execute(conn)?;

        deadline.check()?;
        tracing::info!("Deleted event {}", event.public_id);
        Ok(event)
    })
}
