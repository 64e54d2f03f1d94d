use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::{event_request_transitions, event_requests};

text_enum! {
    /// Where a request sits in the approval lifecycle. `Approved` and
    /// `Rejected` are terminal.
    pub enum RequestStatus {
        PendingAdmin => "Pending_Admin",
        PendingMainOrganizer => "Pending_Main_Organizer",
        Approved => "Approved",
        Rejected => "Rejected",
    }
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

text_enum! {
    pub enum RequestScope {
        Standalone => "Standalone",
        PartOfFest => "Part of Fest",
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = event_requests)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EventRequest {
    pub id: i64,
    pub public_id: String,
    pub requestor_email: String,
    pub event_details: String,
    pub request_type: String,
    pub scope: RequestScope,
    pub parent_fest_id: Option<i64>,
    pub requested_event_count: i64,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// An entry in a request's status history. The first entry of every request
/// has no `from_status`.
#[derive(Debug, Queryable, Selectable, Clone, PartialEq)]
#[diesel(table_name = event_request_transitions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RequestTransition {
    pub id: i64,
    pub request_id: i64,
    pub from_status: Option<RequestStatus>,
    pub to_status: RequestStatus,
    pub actor_id: Option<i64>,
    pub created_at: NaiveDateTime,
}
