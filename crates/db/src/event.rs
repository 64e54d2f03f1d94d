use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::schema::events;

text_enum! {
    pub enum RegistrationType {
        Individual => "Individual",
        Team => "Team",
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = events)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Event {
    pub id: i64,
    pub public_id: String,
    pub event_name: String,
    pub event_desc: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub venue: String,
    pub organizer_id: i64,
    pub club_id: Option<String>,
    pub parent_id: Option<i64>,
    pub registration_type: RegistrationType,
    pub is_paid_event: bool,
    pub has_leaderboard: bool,
    pub show_leaderboard_marks: bool,
    pub registration_locked: bool,
    /// JSON list of custom registration fields, in display order.
    pub registration_schema: String,
    /// JSON list of `/uploads/` paths.
    pub payment_qr_codes: String,
    pub banner_url: Option<String>,
    /// JSON object.
    pub contact_details: String,
    pub created_at: NaiveDateTime,
}

type WithPublicId<'a> = diesel::dsl::Eq<events::public_id, &'a str>;

impl Event {
    pub fn with_public_id(pid: &str) -> WithPublicId<'_> {
        events::public_id.eq(pid)
    }

    pub fn is_sub_event(&self) -> bool {
        self.parent_id.is_some()
    }
}

impl Event {
    /// The stored payment QR code paths. A malformed column reads as empty.
    pub fn qr_codes(&self) -> Vec<String> {
        serde_json::from_str(&self.payment_qr_codes).unwrap_or_default()
    }

    pub fn contact_details_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.contact_details)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    pub fn registration_schema_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.registration_schema)
            .unwrap_or_else(|_| serde_json::Value::Array(Vec::new()))
    }
}
