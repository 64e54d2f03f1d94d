use db::{event::RegistrationType, user::ActiveUser, DbConn};
use rocket::{
    form::Form, fs::TempFile, response::status::Created, serde::json::Json,
    State,
};
use serde::Serialize;
use serde_json::Value;
use trace_request::TracingSpan;

use crate::{
    config::AppConfig,
    deadline::Deadline,
    error::{ApiError, ApiResult},
    util::parse_local_datetime,
};

use super::{
    create::{self, EventDraft},
    manage::{self, EventFilter, EventPatch, EventView},
    uploads,
};

/// Every text field is optional here so that missing values are reported as
/// validation errors rather than form errors.
#[derive(FromForm)]
pub struct CreateEventForm<'r> {
    #[field(name = "eventName")]
    pub event_name: Option<String>,
    #[field(name = "eventDesc")]
    pub event_desc: Option<String>,
    #[field(name = "startTime")]
    pub start_time: Option<String>,
    #[field(name = "endTime")]
    pub end_time: Option<String>,
    pub venue: Option<String>,
    #[field(name = "clubId")]
    pub club_id: Option<String>,
    #[field(name = "contactDetails")]
    pub contact_details: Option<String>,
    #[field(name = "parentId")]
    pub parent_id: Option<String>,
    #[field(name = "registrationSchema")]
    pub registration_schema: Option<String>,
    #[field(name = "registrationType")]
    pub registration_type: Option<String>,
    #[field(name = "isPaidEvent")]
    pub is_paid_event: Option<bool>,
    #[field(name = "hasLeaderboard")]
    pub has_leaderboard: Option<bool>,
    #[field(name = "showLeaderboardMarks")]
    pub show_leaderboard_marks: Option<bool>,
    #[field(name = "registrationLocked")]
    pub registration_locked: Option<bool>,
    pub banner: Option<TempFile<'r>>,
    #[field(name = "paymentQRCodes")]
    pub payment_qr_codes: Vec<TempFile<'r>>,
}

/// Registration rules (type, fee, leaderboard) cannot be changed after
/// creation, so they are absent here.
#[derive(FromForm)]
pub struct UpdateEventForm<'r> {
    #[field(name = "eventName")]
    pub event_name: Option<String>,
    #[field(name = "eventDesc")]
    pub event_desc: Option<String>,
    #[field(name = "startTime")]
    pub start_time: Option<String>,
    #[field(name = "endTime")]
    pub end_time: Option<String>,
    pub venue: Option<String>,
    #[field(name = "clubId")]
    pub club_id: Option<String>,
    #[field(name = "contactDetails")]
    pub contact_details: Option<String>,
    pub banner: Option<TempFile<'r>>,
    #[field(name = "paymentQRCodes")]
    pub payment_qr_codes: Vec<TempFile<'r>>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn time_field(
    value: &Option<String>,
    name: &str,
) -> Result<Option<chrono::NaiveDateTime>, ApiError> {
    match non_empty(value) {
        Some(s) => parse_local_datetime(&s).map(Some).ok_or_else(|| {
            ApiError::validation(format!(
                "{name} must look like YYYY-MM-DDTHH:MM"
            ))
        }),
        None => Ok(None),
    }
}

fn json_field(
    value: &Option<String>,
    name: &str,
) -> Result<Option<Value>, ApiError> {
    match non_empty(value) {
        Some(s) => serde_json::from_str(&s).map(Some).map_err(|_| {
            ApiError::validation(format!("{name} must be valid JSON"))
        }),
        None => Ok(None),
    }
}

impl CreateEventForm<'_> {
    fn to_draft(&self) -> Result<EventDraft, ApiError> {
        let required = |value: Option<String>, name: &str| {
            value.ok_or_else(|| ApiError::validation(format!("{name} is required")))
        };

        Ok(EventDraft {
            event_name: required(non_empty(&self.event_name), "eventName")?,
            event_desc: non_empty(&self.event_desc),
            start_time: time_field(&self.start_time, "startTime")?
                .ok_or_else(|| ApiError::validation("startTime is required"))?,
            end_time: time_field(&self.end_time, "endTime")?
                .ok_or_else(|| ApiError::validation("endTime is required"))?,
            venue: required(non_empty(&self.venue), "venue")?,
            club_id: non_empty(&self.club_id),
            parent_id: non_empty(&self.parent_id),
            registration_type: match non_empty(&self.registration_type) {
                Some(t) => t
                    .parse::<RegistrationType>()
                    .map_err(|e| ApiError::validation(e.to_string()))?,
                None => RegistrationType::Individual,
            },
            is_paid_event: self.is_paid_event.unwrap_or(false),
            has_leaderboard: self.has_leaderboard.unwrap_or(false),
            show_leaderboard_marks: self.show_leaderboard_marks.unwrap_or(false),
            registration_locked: self.registration_locked.unwrap_or(false),
            registration_schema: json_field(
                &self.registration_schema,
                "registrationSchema",
            )?
            .unwrap_or_else(|| Value::Array(Vec::new())),
            contact_details: json_field(&self.contact_details, "contactDetails")?
                .ok_or_else(|| {
                    ApiError::validation("contactDetails is required")
                })?,
            banner_url: None,
            payment_qr_codes: Vec::new(),
        })
    }
}

/// Stores the banner and QR code uploads, returning their public paths.
async fn store_files(
    config: &AppConfig,
    banner: Option<&mut TempFile<'_>>,
    qr_codes: &mut [TempFile<'_>],
) -> Result<(Option<String>, Vec<String>), ApiError> {
    let banner_url = match banner {
        Some(file) if file.len() > 0 => {
            Some(uploads::store(&config.upload_root, file, "banner").await?)
        }
        _ => None,
    };

    let mut codes = Vec::with_capacity(qr_codes.len());
    for file in qr_codes.iter_mut().filter(|file| file.len() > 0) {
        codes.push(uploads::store(&config.upload_root, file, "qr").await?);
    }
    Ok((banner_url, codes))
}

async fn discard_files(
    config: &AppConfig,
    banner: &Option<String>,
    codes: &[String],
) {
    for path in banner.iter().chain(codes.iter()) {
        uploads::discard(&config.upload_root, path).await;
    }
}

#[post("/events", data = "<form>")]
pub async fn create_event(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    config: &State<AppConfig>,
    mut form: Form<CreateEventForm<'_>>,
) -> Result<Created<Json<EventView>>, ApiError> {
    let mut draft = form.to_draft()?;

    let form = &mut *form;
    let (banner_url, codes) = store_files(
        config,
        form.banner.as_mut(),
        &mut form.payment_qr_codes,
    )
    .await?;
    draft.banner_url = banner_url.clone();
    draft.payment_qr_codes = codes.clone();

    let organizer_email = user.0.email.clone();
    let parent_id = draft.parent_id.clone();
    let span = span.0;
    let result = db
        .run(move |conn| {
            let _guard = span.enter();
            create::create_event(conn, &deadline, &user.0, &draft)
        })
        .await;

    match result {
        Ok(event) => Ok(Created::new(format!("/events/{}", event.public_id))
            .body(Json(EventView::new(event, organizer_email, parent_id)))),
        Err(e) => {
            discard_files(config, &banner_url, &codes).await;
            Err(e)
        }
    }
}

#[put("/events/<id>", data = "<form>")]
pub async fn update_event(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    config: &State<AppConfig>,
    id: &str,
    mut form: Form<UpdateEventForm<'_>>,
) -> ApiResult<EventView> {
    let f = &*form;
    let mut patch = EventPatch {
        event_name: non_empty(&f.event_name),
        event_desc: non_empty(&f.event_desc),
        start_time: time_field(&f.start_time, "startTime")?,
        end_time: time_field(&f.end_time, "endTime")?,
        venue: non_empty(&f.venue),
        club_id: non_empty(&f.club_id),
        contact_details: json_field(&f.contact_details, "contactDetails")?,
        banner_url: None,
        payment_qr_codes: None,
    };

    let form = &mut *form;
    let (banner_url, codes) = store_files(
        config,
        form.banner.as_mut(),
        &mut form.payment_qr_codes,
    )
    .await?;
    patch.banner_url = banner_url.clone();
    if !codes.is_empty() {
        patch.payment_qr_codes = Some(codes.clone());
    }

    let id = id.to_string();
    let span = span.0;
    let result = db
        .run(move |conn| {
            let _guard = span.enter();
            manage::update_event(conn, &deadline, &user.0, &id, &patch)?;
            manage::event_detail(conn, &id)
        })
        .await;

    match result {
        Ok(view) => Ok(Json(view)),
        Err(e) => {
            discard_files(config, &banner_url, &codes).await;
            Err(e)
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deleted {
    pub id: String,
    pub message: &'static str,
}

#[delete("/events/<id>")]
pub async fn delete_event(
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
            manage::delete_event(conn, &deadline, &user.0, &id)
        })
        .await?;
    Ok(Json(Deleted {
        id: event.public_id,
        message: "event and all associated data deleted",
    }))
}

#[derive(FromForm, Default)]
pub struct ListQuery {
    #[field(name = "type")]
    pub kind: Option<String>,
    pub include: Option<String>,
}

#[get("/events?<query..>")]
pub async fn list_events(db: DbConn, query: ListQuery) -> ApiResult<Vec<EventView>> {
    let filter = EventFilter {
        fests_only: query.kind.as_deref() == Some("Fest"),
        include_past: query.include.as_deref() == Some("all"),
    };
    Ok(Json(db.run(move |conn| manage::list_events(conn, filter)).await?))
}

#[get("/events/<id>")]
pub async fn get_event(db: DbConn, id: &str) -> ApiResult<EventView> {
    let id = id.to_string();
    Ok(Json(db.run(move |conn| manage::event_detail(conn, &id)).await?))
}

#[get("/organizer/my-events")]
pub async fn my_events(db: DbConn, user: ActiveUser) -> ApiResult<Vec<EventView>> {
    Ok(Json(
        db.run(move |conn| manage::events_owned_by(conn, &user.0))
            .await?,
    ))
}
