use chrono::NaiveDateTime;
use db::{
    event_request::{EventRequest, RequestScope, RequestStatus},
    user::ActiveUser,
    DbConn,
};
use email::Mailer;
use rocket::{response::status::Created, serde::json::Json, State};
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    credentials::issue_one_time_password,
    deadline::Deadline,
    error::{ApiError, ApiResult},
    permissions::{require, Permission},
    util::parse_date,
};

use super::lifecycle::{self, ListedRequest, NewEventRequest};

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    pub id: String,
    pub requestor_email: String,
    pub event_details: String,
    pub request_type: String,
    pub scope: RequestScope,
    pub parent_fest_id: Option<String>,
    pub requested_event_count: i64,
    pub status: RequestStatus,
    pub created_at: NaiveDateTime,
}

impl RequestView {
    fn new(request: EventRequest, parent_fest_id: Option<String>) -> Self {
        Self {
            id: request.public_id,
            requestor_email: request.requestor_email,
            event_details: request.event_details,
            request_type: request.request_type,
            scope: request.scope,
            parent_fest_id,
            requested_event_count: request.requested_event_count,
            status: request.status,
            created_at: request.created_at,
        }
    }
}

fn views(listed: Vec<ListedRequest>) -> Vec<RequestView> {
    listed
        .into_iter()
        .map(|(request, parent)| RequestView::new(request, parent))
        .collect()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub id: String,
    pub status: RequestStatus,
}

impl From<&EventRequest> for StatusView {
    fn from(request: &EventRequest) -> Self {
        Self {
            id: request.public_id.clone(),
            status: request.status,
        }
    }
}

#[post("/requests", data = "<body>")]
pub async fn submit_request(
    db: DbConn,
    deadline: Deadline,
    span: TracingSpan,
    body: Json<NewEventRequest>,
) -> Result<Created<Json<StatusView>>, ApiError> {
    let span = span.0;
    let request = db
        .run(move |conn| {
            let _guard = span.enter();
            lifecycle::submit(conn, &deadline, &body)
        })
        .await?;

    Ok(Created::new(format!("/requests/{}", request.public_id))
        .body(Json(StatusView::from(&request))))
}

#[get("/admin/requests")]
pub async fn admin_pending_requests(
    db: DbConn,
    user: ActiveUser,
) -> ApiResult<Vec<RequestView>> {
    let listed = db
        .run(move |conn| -> Result<_, ApiError> {
            require(&user.0, Permission::ReviewEventRequests, conn)?;
            Ok(lifecycle::list_pending_admin(conn)?)
        })
        .await?;
    Ok(Json(views(listed)))
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ApproveForm {
    pub event_creation_limit: Option<i64>,
    pub access_expiry_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedAccount {
    pub request: StatusView,
    pub user_email: String,
    /// Shown exactly once. Only its hash is stored.
    pub temp_password: String,
}

#[post("/admin/requests/<id>/approve", data = "<body>")]
pub async fn admin_approve_request(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    mailer: &State<Mailer>,
    id: &str,
    body: Json<ApproveForm>,
) -> ApiResult<IssuedAccount> {
    let limit = body.event_creation_limit.ok_or_else(|| {
        ApiError::validation("eventCreationLimit is required")
    })?;
    let expiry = body
        .access_expiry_date
        .as_deref()
        .and_then(parse_date)
        .ok_or_else(|| {
            ApiError::validation("accessExpiryDate must be a YYYY-MM-DD date")
        })?;

    let credential =
        rocket::tokio::task::spawn_blocking(issue_one_time_password)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??;

    let id = id.to_string();
    let span = span.0;
    let approval = db
        .run(move |conn| {
            let _guard = span.enter();
            lifecycle::admin_approve(
                conn,
                &deadline,
                &user.0,
                &id,
                limit,
                expiry,
                credential,
            )
        })
        .await?;

    mailer.dispatch_all(approval.outcome.mail, &db).await;

    Ok(Json(IssuedAccount {
        request: StatusView::from(&approval.outcome.request),
        user_email: approval.user_email,
        temp_password: approval.one_time_password,
    }))
}

#[post("/admin/requests/<id>/reject")]
pub async fn admin_reject_request(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    mailer: &State<Mailer>,
    id: &str,
) -> ApiResult<StatusView> {
    let id = id.to_string();
    let span = span.0;
    let outcome = db
        .run(move |conn| {
            let _guard = span.enter();
            lifecycle::admin_reject(conn, &deadline, &user.0, &id)
        })
        .await?;

    let view = StatusView::from(&outcome.request);
    mailer.dispatch_all(outcome.mail, &db).await;
    Ok(Json(view))
}

#[get("/organizer/requests/pending")]
pub async fn organizer_pending_requests(
    db: DbConn,
    user: ActiveUser,
) -> ApiResult<Vec<RequestView>> {
    let listed = db
        .run(move |conn| lifecycle::list_pending_for_organizer(conn, &user.0))
        .await?;
    Ok(Json(views(listed)))
}

#[post("/organizer/requests/<id>/approve")]
pub async fn organizer_approve_request(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    mailer: &State<Mailer>,
    id: &str,
) -> ApiResult<StatusView> {
    let id = id.to_string();
    let span = span.0;
    let outcome = db
        .run(move |conn| {
            let _guard = span.enter();
            lifecycle::main_organizer_approve(conn, &deadline, &user.0, &id)
        })
        .await?;

    let view = StatusView::from(&outcome.request);
    mailer.dispatch_all(outcome.mail, &db).await;
    Ok(Json(view))
}

#[post("/organizer/requests/<id>/reject")]
pub async fn organizer_reject_request(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    mailer: &State<Mailer>,
    id: &str,
) -> ApiResult<StatusView> {
    let id = id.to_string();
    let span = span.0;
    let outcome = db
        .run(move |conn| {
            let _guard = span.enter();
            lifecycle::main_organizer_reject(conn, &deadline, &user.0, &id)
        })
        .await?;

    let view = StatusView::from(&outcome.request);
    mailer.dispatch_all(outcome.mail, &db).await;
    Ok(Json(view))
}
