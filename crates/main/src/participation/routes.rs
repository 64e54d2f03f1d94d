use db::{user::ActiveUser, DbConn};
use email::{Delivery, Mailer};
use rocket::{response::status::Created, serde::json::Json, State};
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    deadline::Deadline,
    error::{ApiError, ApiResult},
};

use super::{
    check_in,
    payments::{self, ParticipantView, PaymentTarget, PendingPayments},
    registration::{self, Receipt, Registration},
    team::{self, CommitteeEntry, NewCommitteeMember},
};

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckInForm {
    pub event_id: String,
    pub student_id: String,
}

#[post("/organizer/check-in", data = "<body>")]
pub async fn check_in_student(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    body: Json<CheckInForm>,
) -> ApiResult<ParticipantView> {
    let span = span.0;
    let member = db
        .run(move |conn| {
            let _guard = span.enter();
            check_in::check_in(
                conn,
                &deadline,
                &user.0,
                body.event_id.trim(),
                body.student_id.trim(),
            )
        })
        .await?;
    Ok(Json(ParticipantView::from(member)))
}

#[post("/events/<id>/register", data = "<body>")]
pub async fn register(
    db: DbConn,
    deadline: Deadline,
    span: TracingSpan,
    id: &str,
    body: Json<Registration>,
) -> Result<Created<Json<Receipt>>, ApiError> {
    let id = id.to_string();
    let span = span.0;
    let receipt = db
        .run(move |conn| {
            let _guard = span.enter();
            registration::register(conn, &deadline, &id, &body)
        })
        .await?;
    Ok(Created::new(format!("/events/{}", receipt.event_id)).body(Json(receipt)))
}

#[get("/organizer/event/<id>/verifications")]
pub async fn pending_verifications(
    db: DbConn,
    user: ActiveUser,
    id: &str,
) -> ApiResult<PendingPayments> {
    let id = id.to_string();
    Ok(Json(
        db.run(move |conn| payments::pending_verifications(conn, &user.0, &id))
            .await?,
    ))
}

#[derive(Deserialize, Debug)]
pub struct PaymentDecision {
    #[serde(rename = "type")]
    pub target: PaymentTarget,
    pub id: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledged {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deliveries: Vec<Delivery>,
}

#[post("/organizer/verify-payment", data = "<body>")]
pub async fn verify_payment(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    body: Json<PaymentDecision>,
) -> ApiResult<Acknowledged> {
    let span = span.0;
    db.run(move |conn| {
        let _guard = span.enter();
        payments::verify_payment(conn, &deadline, &user.0, body.target, &body.id)
    })
    .await?;
    Ok(Json(Acknowledged {
        message: "payment verified",
        deliveries: Vec::new(),
    }))
}

#[post("/organizer/reject-payment", data = "<body>")]
pub async fn reject_payment(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    mailer: &State<Mailer>,
    body: Json<PaymentDecision>,
) -> ApiResult<Acknowledged> {
    let span = span.0;
    let mail = db
        .run(move |conn| {
            let _guard = span.enter();
            payments::reject_payment(
                conn,
                &deadline,
                &user.0,
                body.target,
                &body.id,
                &body.reason,
            )
        })
        .await?;

    let deliveries = mailer.dispatch_all(mail, &db).await;
    Ok(Json(Acknowledged {
        message: "payment rejected and registration deleted",
        deliveries,
    }))
}

#[get("/organizer/event/<id>/team")]
pub async fn list_team(
    db: DbConn,
    user: ActiveUser,
    id: &str,
) -> ApiResult<Vec<CommitteeEntry>> {
    let id = id.to_string();
    Ok(Json(
        db.run(move |conn| team::list_committee(conn, &user.0, &id))
            .await?,
    ))
}

#[post("/organizer/event/<id>/team", data = "<body>")]
pub async fn add_team_member(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    id: &str,
    body: Json<NewCommitteeMember>,
) -> Result<Created<Json<CommitteeEntry>>, ApiError> {
    let id = id.to_string();
    let location = format!("/organizer/event/{id}/team");
    let span = span.0;
    let entry = db
        .run(move |conn| {
            let _guard = span.enter();
            team::add_committee_member(conn, &deadline, &user.0, &id, &body)
        })
        .await?;
    Ok(Created::new(location).body(Json(entry)))
}

#[delete("/organizer/event/<id>/team/<member>")]
pub async fn remove_team_member(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    id: &str,
    member: &str,
) -> ApiResult<Acknowledged> {
    let id = id.to_string();
    let member = member.to_string();
    let span = span.0;
    db.run(move |conn| {
        let _guard = span.enter();
        team::remove_committee_member(conn, &deadline, &user.0, &id, &member)
    })
    .await?;
    Ok(Json(Acknowledged {
        message: "team member removed",
        deliveries: Vec::new(),
    }))
}
