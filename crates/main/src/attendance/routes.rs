use db::{user::ActiveUser, DbConn};
use email::{Delivery, Mailer};
use rocket::{serde::json::Json, State};
use serde::Serialize;
use trace_request::TracingSpan;

use crate::{deadline::Deadline, error::ApiResult};

use super::dispatch::{self, ReportPlan};

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Nobody has been checked in yet.
    NoReport,
    NoConflicts,
    Sent,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRun {
    pub status: RunStatus,
    pub deliveries: Vec<Delivery>,
}

#[post("/attendance/<id>/send-attendance")]
pub async fn send_attendance(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    mailer: &State<Mailer>,
    id: &str,
) -> ApiResult<AttendanceRun> {
    let id = id.to_string();
    let span = span.0;
    let plan = db
        .run(move |conn| {
            let _guard = span.enter();
            dispatch::prepare(conn, &deadline, &user.0, &id)
        })
        .await?;

    let run = match plan {
        ReportPlan::NoReport => AttendanceRun {
            status: RunStatus::NoReport,
            deliveries: Vec::new(),
        },
        ReportPlan::NoConflicts => AttendanceRun {
            status: RunStatus::NoConflicts,
            deliveries: Vec::new(),
        },
        ReportPlan::Reports(mail) => AttendanceRun {
            status: RunStatus::Sent,
            deliveries: mailer.dispatch_all(mail, &db).await,
        },
    };
    Ok(Json(run))
}
