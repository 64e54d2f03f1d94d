use db::{
    event::{Event, RegistrationType},
    participation::{MemberRole, MemberType, PaymentStatus},
    schema::{event_members, students, teams},
};
use diesel::prelude::*;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    deadline::Deadline, error::ApiError, events::manage::find_event,
    util::gen_uuid,
};

use super::check_in::find_participant;

/// A registration as submitted. Individual events read `student_id`; team
/// events read `team_name` and `student_ids`, the first of which leads.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub student_id: Option<String>,
    pub team_name: Option<String>,
    pub student_ids: Vec<String>,
    pub transaction_id: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub event_id: String,
    /// Set for team registrations.
    pub team_id: Option<String>,
    pub student_ids: Vec<String>,
    pub payment_status: PaymentStatus,
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn ensure_registrable(
    conn: &mut SqliteConnection,
    event: &Event,
    student_id: &str,
) -> Result<(), ApiError> {
    let exists = students::table
        .find(student_id)
        .count()
        .get_result::<i64>(conn)?;
    if exists == 0 {
        return Err(ApiError::NotFound("student"));
    }
    if find_participant(conn, event, student_id)?.is_some() {
        return Err(ApiError::conflict(format!(
            "{student_id} is already registered for this event"
        )));
    }
    Ok(())
}

fn insert_participant(
    conn: &mut SqliteConnection,
    event: &Event,
    student_id: &str,
    team_id: Option<i64>,
    payment_status: PaymentStatus,
    transaction_id: Option<&str>,
) -> QueryResult<usize> {
    diesel::insert_into(event_members::table)
        .values((
            event_members::public_id.eq(gen_uuid().to_string()),
            event_members::event_id.eq(event.id),
            event_members::member_id.eq(student_id),
            event_members::member_type.eq(MemberType::Student),
            event_members::role.eq(MemberRole::Participant),
            event_members::team_id.eq(team_id),
            event_members::payment_status.eq(payment_status),
            event_members::checked_in.eq(false),
            event_members::transaction_id.eq(transaction_id),
        ))
        .execute(conn)
}

/// Registers a student, or a team of students, for an event.
///
/// Paid events start out `Pending` until an organizer verifies the payment;
/// free ones are `N/A`. For teams the payment is tracked on the team and the
/// individual members are `N/A`.
#[tracing::instrument(skip(conn, deadline))]
pub fn register(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    event_public_id: &str,
    registration: &Registration,
) -> Result<Receipt, ApiError> {
    conn.immediate_transaction(|conn| {
        let event = find_event(conn, event_public_id)?;
        if event.registration_locked {
            return Err(ApiError::forbidden(
                "registration for this event is closed",
            ));
        }

        let payment_status = if event.is_paid_event {
            PaymentStatus::Pending
        } else {
            PaymentStatus::NotApplicable
        };
        let transaction_id = trimmed(&registration.transaction_id);

        let receipt = match event.registration_type {
            RegistrationType::Individual => {
                let student_id = trimmed(&registration.student_id)
                    .ok_or_else(|| ApiError::validation("studentId is required"))?;
                ensure_registrable(conn, &event, &student_id)?;
                insert_participant(
                    conn,
                    &event,
                    &student_id,
                    None,
                    payment_status,
                    transaction_id.as_deref(),
                )?;
                Receipt {
                    event_id: event.public_id.clone(),
                    team_id: None,
                    student_ids: vec![student_id],
                    payment_status,
                }
            }
            RegistrationType::Team => {
                let team_name = trimmed(&registration.team_name)
                    .ok_or_else(|| ApiError::validation("teamName is required"))?;
                let student_ids = registration
                    .student_ids
                    .iter()
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect::<Vec<_>>();
                let Some(leader) = student_ids.first().cloned() else {
                    return Err(ApiError::validation(
                        "a team needs at least one student",
                    ));
                };
                if let Some(dup) = student_ids.iter().duplicates().next() {
                    return Err(ApiError::validation(format!(
                        "{dup} is listed more than once"
                    )));
                }
                for student_id in &student_ids {
                    ensure_registrable(conn, &event, student_id)?;
                }

                let (team_id, team_public_id) = diesel::insert_into(teams::table)
                    .values((
                        teams::public_id.eq(gen_uuid().to_string()),
                        teams::event_id.eq(event.id),
                        teams::team_name.eq(&team_name),
                        teams::team_leader_student_id.eq(&leader),
                        teams::payment_status.eq(payment_status),
                        teams::transaction_id.eq(&transaction_id),
                    ))
                    .returning((teams::id, teams::public_id))
                    .get_result::<(i64, String)>(conn)?;

                for student_id in &student_ids {
                    insert_participant(
                        conn,
                        &event,
                        student_id,
                        Some(team_id),
                        PaymentStatus::NotApplicable,
                        None,
                    )?;
                }
                Receipt {
                    event_id: event.public_id.clone(),
                    team_id: Some(team_public_id),
                    student_ids,
                    payment_status,
                }
            }
        };

        deadline.check()?;
        tracing::info!(
            "Registered {:?} for {}",
            receipt.student_ids,
            event.public_id
        );
        Ok(receipt)
    })
}
