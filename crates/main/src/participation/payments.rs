//! Organizer review of registration payments.

use db::{
    academic::Student,
    event::Event,
    participation::{EventMember, MemberRole, PaymentStatus, Team},
    schema::{event_members, events, students, teams},
    user::User,
};
use diesel::prelude::*;
use email::{templates::PaymentRejected, MailContext, MailDescriptor, Recipient};
use serde::{Deserialize, Serialize};

use crate::{
    deadline::Deadline,
    error::ApiError,
    events::manage::find_event,
    permissions::{require, Permission},
};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Team,
    Individual,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TeamView {
    pub id: String,
    pub team_name: String,
    pub team_leader_student_id: String,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_screenshot_path: Option<String>,
    pub student_ids: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: String,
    pub student_id: String,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_screenshot_path: Option<String>,
    pub checked_in: bool,
}

impl From<EventMember> for ParticipantView {
    fn from(member: EventMember) -> Self {
        Self {
            id: member.public_id,
            student_id: member.member_id,
            payment_status: member.payment_status,
            transaction_id: member.transaction_id,
            payment_screenshot_path: member.payment_screenshot_path,
            checked_in: member.checked_in,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct PendingPayments {
    pub teams: Vec<TeamView>,
    pub individuals: Vec<ParticipantView>,
}

/// Teams and individual participants whose payment awaits verification.
pub fn pending_verifications(
    conn: &mut SqliteConnection,
    caller: &User,
    event_public_id: &str,
) -> Result<PendingPayments, ApiError> {
    let event = find_event(conn, event_public_id)?;
    require(caller, Permission::ManageEvent(event.id), conn)?;

    let pending_teams = teams::table
        .filter(teams::event_id.eq(event.id))
        .filter(teams::payment_status.eq(PaymentStatus::Pending))
        .order_by(teams::id.asc())
        .select(Team::as_select())
        .load(conn)?;

    let mut team_views = Vec::with_capacity(pending_teams.len());
    for team in pending_teams {
        let student_ids = event_members::table
            .filter(event_members::team_id.eq(team.id))
            .order_by(event_members::id.asc())
            .select(event_members::member_id)
            .load::<String>(conn)?;
        team_views.push(TeamView {
            id: team.public_id,
            team_name: team.team_name,
            team_leader_student_id: team.team_leader_student_id,
            payment_status: team.payment_status,
            transaction_id: team.transaction_id,
            payment_screenshot_path: team.payment_screenshot_path,
            student_ids,
        });
    }

    let individuals = event_members::table
        .filter(event_members::event_id.eq(event.id))
        .filter(event_members::team_id.is_null())
        .filter(event_members::role.eq(MemberRole::Participant))
        .filter(event_members::payment_status.eq(PaymentStatus::Pending))
        .order_by(event_members::id.asc())
        .select(EventMember::as_select())
        .load(conn)?
        .into_iter()
        .map(ParticipantView::from)
        .collect();

    Ok(PendingPayments {
        teams: team_views,
        individuals,
    })
}

/// A registration whose payment is under review, with the event it belongs
/// to and the student who answers for it.
struct Payer {
    event: Event,
    row_id: i64,
    student_id: String,
}

fn find_payer(
    conn: &mut SqliteConnection,
    target: PaymentTarget,
    public_id: &str,
) -> Result<Payer, ApiError> {
    let found = match target {
        PaymentTarget::Team => teams::table
            .inner_join(events::table)
            .filter(teams::public_id.eq(public_id))
            .select((teams::id, teams::team_leader_student_id, Event::as_select()))
            .first::<(i64, String, Event)>(conn)
            .optional()?,
        PaymentTarget::Individual => event_members::table
            .inner_join(events::table)
            .filter(event_members::public_id.eq(public_id))
            .filter(event_members::role.eq(MemberRole::Participant))
            .filter(event_members::team_id.is_null())
            .select((
                event_members::id,
                event_members::member_id,
                Event::as_select(),
            ))
            .first::<(i64, String, Event)>(conn)
            .optional()?,
    };
    let (row_id, student_id, event) =
        found.ok_or(ApiError::NotFound("registration"))?;
    Ok(Payer {
        event,
        row_id,
        student_id,
    })
}

/// Marks a pending payment as verified.
#[tracing::instrument(skip(conn, deadline, caller))]
pub fn verify_payment(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    target: PaymentTarget,
    public_id: &str,
) -> Result<(), ApiError> {
    conn.immediate_transaction(|conn| {
        let payer = find_payer(conn, target, public_id)?;
        require(caller, Permission::ManageEvent(payer.event.id), conn)?;

        let n = match target {
            PaymentTarget::Team => diesel::update(teams::table.find(payer.row_id))
                .filter(teams::payment_status.eq(PaymentStatus::Pending))
                .set(teams::payment_status.eq(PaymentStatus::Verified))
                .execute(conn)?,
            PaymentTarget::Individual => {
                diesel::update(event_members::table.find(payer.row_id))
                    .filter(event_members::payment_status.eq(PaymentStatus::Pending))
                    .set(event_members::payment_status.eq(PaymentStatus::Verified))
                    .execute(conn)?
            }
        };
        if n == 0 {
            return Err(ApiError::invalid_state(
                "this payment is not awaiting verification",
            ));
        }

        deadline.check()?;
        tracing::info!("Verified payment for {}", payer.student_id);
        Ok(())
    })
}

/// Rejects a payment by deleting the registration it belongs to. Deleting a
/// team removes its members too. The returned mail tells the student (the
/// leader, for teams) why.
#[tracing::instrument(skip(conn, deadline, caller))]
pub fn reject_payment(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    target: PaymentTarget,
    public_id: &str,
    reason: &str,
) -> Result<Vec<MailDescriptor>, ApiError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ApiError::validation("a reason is required"));
    }

    conn.immediate_transaction(|conn| {
        let payer = find_payer(conn, target, public_id)?;
        require(caller, Permission::ManageEvent(payer.event.id), conn)?;

        let student = students::table
            .find(&payer.student_id)
            .select(Student::as_select())
            .first(conn)
            .optional()?;

        match target {
            PaymentTarget::Team => {
                diesel::delete(teams::table.find(payer.row_id)).execute(conn)?
            }
            PaymentTarget::Individual => {
                diesel::delete(event_members::table.find(payer.row_id))
                    .execute(conn)?
            }
        };

        deadline.check()?;
        tracing::info!(
            "Rejected payment for {} at {}",
            payer.student_id,
            payer.event.public_id
        );

        Ok(match student {
            Some(student) => vec![MailDescriptor::new(
                Recipient::new(student.name.clone(), student.email),
                MailContext::PaymentRejected(PaymentRejected {
                    event_name: payer.event.event_name,
                    registrant: student.name,
                    reason: reason.to_string(),
                }),
            )],
            None => {
                tracing::warn!(
                    "No student record for {}, rejection not mailed",
                    payer.student_id
                );
                Vec::new()
            }
        })
    })
}
