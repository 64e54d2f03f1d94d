//! Admitting registered students to an event.
//!
//! Each check below is a hard stop, and they run in a fixed order so that the
//! error a caller sees does not depend on timing. Once set, `checked_in` is
//! never cleared.

use db::{
    event::Event,
    participation::{EventMember, MemberRole, MemberType, PaymentStatus},
    schema::{event_members, teams},
    user::User,
};
use diesel::prelude::*;

use crate::{
    deadline::Deadline,
    error::ApiError,
    events::manage::find_event,
    permissions::{require, Permission},
};

/// Finds the participant row for `student_id`, if they registered.
pub fn find_participant(
    conn: &mut SqliteConnection,
    event: &Event,
    student_id: &str,
) -> QueryResult<Option<EventMember>> {
    event_members::table
        .filter(event_members::event_id.eq(event.id))
        .filter(event_members::member_id.eq(student_id))
        .filter(event_members::member_type.eq(MemberType::Student))
        .filter(event_members::role.eq(MemberRole::Participant))
        .select(EventMember::as_select())
        .first(conn)
        .optional()
}

/// The payment that covers `member`: their team's if they registered as part
/// of one, their own otherwise.
fn covering_payment(
    conn: &mut SqliteConnection,
    member: &EventMember,
) -> QueryResult<PaymentStatus> {
    match member.team_id {
        Some(team_id) => teams::table
            .find(team_id)
            .select(teams::payment_status)
            .first(conn),
        None => Ok(member.payment_status),
    }
}

#[tracing::instrument(skip(conn, deadline, caller), fields(caller = caller.id))]
pub fn check_in(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    event_public_id: &str,
    student_id: &str,
) -> Result<EventMember, ApiError> {
    conn.immediate_transaction(|conn| {
        let event = find_event(conn, event_public_id)?;
        require(caller, Permission::ManageEvent(event.id), conn)?;

        let member = find_participant(conn, &event, student_id)?
            .ok_or(ApiError::NotRegistered)?;
        if member.checked_in {
            return Err(ApiError::AlreadyCheckedIn);
        }

        if event.is_paid_event
            && covering_payment(conn, &member)? != PaymentStatus::Verified
        {
            tracing::trace!("Refusing check-in of {student_id}: unpaid");
            return Err(ApiError::PaymentNotVerified);
        }

        let n = diesel::update(event_members::table.find(member.id))
            .filter(event_members::checked_in.eq(false))
            .set(event_members::checked_in.eq(true))
            .execute(conn)?;
        if n == 0 {
            return Err(ApiError::AlreadyCheckedIn);
        }

        deadline.check()?;
        tracing::info!("Checked in {student_id} at {}", event.public_id);
        Ok(EventMember {
            checked_in: true,
            ..member
        })
    })
}
