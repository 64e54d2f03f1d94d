//! The people who run an event: student and employee organisers and
//! committee members.

use db::{
    participation::{EventMember, Member, MemberRef, MemberRole, MemberType, PaymentStatus},
    schema::event_members,
    user::User,
};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    deadline::Deadline,
    error::ApiError,
    events::manage::find_event,
    permissions::{require, Permission},
    util::gen_uuid,
};

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CommitteeEntry {
    pub id: String,
    pub member_id: String,
    pub member_type: MemberType,
    pub role: MemberRole,
    /// `None` when the academic record has since been removed.
    pub member: Option<Member>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewCommitteeMember {
    pub member_id: String,
    pub member_type: MemberType,
    pub role: MemberRole,
}

/// Loads the committee rows of an event, ordered by when they were added.
pub fn committee_rows(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> QueryResult<Vec<EventMember>> {
    event_members::table
        .filter(event_members::event_id.eq(event_id))
        .filter(event_members::role.eq_any(MemberRole::COMMITTEE))
        .order_by(event_members::id.asc())
        .select(EventMember::as_select())
        .load(conn)
}

pub fn list_committee(
    conn: &mut SqliteConnection,
    caller: &User,
    event_public_id: &str,
) -> Result<Vec<CommitteeEntry>, ApiError> {
    let event = find_event(conn, event_public_id)?;
    require(caller, Permission::ManageEvent(event.id), conn)?;

    let mut entries = Vec::new();
    for row in committee_rows(conn, event.id)? {
        let member = row.member_ref().resolve(conn)?;
        entries.push(CommitteeEntry {
            id: row.public_id,
            member_id: row.member_id,
            member_type: row.member_type,
            role: row.role,
            member,
        });
    }
    Ok(entries)
}

#[tracing::instrument(skip(conn, deadline, caller))]
pub fn add_committee_member(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    event_public_id: &str,
    new: &NewCommitteeMember,
) -> Result<CommitteeEntry, ApiError> {
    if !new.role.is_committee() {
        return Err(ApiError::validation(format!(
            "{} is not an organizing role",
            new.role
        )));
    }
    let member_ref =
        MemberRef::new(new.member_type, new.member_id.trim().to_string());
    if member_ref.id().is_empty() {
        return Err(ApiError::validation("memberId is required"));
    }

    conn.immediate_transaction(|conn| {
        let event = find_event(conn, event_public_id)?;
        require(caller, Permission::ManageEvent(event.id), conn)?;

        let member = member_ref
            .resolve(conn)?
            .ok_or(ApiError::NotFound(match member_ref {
                MemberRef::Student(_) => "student",
                MemberRef::Employee(_) => "employee",
            }))?;

        let existing = event_members::table
            .filter(event_members::event_id.eq(event.id))
            .filter(event_members::member_id.eq(member_ref.id()))
            .filter(event_members::role.eq(new.role))
            .count()
            .get_result::<i64>(conn)?;
        if existing > 0 {
            return Err(ApiError::conflict(
                "this person already has that role on the team",
            ));
        }

        let public_id = gen_uuid().to_string();
        diesel::insert_into(event_members::table)
            .values((
                event_members::public_id.eq(&public_id),
                event_members::event_id.eq(event.id),
                event_members::member_id.eq(member_ref.id()),
                event_members::member_type.eq(member_ref.member_type()),
                event_members::role.eq(new.role),
                event_members::payment_status.eq(PaymentStatus::NotApplicable),
                event_members::checked_in.eq(false),
            ))
            .execute(conn)?;

        deadline.check()?;
        Ok(CommitteeEntry {
            id: public_id,
            member_id: member_ref.id().to_string(),
            member_type: member_ref.member_type(),
            role: new.role,
            member: Some(member),
        })
    })
}

#[tracing::instrument(skip(conn, deadline, caller))]
pub fn remove_committee_member(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    event_public_id: &str,
    member_public_id: &str,
) -> Result<(), ApiError> {
    conn.immediate_transaction(|conn| {
        let event = find_event(conn, event_public_id)?;
        require(caller, Permission::ManageEvent(event.id), conn)?;

        let n = diesel::delete(
            event_members::table
                .filter(event_members::event_id.eq(event.id))
                .filter(event_members::public_id.eq(member_public_id))
                .filter(event_members::role.eq_any(MemberRole::COMMITTEE)),
        )
        .execute(conn)?;
        if n == 0 {
            return Err(ApiError::NotFound("team member"));
        }

        deadline.check()?;
        Ok(())
    })
}
