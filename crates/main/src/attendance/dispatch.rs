use std::collections::BTreeSet;

use db::{
    academic::{Employee, Student},
    event::Event,
    user::User,
};
use diesel::prelude::*;
use email::{
    templates::{
        AbsentStudent, AttendanceReport, CommitteeContact, EventHeader,
        MissedSession,
    },
    MailContext, MailDescriptor, Recipient,
};

use crate::{
    deadline::Deadline,
    error::ApiError,
    events::manage::find_event,
    permissions::{require, Permission},
};

use super::{
    load,
    reconcile::{reconcile, FacultyBundles, MissedClass, Reconciliation},
};

#[derive(Debug)]
pub enum ReportPlan {
    NoReport,
    NoConflicts,
    /// One message per faculty member, in employee id order.
    Reports(Vec<MailDescriptor>),
}

fn missed_session(missed: MissedClass) -> MissedSession {
    MissedSession {
        course_name: missed.key.course_name,
        year: missed.key.year,
        section: missed.key.section,
        subject_name: missed.key.subject_name,
        time_slot: missed.key.time_slot,
        students: missed
            .students
            .into_iter()
            .map(|student| AbsentStudent {
                student_id: student.student_id,
                name: student.name,
                class_roll_no: student.class_roll_no,
            })
            .collect(),
    }
}

/// Turns each faculty member's bundle into a report addressed to them.
/// Bundles for employees without a record are dropped.
pub fn build_reports(
    event: &Event,
    bundles: FacultyBundles,
    faculty: &[Employee],
    committee: &[CommitteeContact],
) -> Vec<MailDescriptor> {
    let header = EventHeader {
        name: event.event_name.clone(),
        start_time: event.start_time,
        end_time: event.end_time,
        venue: event.venue.clone(),
    };

    bundles
        .into_iter()
        .filter_map(|(employee_id, missed)| {
            let Some(employee) =
                faculty.iter().find(|e| e.employee_id == employee_id)
            else {
                tracing::warn!("No employee record for {employee_id}, skipping report");
                return None;
            };
            Some(MailDescriptor::new(
                Recipient::new(employee.name.clone(), employee.email.clone()),
                MailContext::AttendanceReport(AttendanceReport {
                    faculty_name: employee.name.clone(),
                    event: header.clone(),
                    sessions: missed.into_iter().map(missed_session).collect(),
                    committee: committee.to_vec(),
                }),
            ))
        })
        .collect()
}

/// Reads a consistent snapshot of the event and works out who should be told
/// about missed classes. Nothing is written.
#[tracing::instrument(skip(conn, deadline, caller))]
pub fn prepare(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    event_public_id: &str,
) -> Result<ReportPlan, ApiError> {
    conn.transaction(|conn| {
        let event = find_event(conn, event_public_id)?;
        require(caller, Permission::ManageEvent(event.id), conn)?;

        let attendees = load::attendees(conn, &event)?;
        let cohorts = attendees
            .iter()
            .map(Student::cohort)
            .collect::<BTreeSet<_>>();
        let classes = load::classes_of(conn, &cohorts)?;
        deadline.check()?;

        let bundles = match reconcile(
            event.start_time,
            event.end_time,
            &attendees,
            &classes,
        ) {
            Reconciliation::NoAttendees => return Ok(ReportPlan::NoReport),
            Reconciliation::NoConflicts => return Ok(ReportPlan::NoConflicts),
            Reconciliation::Conflicts(bundles) => bundles,
        };

        let committee = load::committee(conn, &event)?;
        let faculty = load::faculty(conn, bundles.keys())?;
        deadline.check()?;

        tracing::info!(
            "{} faculty members to notify for {}",
            bundles.len(),
            event.public_id
        );
        Ok(ReportPlan::Reports(build_reports(
            &event, bundles, &faculty, &committee,
        )))
    })
}
