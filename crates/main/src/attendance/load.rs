use std::collections::{BTreeSet, HashSet};

use db::{
    academic::{Cohort, Employee, Student, TimeTable, TimeTableEntry},
    event::Event,
    participation::{MemberRole, MemberType},
    schema::{
        courses, employees, event_members, students, subjects, time_table_entries,
        time_tables,
    },
};
use diesel::prelude::*;
use email::templates::CommitteeContact;

use super::reconcile::ScheduledClass;

/// Checked-in students of an event. Members whose student or course record is
/// missing are left out.
pub fn attendees(
    conn: &mut SqliteConnection,
    event: &Event,
) -> QueryResult<Vec<Student>> {
    let member_ids = event_members::table
        .filter(event_members::event_id.eq(event.id))
        .filter(event_members::member_type.eq(MemberType::Student))
        .filter(event_members::checked_in.eq(true))
        .select(event_members::member_id)
        .load::<String>(conn)?;
    if member_ids.is_empty() {
        return Ok(Vec::new());
    }

    let found = students::table
        .filter(students::student_id.eq_any(&member_ids))
        .order_by(students::student_id.asc())
        .select(Student::as_select())
        .load(conn)?;
    let known_courses = courses::table
        .select(courses::course_id)
        .load::<String>(conn)?
        .into_iter()
        .collect::<HashSet<_>>();

    let found_ids = found
        .iter()
        .map(|s| s.student_id.as_str())
        .collect::<HashSet<_>>();
    for missing in member_ids.iter().filter(|id| !found_ids.contains(id.as_str())) {
        tracing::warn!("Checked-in member {missing} has no student record");
    }

    Ok(found
        .into_iter()
        .filter(|student| {
            let known = known_courses.contains(&student.course_id);
            if !known {
                tracing::warn!(
                    "Student {} belongs to unknown course {}",
                    student.student_id,
                    student.course_id
                );
            }
            known
        })
        .collect())
}

/// Every timetabled class of the given cohorts.
pub fn classes_of(
    conn: &mut SqliteConnection,
    cohorts: &BTreeSet<Cohort>,
) -> QueryResult<Vec<ScheduledClass>> {
    let mut table_ids = Vec::new();
    for cohort in cohorts {
        table_ids.extend(
            time_tables::table
                .filter(time_tables::course_id.eq(&cohort.course_id))
                .filter(time_tables::year.eq(cohort.year))
                .filter(time_tables::section.eq(&cohort.section))
                .select(time_tables::time_table_id)
                .load::<String>(conn)?,
        );
    }
    if table_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = time_table_entries::table
        .inner_join(time_tables::table.inner_join(courses::table))
        .inner_join(subjects::table)
        .filter(time_table_entries::time_table_id.eq_any(&table_ids))
        .order_by(time_table_entries::entry_id.asc())
        .select((
            TimeTableEntry::as_select(),
            TimeTable::as_select(),
            courses::course_name,
            subjects::subject_name,
        ))
        .load::<(TimeTableEntry, TimeTable, String, String)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(entry, table, course_name, subject_name)| ScheduledClass {
            entry_id: entry.entry_id,
            cohort: table.cohort(),
            course_name,
            subject_name,
            employee_id: entry.employee_id,
            day: entry.day,
            time_slot: entry.time_slot,
        })
        .collect())
}

/// The student organisers and committee members of an event, for the
/// contact list at the foot of each report.
pub fn committee(
    conn: &mut SqliteConnection,
    event: &Event,
) -> QueryResult<Vec<CommitteeContact>> {
    let rows = event_members::table
        .inner_join(
            students::table.on(students::student_id.eq(event_members::member_id)),
        )
        .filter(event_members::event_id.eq(event.id))
        .filter(event_members::member_type.eq(MemberType::Student))
        .filter(
            event_members::role
                .eq_any([MemberRole::StudentOrganiser, MemberRole::CommitteeMember]),
        )
        .order_by((event_members::role.asc(), students::student_id.asc()))
        .select((event_members::role, students::name, students::email))
        .load::<(MemberRole, String, String)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(role, name, email)| CommitteeContact {
            name,
            role: role.to_string(),
            email,
        })
        .collect())
}

pub fn faculty<'a>(
    conn: &mut SqliteConnection,
    ids: impl IntoIterator<Item = &'a String>,
) -> QueryResult<Vec<Employee>> {
    let ids = ids.into_iter().collect::<Vec<_>>();
    employees::table
        .filter(employees::employee_id.eq_any(ids))
        .order_by(employees::employee_id.asc())
        .select(Employee::as_select())
        .load(conn)
}
