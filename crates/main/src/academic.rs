//! Bulk import of academic records: departments, staff, courses, students and
//! the weekly timetable.

use db::{
    academic::{Course, Department, Employee, Student, Subject},
    resource::Resource,
    schema::{
        courses, departments, employees, resources, students, subjects,
        time_table_entries, time_tables,
    },
    user::ActiveUser,
    DbConn,
};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    attendance::slot::{parse_weekday, weekday_name, TimeSlot},
    deadline::Deadline,
    error::{ApiError, ApiResult},
    permissions::{require, Permission},
    util::gen_uuid,
};

/// One class in a cohort's weekly timetable.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSlot {
    pub course_id: String,
    pub year: i64,
    pub section: String,
    pub subject_code: String,
    pub employee_id: String,
    pub day: String,
    pub time_slot: String,
    pub room_no: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AcademicImport {
    pub departments: Vec<Department>,
    pub courses: Vec<Course>,
    pub subjects: Vec<Subject>,
    pub employees: Vec<Employee>,
    pub students: Vec<Student>,
    pub resources: Vec<Resource>,
    pub timetable_slots: Vec<TimetableSlot>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkippedSlot {
    /// Position in `timetableSlots`.
    pub index: usize,
    pub reason: String,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub departments: usize,
    pub courses: usize,
    pub subjects: usize,
    pub employees: usize,
    pub students: usize,
    pub resources: usize,
    pub timetable_entries: usize,
    pub skipped_slots: Vec<SkippedSlot>,
}

/// Inserts a batch, replacing rows whose natural key already exists.
macro_rules! upsert_all {
    ($conn:expr, $table:ident, $key:ident, $rows:expr) => {{
        let mut n = 0;
        for row in $rows {
            n += diesel::insert_into($table::table)
                .values(row)
                .on_conflict($table::$key)
                .do_update()
                .set(row)
                .execute($conn)?;
        }
        n
    }};
}

/// Finds the timetable for a cohort, creating it on first use.
fn timetable_for(
    conn: &mut SqliteConnection,
    course_id: &str,
    year: i64,
    section: &str,
) -> QueryResult<String> {
    let existing = time_tables::table
        .filter(time_tables::course_id.eq(course_id))
        .filter(time_tables::year.eq(year))
        .filter(time_tables::section.eq(section))
        .select(time_tables::time_table_id)
        .first::<String>(conn)
        .optional()?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id = gen_uuid().to_string();
    diesel::insert_into(time_tables::table)
        .values((
            time_tables::time_table_id.eq(&id),
            time_tables::course_id.eq(course_id),
            time_tables::year.eq(year),
            time_tables::section.eq(section),
        ))
        .execute(conn)?;
    Ok(id)
}

/// Adds one timetable slot. `Ok(None)` means it was stored (or already
/// present); `Ok(Some(reason))` means it was skipped.
fn import_slot(
    conn: &mut SqliteConnection,
    slot: &TimetableSlot,
) -> QueryResult<Option<String>> {
    let Some(day) = parse_weekday(&slot.day) else {
        return Ok(Some(format!("`{}` is not a weekday", slot.day)));
    };
    let period = match slot.time_slot.parse::<TimeSlot>() {
        Ok(period) => period,
        Err(e) => return Ok(Some(e.to_string())),
    };
    let subject_id = subjects::table
        .filter(subjects::subject_code.eq(&slot.subject_code))
        .select(subjects::subject_id)
        .first::<String>(conn)
        .optional()?;
    let Some(subject_id) = subject_id else {
        return Ok(Some(format!("unknown subject code {}", slot.subject_code)));
    };
    let known_employee = employees::table
        .find(&slot.employee_id)
        .count()
        .get_result::<i64>(conn)?;
    if known_employee == 0 {
        return Ok(Some(format!("unknown employee {}", slot.employee_id)));
    }
    let course = courses::table
        .find(&slot.course_id)
        .count()
        .get_result::<i64>(conn)?;
    if course == 0 {
        return Ok(Some(format!("unknown course {}", slot.course_id)));
    }

    let table_id =
        timetable_for(conn, &slot.course_id, slot.year, slot.section.trim())?;
    let day = weekday_name(day);
    let period = period.to_string();

    let duplicate = time_table_entries::table
        .filter(time_table_entries::time_table_id.eq(&table_id))
        .filter(time_table_entries::subject_id.eq(&subject_id))
        .filter(time_table_entries::day.eq(day))
        .filter(time_table_entries::time_slot.eq(&period))
        .count()
        .get_result::<i64>(conn)?;
    if duplicate == 0 {
        diesel::insert_into(time_table_entries::table)
            .values((
                time_table_entries::entry_id.eq(gen_uuid().to_string()),
                time_table_entries::time_table_id.eq(&table_id),
                time_table_entries::subject_id.eq(&subject_id),
                time_table_entries::employee_id.eq(&slot.employee_id),
                time_table_entries::day.eq(day),
                time_table_entries::time_slot.eq(&period),
                time_table_entries::room_no.eq(&slot.room_no),
            ))
            .execute(conn)?;
    }
    Ok(None)
}

/// Imports everything in one transaction. Records are matched on their
/// natural keys, so running the same import twice changes nothing.
#[tracing::instrument(skip_all)]
pub fn import(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    records: &AcademicImport,
) -> Result<ImportSummary, ApiError> {
    conn.immediate_transaction(|conn| {
        let mut summary = ImportSummary {
            departments: upsert_all!(conn, departments, department_id, &records.departments),
            employees: upsert_all!(conn, employees, employee_id, &records.employees),
            courses: upsert_all!(conn, courses, course_id, &records.courses),
            subjects: upsert_all!(conn, subjects, subject_id, &records.subjects),
            students: upsert_all!(conn, students, student_id, &records.students),
            resources: upsert_all!(conn, resources, resource_id, &records.resources),
            ..Default::default()
        };

        for (index, slot) in records.timetable_slots.iter().enumerate() {
            match import_slot(conn, slot)? {
                None => summary.timetable_entries += 1,
                Some(reason) => {
                    tracing::warn!("Skipping timetable slot {index}: {reason}");
                    summary.skipped_slots.push(SkippedSlot { index, reason });
                }
            }
        }

        deadline.check()?;
        tracing::info!("Imported academic records: {summary:?}");
        Ok(summary)
    })
}

#[post("/academic/import", data = "<body>")]
pub async fn import_records(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    body: Json<AcademicImport>,
) -> ApiResult<ImportSummary> {
    let span = span.0;
    let summary = db
        .run(move |conn| {
            let _guard = span.enter();
            require(&user.0, Permission::ImportAcademicRecords, conn)?;
            import(conn, &deadline, &body)
        })
        .await?;
    Ok(Json(summary))
}
