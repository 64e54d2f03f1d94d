use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{
    courses, departments, employees, students, subjects, time_table_entries,
    time_tables,
};

#[derive(
    Debug, Queryable, Selectable, Insertable, AsChangeset, Serialize, Deserialize, Clone,
)]
#[diesel(table_name = departments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub department_id: String,
    pub department_name: String,
    pub head_employee_id: Option<String>,
}

#[derive(
    Debug, Queryable, Selectable, Insertable, AsChangeset, Serialize, Deserialize, Clone,
)]
#[diesel(table_name = courses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub department_id: String,
}

#[derive(
    Debug, Queryable, Selectable, Insertable, AsChangeset, Serialize, Deserialize, Clone,
)]
#[diesel(table_name = subjects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub subject_id: String,
    pub subject_name: String,
    pub subject_code: String,
    pub course_id: String,
    pub year: i64,
}

#[derive(
    Debug, Queryable, Selectable, Insertable, AsChangeset, Serialize, Deserialize, Clone,
)]
#[diesel(table_name = employees)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: String,
    pub name: String,
    pub email: String,
    pub department_id: String,
    #[serde(default)]
    pub is_resource_incharge: bool,
}

#[derive(
    Debug,
    Queryable,
    Selectable,
    Insertable,
    AsChangeset,
    Serialize,
    Deserialize,
    Clone,
    PartialEq,
    Eq,
)]
#[diesel(table_name = students)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub class_roll_no: String,
    pub year: i64,
    pub section: String,
    pub course_id: String,
}

/// A class group: students who share a course, year of study and section.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    pub course_id: String,
    pub year: i64,
    pub section: String,
}

impl Student {
    pub fn cohort(&self) -> Cohort {
        Cohort {
            course_id: self.course_id.clone(),
            year: self.year,
            section: self.section.clone(),
        }
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = time_tables)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TimeTable {
    pub time_table_id: String,
    pub course_id: String,
    pub year: i64,
    pub section: String,
}

impl TimeTable {
    pub fn cohort(&self) -> Cohort {
        Cohort {
            course_id: self.course_id.clone(),
            year: self.year,
            section: self.section.clone(),
        }
    }
}

/// A weekly recurring class. `time_slot` has the form `HH:MM-HH:MM`.
#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = time_table_entries)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TimeTableEntry {
    pub entry_id: String,
    pub time_table_id: String,
    pub subject_id: String,
    pub employee_id: String,
    pub day: String,
    pub time_slot: String,
    pub room_no: Option<String>,
}
