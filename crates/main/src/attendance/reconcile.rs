//! Works out which classes an event's attendees miss, grouped by the faculty
//! member teaching each class.
//!
//! This stage does no I/O. Its output is ordered: faculty by employee id,
//! classes by (weekday, start time, subject), students by student id.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use db::academic::{Cohort, Student};

use super::slot::{overlaps, parse_weekday, TimeSlot};

/// A weekly class from some cohort's timetable, with the names needed to
/// report it.
#[derive(Debug, Clone)]
pub struct ScheduledClass {
    pub entry_id: String,
    pub cohort: Cohort,
    pub course_name: String,
    pub subject_name: String,
    pub employee_id: String,
    pub day: String,
    pub time_slot: String,
}

/// Identifies one missed session. Field order gives the report order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassKey {
    /// Days from Monday.
    pub weekday: u32,
    pub start: NaiveTime,
    pub subject_name: String,
    pub course_name: String,
    pub year: i64,
    pub section: String,
    pub time_slot: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MissedClass {
    pub key: ClassKey,
    pub students: Vec<Student>,
}

/// Missed classes per faculty member, keyed by employee id.
pub type FacultyBundles = BTreeMap<String, Vec<MissedClass>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Nobody was checked in.
    NoAttendees,
    NoConflicts,
    Conflicts(FacultyBundles),
}

/// Matches checked-in students against their cohorts' classes on the day the
/// event starts. A class conflicts when its period overlaps the event's
/// `[start, end)` window. Entries with unreadable time slots are skipped.
pub fn reconcile(
    start: NaiveDateTime,
    end: NaiveDateTime,
    attendees: &[Student],
    classes: &[ScheduledClass],
) -> Reconciliation {
    if attendees.is_empty() {
        return Reconciliation::NoAttendees;
    }

    let mut by_cohort = BTreeMap::<Cohort, Vec<&Student>>::new();
    for student in attendees {
        by_cohort.entry(student.cohort()).or_default().push(student);
    }

    let event_day = start.weekday();
    let event_date = start.date();

    let mut bundles =
        BTreeMap::<String, BTreeMap<ClassKey, BTreeMap<String, Student>>>::new();

    for class in classes {
        if parse_weekday(&class.day) != Some(event_day) {
            continue;
        }
        let Some(students) = by_cohort.get(&class.cohort) else {
            continue;
        };
        let slot = match class.time_slot.parse::<TimeSlot>() {
            Ok(slot) => slot,
            Err(e) => {
                tracing::warn!("Skipping timetable entry {}: {e}", class.entry_id);
                continue;
            }
        };
        let (class_start, class_end) = slot.on(event_date);
        if !overlaps(class_start, class_end, start, end) {
            continue;
        }

        let key = ClassKey {
            weekday: event_day.num_days_from_monday(),
            start: slot.start,
            subject_name: class.subject_name.clone(),
            course_name: class.course_name.clone(),
            year: class.cohort.year,
            section: class.cohort.section.clone(),
            time_slot: slot.to_string(),
        };
        let roster = bundles
            .entry(class.employee_id.clone())
            .or_default()
            .entry(key)
            .or_default();
        for student in students {
            roster.insert(student.student_id.clone(), (*student).clone());
        }
    }

    if bundles.is_empty() {
        return Reconciliation::NoConflicts;
    }

    Reconciliation::Conflicts(
        bundles
            .into_iter()
            .map(|(employee_id, classes)| {
                let missed = classes
                    .into_iter()
                    .map(|(key, roster)| MissedClass {
                        key,
                        students: roster.into_values().collect(),
                    })
                    .collect();
                (employee_id, missed)
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use db::academic::{Cohort, Student};
    use proptest::prelude::*;

    use super::{reconcile, Reconciliation, ScheduledClass};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        // 2025-03-10 is a Monday.
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn student(id: &str, course: &str, year: i64, section: &str) -> Student {
        Student {
            student_id: id.to_string(),
            name: format!("Student {id}"),
            email: format!("{}@example.edu", id.to_lowercase()),
            class_roll_no: id.to_string(),
            year,
            section: section.to_string(),
            course_id: course.to_string(),
        }
    }

    fn class(
        entry: &str,
        employee: &str,
        subject: &str,
        day: &str,
        slot: &str,
    ) -> ScheduledClass {
        ScheduledClass {
            entry_id: entry.to_string(),
            cohort: Cohort {
                course_id: "BTCS".to_string(),
                year: 2,
                section: "A".to_string(),
            },
            course_name: "BTCS".to_string(),
            subject_name: subject.to_string(),
            employee_id: employee.to_string(),
            day: day.to_string(),
            time_slot: slot.to_string(),
        }
    }

    fn conflicts(result: Reconciliation) -> super::FacultyBundles {
        match result {
            Reconciliation::Conflicts(bundles) => bundles,
            other => panic!("expected conflicts, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_class_is_reported_to_its_lecturer_only() {
        let attendees = [student("X", "BTCS", 2, "A")];
        let classes = [
            class("e1", "Emp42", "DS", "Monday", "09:00-11:00"),
            class("e2", "Emp7", "OS", "Monday", "13:00-15:00"),
        ];

        let bundles = conflicts(reconcile(at(10, 0), at(12, 0), &attendees, &classes));

        assert_eq!(bundles.keys().collect::<Vec<_>>(), vec!["Emp42"]);
        let missed = &bundles["Emp42"];
        assert_eq!(missed.len(), 1);
        assert_eq!(missed[0].key.subject_name, "DS");
        assert_eq!(missed[0].key.time_slot, "09:00-11:00");
        assert_eq!(missed[0].students, vec![attendees[0].clone()]);
    }

    #[test]
    fn malformed_slots_are_skipped() {
        let attendees = [student("X", "BTCS", 2, "A")];
        let classes = [
            class("e0", "Emp9", "Maths", "Monday", "bad"),
            class("e1", "Emp42", "DS", "Monday", "09:00-11:00"),
        ];

        let bundles = conflicts(reconcile(at(10, 0), at(12, 0), &attendees, &classes));
        assert_eq!(bundles.keys().collect::<Vec<_>>(), vec!["Emp42"]);
    }

    #[test]
    fn nothing_to_report_without_attendees() {
        let classes = [class("e1", "Emp42", "DS", "Monday", "09:00-11:00")];
        assert_eq!(
            reconcile(at(10, 0), at(12, 0), &[], &classes),
            Reconciliation::NoAttendees
        );
    }

    #[test]
    fn touching_other_day_and_other_cohort_classes_do_not_conflict() {
        let attendees = [student("X", "BTCS", 2, "A")];
        let mut other_cohort = class("e3", "Emp5", "DB", "Monday", "10:00-11:00");
        other_cohort.cohort.section = "B".to_string();
        let classes = [
            class("e1", "Emp42", "DS", "Monday", "08:00-10:00"),
            class("e2", "Emp7", "OS", "Tuesday", "10:00-12:00"),
            other_cohort,
        ];

        assert_eq!(
            reconcile(at(10, 0), at(12, 0), &attendees, &classes),
            Reconciliation::NoConflicts
        );
    }

    #[test]
    fn rosters_and_sessions_are_ordered() {
        let attendees = [
            student("S3", "BTCS", 2, "A"),
            student("S1", "BTCS", 2, "A"),
            student("S2", "BTCS", 2, "A"),
        ];
        let classes = [
            class("e2", "Emp42", "Networks", "Monday", "11:00-12:00"),
            class("e1", "Emp42", "Algebra", "Monday", "11:00-12:00"),
            class("e0", "Emp42", "DS", "Monday", "09:00-11:00"),
        ];

        let bundles = conflicts(reconcile(at(10, 0), at(12, 0), &attendees, &classes));
        let missed = &bundles["Emp42"];
        let subjects = missed
            .iter()
            .map(|m| m.key.subject_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(subjects, vec!["DS", "Algebra", "Networks"]);

        let ids = missed[0]
            .students
            .iter()
            .map(|s| s.student_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
    }

    fn inputs() -> (Vec<Student>, Vec<ScheduledClass>) {
        let attendees = (1..=6)
            .map(|i| {
                let section = if i % 2 == 0 { "A" } else { "B" };
                student(&format!("S{i}"), "BTCS", 2, section)
            })
            .collect();
        let mut classes = Vec::new();
        for (i, (slot, employee)) in [
            ("09:00-10:30", "Emp1"),
            ("10:00-11:00", "Emp2"),
            ("11:30-12:30", "Emp1"),
            ("bad", "Emp3"),
            ("07:00-08:00", "Emp2"),
        ]
        .into_iter()
        .enumerate()
        {
            for section in ["A", "B"] {
                let mut c = class(
                    &format!("e{i}{section}"),
                    employee,
                    &format!("Subject{i}"),
                    "Monday",
                    slot,
                );
                c.cohort.section = section.to_string();
                classes.push(c);
            }
        }
        (attendees, classes)
    }

    proptest! {
        #[test]
        fn input_order_does_not_change_the_result(
            attendees in Just(inputs().0).prop_shuffle(),
            classes in Just(inputs().1).prop_shuffle(),
        ) {
            let (sorted_attendees, sorted_classes) = inputs();
            let expected = reconcile(at(10, 0), at(12, 0), &sorted_attendees, &sorted_classes);
            let actual = reconcile(at(10, 0), at(12, 0), &attendees, &classes);
            prop_assert_eq!(actual, expected);
        }
    }
}
