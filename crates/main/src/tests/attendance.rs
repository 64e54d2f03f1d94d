use db::{
    email::EmailRow,
    participation::{MemberRole, MemberType},
    schema::{emails, time_table_entries, time_tables},
    user::Role,
};
use diesel::prelude::*;
use email::MailDescriptor;
use rocket::http::Status;
use serde_json::Value;

use super::common::{
    deadline, seed_campus, seed_event, seed_user, Account, EventSeed, TestApp,
};
use crate::{
    attendance::dispatch::{self, ReportPlan},
    participation::{
        check_in::check_in,
        registration::{register, Registration},
        team::{add_committee_member, NewCommitteeMember},
    },
};

/// Seeds the campus, an organizer and a Monday 10:00-12:00 event at which
/// every student in `present` has been checked in.
fn monday_event(app: &mut TestApp, present: &[&str]) -> (Account, String) {
    seed_campus(&mut app.conn);
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 1);
    let event = seed_event(
        &mut app.conn,
        &organizer.user,
        EventSeed::new("Hackathon", "2025-03-10T10:00", "2025-03-10T12:00"),
    );

    for student in present {
        register(
            &mut app.conn,
            &deadline(),
            &event.public_id,
            &Registration {
                student_id: Some(student.to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        check_in(
            &mut app.conn,
            &deadline(),
            &organizer.user,
            &event.public_id,
            student,
        )
        .unwrap();
    }
    (organizer, event.public_id)
}

fn send(app: &TestApp, organizer: &Account, event_id: &str) -> Value {
    let response = app
        .client
        .post(format!("/attendance/{event_id}/send-attendance"))
        .header(organizer.bearer())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    response.into_json::<Value>().unwrap()
}

fn recorded_mail(app: &mut TestApp) -> Vec<EmailRow> {
    emails::table
        .filter(emails::kind.eq("AttendanceReport"))
        .order_by(emails::id.asc())
        .select(EmailRow::as_select())
        .load(&mut app.conn)
        .unwrap()
}

#[test]
fn overlapping_class_is_reported_to_its_lecturer_only() {
    let mut app = TestApp::new();
    let (organizer, event_id) = monday_event(&mut app, &["S1"]);

    let run = send(&app, &organizer, &event_id);
    assert_eq!(run["status"], "sent");
    let deliveries = run["deliveries"].as_array().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0]["recipient"], "emp42@staff.example.edu");

    let mail = recorded_mail(&mut app);
    assert_eq!(mail.len(), 1);
    let row = &mail[0];
    assert!(row.recipients.contains("emp42@staff.example.edu"));
    assert_eq!(row.subject, "Attendance notice: Hackathon");
    let contents = row.contents.as_deref().unwrap();
    assert!(contents.contains("B.Tech CSE / Year 2 / Section A / DS (09:00-11:00)"));
    assert!(contents.contains("S1 Asha (21)"));
}

#[test]
fn malformed_slots_are_skipped() {
    let mut app = TestApp::new();
    let (organizer, event_id) = monday_event(&mut app, &["S1"]);

    let time_table_id = time_tables::table
        .filter(time_tables::course_id.eq("BTCS"))
        .filter(time_tables::year.eq(2))
        .filter(time_tables::section.eq("A"))
        .select(time_tables::time_table_id)
        .first::<String>(&mut app.conn)
        .unwrap();
    diesel::insert_into(time_table_entries::table)
        .values((
            time_table_entries::entry_id.eq("broken"),
            time_table_entries::time_table_id.eq(&time_table_id),
            time_table_entries::subject_id.eq("SUB-OS"),
            time_table_entries::employee_id.eq("Emp7"),
            time_table_entries::day.eq("Monday"),
            time_table_entries::time_slot.eq("bad"),
        ))
        .execute(&mut app.conn)
        .unwrap();

    let run = send(&app, &organizer, &event_id);
    assert_eq!(run["status"], "sent");
    let recipients = run["deliveries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["recipient"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(recipients, vec!["emp42@staff.example.edu".to_string()]);
}

#[test]
fn nobody_checked_in_means_no_report() {
    let mut app = TestApp::new();
    let (organizer, event_id) = monday_event(&mut app, &[]);

    let run = send(&app, &organizer, &event_id);
    assert_eq!(run["status"], "noReport");
    assert!(run["deliveries"].as_array().unwrap().is_empty());
    assert!(recorded_mail(&mut app).is_empty());
}

#[test]
fn events_outside_class_hours_have_no_conflicts() {
    let mut app = TestApp::new();
    seed_campus(&mut app.conn);
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 1);
    let event = seed_event(
        &mut app.conn,
        &organizer.user,
        EventSeed::new("Lunch talk", "2025-03-10T11:00", "2025-03-10T13:00"),
    );
    register(
        &mut app.conn,
        &deadline(),
        &event.public_id,
        &Registration {
            student_id: Some("S2".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    check_in(&mut app.conn, &deadline(), &organizer.user, &event.public_id, "S2").unwrap();

    let run = send(&app, &organizer, &event.public_id);
    assert_eq!(run["status"], "noConflicts");
}

#[test]
fn only_the_owner_or_an_admin_may_send_reports() {
    let mut app = TestApp::new();
    let (_, event_id) = monday_event(&mut app, &["S1"]);
    let stranger = seed_user(&mut app.conn, "other@example.edu", Role::Organizer, 1);
    let admin = seed_user(&mut app.conn, "admin@example.edu", Role::EventAdmin, 0);

    let response = app
        .client
        .post(format!("/attendance/{event_id}/send-attendance"))
        .header(stranger.bearer())
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let run = send(&app, &admin, &event_id);
    assert_eq!(run["status"], "sent");
}

#[test]
fn reports_are_identical_across_runs() {
    let mut app = TestApp::new();
    let (organizer, event_id) = monday_event(&mut app, &["S2", "S1"]);
    add_committee_member(
        &mut app.conn,
        &deadline(),
        &organizer.user,
        &event_id,
        &NewCommitteeMember {
            member_id: "S3".to_string(),
            member_type: MemberType::Student,
            role: MemberRole::StudentOrganiser,
        },
    )
    .unwrap();

    let plan = |app: &mut TestApp| -> Vec<MailDescriptor> {
        match dispatch::prepare(&mut app.conn, &deadline(), &organizer.user, &event_id)
            .unwrap()
        {
            ReportPlan::Reports(mail) => mail,
            other => panic!("expected reports, got {other:?}"),
        }
    };
    let first = plan(&mut app);
    let second = plan(&mut app);

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );

    let text = first[0].render().text;
    let asha = text.find("S1 Asha").unwrap();
    let bilal = text.find("S2 Bilal").unwrap();
    assert!(asha < bilal);
    assert!(text.contains("Chitra (Student Organiser"));
}
