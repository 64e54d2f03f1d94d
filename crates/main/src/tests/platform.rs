use db::{
    resource::Resource,
    schema::{emails, event_requirements, events},
    user::Role,
};
use diesel::prelude::*;
use rocket::http::Status;
use serde_json::{json, Value};

use super::common::{
    campus_records, deadline, reload_user, seed_campus, seed_event, seed_user, EventSeed,
    TestApp,
};
use crate::academic;

#[test]
fn leaderboard_ranks_ties_and_hides_marks_on_request() {
    let mut app = TestApp::new();
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 1);
    let quiz = seed_event(
        &mut app.conn,
        &organizer.user,
        EventSeed::new("Quiz", "2025-03-10T10:00", "2025-03-10T12:00").with_leaderboard(),
    );
    let talk = seed_event(
        &mut app.conn,
        &organizer.user,
        EventSeed::new("Talk", "2025-03-11T10:00", "2025-03-11T12:00"),
    );

    let response = app
        .client
        .put(format!("/organizer/event/{}/leaderboard", quiz.public_id))
        .header(organizer.bearer())
        .json(&json!({
            "scores": [
                {"competitorId": "S1", "competitorType": "Individual", "marks": 90.0},
                {"competitorId": "S2", "competitorType": "Individual", "marks": 75.0},
                {"competitorId": "S3", "competitorType": "Individual", "marks": 75.0},
                {"competitorId": "S4", "competitorType": "Individual", "marks": 40.0},
            ],
            "showMarks": false,
        }))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let board = response.into_json::<Value>().unwrap();
    assert_eq!(board["showMarks"], false);
    let ranks = board["standings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["rank"].as_i64().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(ranks, vec![1, 2, 2, 4]);
    assert!(board["standings"][0].get("marks").is_none());

    let public = app
        .client
        .get(format!("/events/{}/leaderboard", quiz.public_id))
        .dispatch()
        .into_json::<Value>()
        .unwrap();
    assert_eq!(public["standings"][0]["competitorId"], "S1");
    assert_eq!(public["standings"][3]["rank"], 4);

    let response = app
        .client
        .put(format!("/organizer/event/{}/leaderboard", quiz.public_id))
        .header(organizer.bearer())
        .json(&json!({
            "scores": [{"competitorId": "S4", "competitorType": "Individual", "marks": 95.0}],
            "showMarks": true,
        }))
        .dispatch();
    let board = response.into_json::<Value>().unwrap();
    assert_eq!(board["standings"][0]["competitorId"], "S4");
    assert_eq!(board["standings"][0]["marks"], 95.0);
    assert_eq!(board["standings"].as_array().unwrap().len(), 4);

    let response = app
        .client
        .get(format!("/events/{}/leaderboard", talk.public_id))
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn admins_manage_roles_but_not_each_other() {
    let mut app = TestApp::new();
    let admin = seed_user(&mut app.conn, "admin@example.edu", Role::EventAdmin, 0);
    let registrar = seed_user(&mut app.conn, "registrar@example.edu", Role::AcademicAdmin, 0);
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 3);

    let response = app
        .client
        .put(format!("/admin/users/{}/role", organizer.user.public_id))
        .header(admin.bearer())
        .json(&json!({"role": "Guest"}))
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let user = reload_user(&mut app.conn, "org@example.edu");
    assert_eq!((user.role, user.event_creation_limit), (Role::Guest, 0));

    let response = app
        .client
        .put(format!("/admin/users/{}/role", registrar.user.public_id))
        .header(admin.bearer())
        .json(&json!({"role": "Organizer"}))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .put(format!("/admin/users/{}/role", organizer.user.public_id))
        .header(admin.bearer())
        .json(&json!({"role": "EventAdmin"}))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let listed = app
        .client
        .get("/admin/users")
        .header(admin.bearer())
        .dispatch()
        .into_json::<Vec<Value>>()
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["email"], "org@example.edu");
}

#[test]
fn clubs_are_created_listed_and_deleted() {
    let mut app = TestApp::new();
    let admin = seed_user(&mut app.conn, "admin@example.edu", Role::EventAdmin, 0);
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 1);

    let response = app
        .client
        .post("/admin/clubs")
        .header(organizer.bearer())
        .json(&json!({"clubName": "Robotics"}))
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .post("/admin/clubs")
        .header(admin.bearer())
        .json(&json!({"clubId": "robotics", "clubName": "Robotics"}))
        .dispatch();
    assert_eq!(response.status(), Status::Created);

    let response = app
        .client
        .post("/admin/clubs")
        .header(admin.bearer())
        .json(&json!({"clubName": "  "}))
        .dispatch();
    assert_eq!(response.status(), Status::BadRequest);

    let clubs = app.client.get("/clubs").dispatch().into_json::<Vec<Value>>().unwrap();
    assert_eq!(clubs.len(), 1);
    assert_eq!(clubs[0]["clubName"], "Robotics");

    let response = app
        .client
        .delete("/admin/clubs/robotics")
        .header(admin.bearer())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let response = app
        .client
        .delete("/admin/clubs/robotics")
        .header(admin.bearer())
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn requirements_are_mailed_to_each_incharge() {
    let mut app = TestApp::new();
    let mut records = campus_records();
    records.resources = vec![
        Resource {
            resource_id: "R-PROJ".to_string(),
            resource_name: "Projector".to_string(),
            category: Some("AV".to_string()),
            incharge_employee_id: "Emp7".to_string(),
        },
        Resource {
            resource_id: "R-CHAIR".to_string(),
            resource_name: "Chairs".to_string(),
            category: None,
            incharge_employee_id: "Emp7".to_string(),
        },
    ];
    academic::import(&mut app.conn, &deadline(), &records).unwrap();

    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 1);
    let stranger = seed_user(&mut app.conn, "other@example.edu", Role::Organizer, 1);
    let event = seed_event(
        &mut app.conn,
        &organizer.user,
        EventSeed::new("Hackathon", "2025-03-10T10:00", "2025-03-10T12:00"),
    );

    let catalogue = app
        .client
        .get("/organizer/resources")
        .header(organizer.bearer())
        .dispatch()
        .into_json::<Vec<Value>>()
        .unwrap();
    assert_eq!(catalogue.len(), 2);
    assert_eq!(catalogue[0]["resourceName"], "Chairs");

    let items = json!({"items": [
        {"resourceId": "R-PROJ", "quantity": 2},
        {"resourceId": "R-CHAIR", "quantity": 40},
        {"resourceId": "R-CHAIR", "quantity": 0},
    ]});

    let response = app
        .client
        .post(format!("/requirements/{}", event.public_id))
        .header(stranger.bearer())
        .json(&items)
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .post(format!("/requirements/{}", event.public_id))
        .header(organizer.bearer())
        .json(&items)
        .dispatch();
    assert_eq!(response.status(), Status::Created);
    let body = response.into_json::<Value>().unwrap();
    let deliveries = body["deliveries"].as_array().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0]["recipient"], "emp7@staff.example.edu");

    let recorded = event_requirements::table
        .filter(event_requirements::event_id.eq(event.id))
        .count()
        .get_result::<i64>(&mut app.conn)
        .unwrap();
    assert_eq!(recorded, 2);
    let kinds = emails::table
        .select(emails::kind)
        .load::<String>(&mut app.conn)
        .unwrap();
    assert_eq!(kinds, vec!["ResourceRequest".to_string()]);

    let response = app
        .client
        .post(format!("/requirements/{}", event.public_id))
        .header(organizer.bearer())
        .json(&json!({"items": [{"resourceId": "R-NONE", "quantity": 1}]}))
        .dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn academic_admins_import_records_over_http() {
    let mut app = TestApp::new();
    let registrar = seed_user(&mut app.conn, "registrar@example.edu", Role::AcademicAdmin, 0);
    let admin = seed_user(&mut app.conn, "admin@example.edu", Role::EventAdmin, 0);

    let mut records = campus_records_json();
    records["timetableSlots"]
        .as_array_mut()
        .unwrap()
        .push(json!({
            "courseId": "BTCS", "year": 2, "section": "A", "subjectCode": "CS202",
            "employeeId": "Emp7", "day": "Funday", "timeSlot": "13:00-15:00",
        }));

    let response = app
        .client
        .post("/academic/import")
        .header(admin.bearer())
        .json(&records)
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let response = app
        .client
        .post("/academic/import")
        .header(registrar.bearer())
        .json(&records)
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let summary = response.into_json::<Value>().unwrap();
    assert_eq!(summary["students"], 3);
    assert_eq!(summary["timetableEntries"], 1);
    assert_eq!(summary["skippedSlots"][0]["index"], 1);

    let again = app
        .client
        .post("/academic/import")
        .header(registrar.bearer())
        .json(&records)
        .dispatch()
        .into_json::<Value>()
        .unwrap();
    assert_eq!(again["students"], 3);
}

fn campus_records_json() -> Value {
    json!({
        "departments": [{"departmentId": "CSE", "departmentName": "Computer Science"}],
        "courses": [{"courseId": "BTCS", "courseName": "B.Tech CSE", "departmentId": "CSE"}],
        "subjects": [{
            "subjectId": "SUB-DS", "subjectName": "DS", "subjectCode": "CS201",
            "courseId": "BTCS", "year": 2,
        }, {
            "subjectId": "SUB-OS", "subjectName": "OS", "subjectCode": "CS202",
            "courseId": "BTCS", "year": 2,
        }],
        "employees": [
            {"employeeId": "Emp42", "name": "Dr. Rao", "email": "emp42@staff.example.edu", "departmentId": "CSE"},
            {"employeeId": "Emp7", "name": "Dr. Iyer", "email": "emp7@staff.example.edu", "departmentId": "CSE"},
        ],
        "students": [
            {"studentId": "S1", "name": "Asha", "email": "s1@students.example.edu", "classRollNo": "21", "year": 2, "section": "A", "courseId": "BTCS"},
            {"studentId": "S2", "name": "Bilal", "email": "s2@students.example.edu", "classRollNo": "22", "year": 2, "section": "A", "courseId": "BTCS"},
            {"studentId": "S3", "name": "Chitra", "email": "s3@students.example.edu", "classRollNo": "23", "year": 2, "section": "A", "courseId": "BTCS"},
        ],
        "timetableSlots": [{
            "courseId": "BTCS", "year": 2, "section": "A", "subjectCode": "CS201",
            "employeeId": "Emp42", "day": "Monday", "timeSlot": "09:00-11:00",
        }],
    })
}

#[test]
fn admins_may_delete_any_event() {
    let mut app = TestApp::new();
    seed_campus(&mut app.conn);
    let admin = seed_user(&mut app.conn, "admin@example.edu", Role::EventAdmin, 0);
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 1);
    let event = seed_event(
        &mut app.conn,
        &organizer.user,
        EventSeed::new("Hackathon", "2025-03-10T10:00", "2025-03-10T12:00"),
    );

    let response = app
        .client
        .delete(format!("/admin/events/{}", event.public_id))
        .header(organizer.bearer())
        .dispatch();
    assert_eq!(response.status(), Status::Forbidden);

    let all = app
        .client
        .get("/admin/events")
        .header(admin.bearer())
        .dispatch()
        .into_json::<Vec<Value>>()
        .unwrap();
    assert_eq!(all.len(), 1);

    let response = app
        .client
        .delete(format!("/admin/events/{}", event.public_id))
        .header(admin.bearer())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);

    let left = events::table
        .count()
        .get_result::<i64>(&mut app.conn)
        .unwrap();
    assert_eq!(left, 0);
}
