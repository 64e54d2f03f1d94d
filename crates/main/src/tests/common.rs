//! Shared set-up for the integration tests: a client backed by a database in
//! a temporary directory, plus helpers that seed rows directly.

use chrono::{Duration, NaiveDateTime, Utc};
use db::{
    academic::{Course, Department, Employee, Student, Subject},
    event::{Event, RegistrationType},
    schema::{events, sessions, users},
    session::hash_token,
    user::{Role, User},
};
use diesel::{connection::SimpleConnection, prelude::*};
use rocket::{
    figment::{
        util::map,
        value::{Map, Value},
    },
    http::Header,
    local::blocking::Client,
};
use serde_json::json;
use tempfile::TempDir;

use crate::{
    academic::{self, AcademicImport, TimetableSlot},
    deadline::Deadline,
    events::create::EventDraft,
    rocket_from_figment,
    util::{gen_uuid, parse_local_datetime, secure_random},
};

pub struct TestApp {
    pub client: Client,
    pub conn: SqliteConnection,
    pub db_path: String,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("campus.db").to_string_lossy().into_owned();

        let db: Map<_, Value> = map![
            "url" => db_path.clone().into(),
            "pool_size" => 4.into(),
            "timeout" => 5.into(),
        ];
        let figment = rocket::Config::figment()
            .merge(("databases", map!["database" => db]))
            .merge(("upload_root", dir.path().join("uploads")))
            .merge(("log_level", "off"));

        let client = Client::tracked(rocket_from_figment(figment)).unwrap();
        let conn = connect(&db_path);
        TestApp {
            client,
            conn,
            db_path,
            _dir: dir,
        }
    }

    /// Another connection to the same database, for use on other threads.
    pub fn connect(&self) -> SqliteConnection {
        connect(&self.db_path)
    }
}

/// Opens a connection with the same pragmas the server's pool applies, so
/// that racing transactions wait on each other exactly as they would there.
pub fn connect(path: &str) -> SqliteConnection {
    let mut conn = SqliteConnection::establish(path).unwrap();
    conn.batch_execute(
        "PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 1000; PRAGMA foreign_keys = ON;",
    )
    .unwrap();
    conn
}

pub fn at(s: &str) -> NaiveDateTime {
    parse_local_datetime(s).unwrap()
}

pub fn deadline() -> Deadline {
    Deadline::unbounded()
}

/// A user together with a live bearer token.
pub struct Account {
    pub user: User,
    pub token: String,
}

impl Account {
    pub fn bearer(&self) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", self.token))
    }
}

pub fn open_session(conn: &mut SqliteConnection, user_id: i64) -> String {
    let token = secure_random(48);
    let now = Utc::now().naive_utc();
    diesel::insert_into(sessions::table)
        .values((
            sessions::token_hash.eq(hash_token(&token)),
            sessions::user_id.eq(user_id),
            sessions::created_at.eq(now),
            sessions::expires_at.eq(now + Duration::hours(1)),
        ))
        .execute(conn)
        .unwrap();
    token
}

/// Inserts an account that can only sign in through its seeded session.
pub fn seed_user(
    conn: &mut SqliteConnection,
    email: &str,
    role: Role,
    event_creation_limit: i64,
) -> Account {
    let user = diesel::insert_into(users::table)
        .values((
            users::public_id.eq(gen_uuid().to_string()),
            users::email.eq(email),
            users::password_hash.eq("unusable"),
            users::role.eq(role),
            users::event_creation_limit.eq(event_creation_limit),
            users::must_change_password.eq(false),
            users::created_at.eq(Utc::now().naive_utc()),
        ))
        .returning(User::as_returning())
        .get_result(conn)
        .unwrap();
    let token = open_session(conn, user.id);
    Account { user, token }
}

pub fn reload_user(conn: &mut SqliteConnection, email: &str) -> User {
    users::table
        .filter(User::with_email(email))
        .select(User::as_select())
        .first(conn)
        .unwrap()
}

pub struct EventSeed {
    pub name: &'static str,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub registration_type: RegistrationType,
    pub is_paid_event: bool,
    pub has_leaderboard: bool,
}

impl EventSeed {
    pub fn new(name: &'static str, start: &str, end: &str) -> Self {
        EventSeed {
            name,
            start: at(start),
            end: at(end),
            registration_type: RegistrationType::Individual,
            is_paid_event: false,
            has_leaderboard: false,
        }
    }

    pub fn paid(mut self) -> Self {
        self.is_paid_event = true;
        self
    }

    pub fn teams(mut self) -> Self {
        self.registration_type = RegistrationType::Team;
        self
    }

    pub fn with_leaderboard(mut self) -> Self {
        self.has_leaderboard = true;
        self
    }
}

/// A free, individual event on Monday 2025-03-10 from 10:00 to 12:00.
pub fn event_draft(name: &str) -> EventDraft {
    EventDraft {
        event_name: name.to_string(),
        event_desc: None,
        start_time: at("2025-03-10T10:00"),
        end_time: at("2025-03-10T12:00"),
        venue: "Seminar hall".to_string(),
        club_id: None,
        parent_id: None,
        registration_type: RegistrationType::Individual,
        is_paid_event: false,
        has_leaderboard: false,
        show_leaderboard_marks: false,
        registration_locked: false,
        registration_schema: json!([]),
        contact_details: json!({"phone": "12345"}),
        banner_url: None,
        payment_qr_codes: Vec::new(),
    }
}

pub fn seed_event(
    conn: &mut SqliteConnection,
    organizer: &User,
    seed: EventSeed,
) -> Event {
    diesel::insert_into(events::table)
        .values((
            events::public_id.eq(gen_uuid().to_string()),
            events::event_name.eq(seed.name),
            events::start_time.eq(seed.start),
            events::end_time.eq(seed.end),
            events::venue.eq("Main auditorium"),
            events::organizer_id.eq(organizer.id),
            events::registration_type.eq(seed.registration_type),
            events::is_paid_event.eq(seed.is_paid_event),
            events::has_leaderboard.eq(seed.has_leaderboard),
            events::created_at.eq(Utc::now().naive_utc()),
        ))
        .returning(Event::as_returning())
        .get_result(conn)
        .unwrap()
}

pub fn student(id: &str, name: &str, roll: &str, year: i64, section: &str) -> Student {
    Student {
        student_id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@students.example.edu", id.to_lowercase()),
        class_roll_no: roll.to_string(),
        year,
        section: section.to_string(),
        course_id: "BTCS".to_string(),
    }
}

fn employee(id: &str, name: &str) -> Employee {
    Employee {
        employee_id: id.to_string(),
        name: name.to_string(),
        email: format!("{}@staff.example.edu", id.to_lowercase()),
        department_id: "CSE".to_string(),
        is_resource_incharge: false,
    }
}

fn subject(id: &str, name: &str, code: &str) -> Subject {
    Subject {
        subject_id: id.to_string(),
        subject_name: name.to_string(),
        subject_code: code.to_string(),
        course_id: "BTCS".to_string(),
        year: 2,
    }
}

pub fn slot(code: &str, employee_id: &str, day: &str, time_slot: &str) -> TimetableSlot {
    TimetableSlot {
        course_id: "BTCS".to_string(),
        year: 2,
        section: "A".to_string(),
        subject_code: code.to_string(),
        employee_id: employee_id.to_string(),
        day: day.to_string(),
        time_slot: time_slot.to_string(),
        room_no: Some("LT-3".to_string()),
    }
}

/// One department and course; cohort (BTCS, 2, A) has "DS" with Emp42 on
/// Monday morning and "OS" with Emp7 on Monday afternoon.
pub fn campus_records() -> AcademicImport {
    AcademicImport {
        departments: vec![Department {
            department_id: "CSE".to_string(),
            department_name: "Computer Science".to_string(),
            head_employee_id: None,
        }],
        courses: vec![Course {
            course_id: "BTCS".to_string(),
            course_name: "B.Tech CSE".to_string(),
            department_id: "CSE".to_string(),
        }],
        subjects: vec![
            subject("SUB-DS", "DS", "CS201"),
            subject("SUB-OS", "OS", "CS202"),
        ],
        employees: vec![employee("Emp42", "Dr. Rao"), employee("Emp7", "Dr. Iyer")],
        students: vec![
            student("S1", "Asha", "21", 2, "A"),
            student("S2", "Bilal", "22", 2, "A"),
            student("S3", "Chitra", "23", 2, "A"),
        ],
        resources: Vec::new(),
        timetable_slots: vec![
            slot("CS201", "Emp42", "Monday", "09:00-11:00"),
            slot("CS202", "Emp7", "Monday", "13:00-15:00"),
        ],
    }
}

pub fn seed_campus(conn: &mut SqliteConnection) {
    let summary = academic::import(conn, &deadline(), &campus_records()).unwrap();
    assert!(summary.skipped_slots.is_empty());
}
