use db::{
    schema::{event_members, events},
    user::{Role, User},
};
use diesel::prelude::*;
use rocket::http::Status;
use serde_json::json;

use super::common::{
    at, deadline, event_draft, reload_user, seed_campus, seed_event, seed_user,
    EventSeed, TestApp,
};
use crate::{
    error::ApiError,
    events::{
        create,
        manage::{update_event, EventPatch},
    },
    participation::{
        check_in::check_in,
        registration::{register, Registration},
    },
};

#[test]
fn revoked_organizers_lose_control_of_their_events() {
    let mut app = TestApp::new();
    seed_campus(&mut app.conn);
    let admin = seed_user(&mut app.conn, "admin@example.edu", Role::EventAdmin, 0);
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 1);
    let event = seed_event(
        &mut app.conn,
        &organizer.user,
        EventSeed::new("Hackathon", "2025-03-10T10:00", "2025-03-10T12:00"),
    );
    register(
        &mut app.conn,
        &deadline(),
        &event.public_id,
        &Registration {
            student_id: Some("S1".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    let status = app
        .client
        .put(format!("/admin/users/{}/role", organizer.user.public_id))
        .header(admin.bearer())
        .json(&json!({"role": "Guest"}))
        .dispatch()
        .status();
    assert_eq!(status, Status::Ok);
    let demoted = reload_user(&mut app.conn, "org@example.edu");
    assert_eq!(demoted.role, Role::Guest);

    assert!(matches!(
        check_in(&mut app.conn, &deadline(), &demoted, &event.public_id, "S1"),
        Err(ApiError::Forbidden(_))
    ));
    assert!(matches!(
        update_event(
            &mut app.conn,
            &deadline(),
            &demoted,
            &event.public_id,
            &EventPatch {
                venue: Some("Elsewhere".to_string()),
                ..Default::default()
            },
        ),
        Err(ApiError::Forbidden(_))
    ));

    let status = app
        .client
        .delete(format!("/events/{}", event.public_id))
        .header(organizer.bearer())
        .dispatch()
        .status();
    assert_eq!(status, Status::Forbidden);

    // The event itself is untouched and administrators can still run it.
    let venue = events::table
        .find(event.id)
        .select(events::venue)
        .first::<String>(&mut app.conn)
        .unwrap();
    assert_eq!(venue, "Main auditorium");
    let member = check_in(&mut app.conn, &deadline(), &admin.user, &event.public_id, "S1")
        .unwrap();
    assert!(member.checked_in);
    let checked_in = event_members::table
        .filter(event_members::event_id.eq(event.id))
        .filter(event_members::checked_in.eq(true))
        .count()
        .get_result::<i64>(&mut app.conn)
        .unwrap();
    assert_eq!(checked_in, 1);
}

/// A fest from 09:00 to 18:00 with one sub-event from 10:00 to 12:00, both
/// created by the returned organizer.
fn fest_with_sub_event(app: &mut TestApp) -> (User, String, String) {
    let organizer = seed_user(&mut app.conn, "org@example.edu", Role::Organizer, 2);

    let mut fest = event_draft("Techfest");
    fest.start_time = at("2025-03-10T09:00");
    fest.end_time = at("2025-03-10T18:00");
    let fest = create::create_event(&mut app.conn, &deadline(), &organizer.user, &fest)
        .unwrap();

    let mut talk = event_draft("Keynote");
    talk.parent_id = Some(fest.public_id.clone());
    let talk = create::create_event(&mut app.conn, &deadline(), &organizer.user, &talk)
        .unwrap();

    (organizer.user, fest.public_id, talk.public_id)
}

fn moved(start: &str, end: &str) -> EventPatch {
    EventPatch {
        start_time: Some(at(start)),
        end_time: Some(at(end)),
        ..Default::default()
    }
}

#[test]
fn sub_events_cannot_be_moved_outside_their_fest() {
    let mut app = TestApp::new();
    let (organizer, _, talk) = fest_with_sub_event(&mut app);

    assert!(matches!(
        update_event(
            &mut app.conn,
            &deadline(),
            &organizer,
            &talk,
            &moved("2025-03-12T10:00", "2025-03-12T12:00"),
        ),
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        update_event(
            &mut app.conn,
            &deadline(),
            &organizer,
            &talk,
            &EventPatch {
                end_time: Some(at("2025-03-10T19:00")),
                ..Default::default()
            },
        ),
        Err(ApiError::Validation(_))
    ));

    let updated = update_event(
        &mut app.conn,
        &deadline(),
        &organizer,
        &talk,
        &moved("2025-03-10T16:00", "2025-03-10T18:00"),
    )
    .unwrap();
    assert_eq!(updated.start_time, at("2025-03-10T16:00"));
}

#[test]
fn fests_cannot_shrink_past_their_sub_events() {
    let mut app = TestApp::new();
    let (organizer, fest, _) = fest_with_sub_event(&mut app);

    assert!(matches!(
        update_event(
            &mut app.conn,
            &deadline(),
            &organizer,
            &fest,
            &moved("2025-03-10T11:00", "2025-03-10T18:00"),
        ),
        Err(ApiError::Validation(_))
    ));
    assert!(matches!(
        update_event(
            &mut app.conn,
            &deadline(),
            &organizer,
            &fest,
            &EventPatch {
                end_time: Some(at("2025-03-10T11:30")),
                ..Default::default()
            },
        ),
        Err(ApiError::Validation(_))
    ));

    let updated = update_event(
        &mut app.conn,
        &deadline(),
        &organizer,
        &fest,
        &moved("2025-03-10T10:00", "2025-03-10T12:00"),
    )
    .unwrap();
    assert_eq!(updated.end_time, at("2025-03-10T12:00"));
}
