use config::AppConfig;
use db::DbConn;
use diesel_migrations::{
    embed_migrations, EmbeddedMigrations, MigrationHarness,
};
use email::Mailer;
use rocket::{
    fairing::AdHoc,
    figment::{
        util::map,
        value::{Map, Value},
        Figment,
    },
    fs::{FileServer, Options},
    Build, Rocket,
};
use trace_request::RequestIdFairing;

pub mod academic;
pub mod admin;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod deadline;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod participation;
pub mod permissions;
pub mod requests;
pub mod requirements;
#[cfg(test)]
mod tests;
pub mod util;

#[macro_use]
extern crate rocket;

pub const MIGRATIONS: EmbeddedMigrations =
    embed_migrations!("../../migrations");

/// Builds the application against the database at `DATABASE_URL`, falling
/// back to `default_db`.
pub fn make_rocket(default_db: &str) -> Rocket<Build> {
    let db: Map<_, Value> = map![
        "url" => std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| default_db.to_string())
            .into(),
        "pool_size" => 10.into(),
        "timeout" => 5.into(),
    ];

    let figment =
        rocket::Config::figment().merge(("databases", map!["database" => db]));
    rocket_from_figment(figment)
}

pub fn rocket_from_figment(figment: Figment) -> Rocket<Build> {
    let config = figment.extract::<AppConfig>().unwrap_or_else(|e| {
        tracing::warn!("Invalid application settings, using defaults: {e}");
        AppConfig::default()
    });

    let mailer = Mailer::from_env()
        .or_else(|e| {
            tracing::error!("Mail settings are invalid ({e}), only recording mail");
            Mailer::record_only()
        })
        .ok();

    let rocket = rocket::custom(figment)
        .attach(DbConn::fairing())
        .attach(AdHoc::try_on_ignite("migrations", |rocket| async move {
            let Some(db_conn) = DbConn::get_one(&rocket).await else {
                tracing::error!("No database connection available for migrations");
                return Err(rocket);
            };

            let ret: Result<(), Box<dyn std::error::Error + Send + Sync>> =
                db_conn
                    .run(move |conn| {
                        conn.run_pending_migrations(MIGRATIONS)?;
                        Ok(())
                    })
                    .await;

            match ret {
                Ok(_) => Ok(rocket),
                Err(e) => {
                    tracing::error!("Failed to run migrations: {e}");
                    Err(rocket)
                }
            }
        }))
        .mount(
            events::uploads::PUBLIC_PREFIX.trim_end_matches('/'),
            FileServer::new(&config.upload_root, Options::Missing),
        )
        .mount(
            "/",
            routes![
                auth::login::login,
                auth::logout::logout,
                auth::change_password::change_password,
                admin::setup::do_setup,
                admin::list_users,
                admin::change_role,
                admin::list_all_events,
                admin::delete_any_event,
                admin::list_clubs,
                admin::create_club,
                admin::delete_club,
                requests::routes::submit_request,
                requests::routes::admin_pending_requests,
                requests::routes::admin_approve_request,
                requests::routes::admin_reject_request,
                requests::routes::organizer_pending_requests,
                requests::routes::organizer_approve_request,
                requests::routes::organizer_reject_request,
                events::routes::create_event,
                events::routes::update_event,
                events::routes::delete_event,
                events::routes::list_events,
                events::routes::get_event,
                events::routes::my_events,
                participation::routes::check_in_student,
                participation::routes::register,
                participation::routes::pending_verifications,
                participation::routes::verify_payment,
                participation::routes::reject_payment,
                participation::routes::list_team,
                participation::routes::add_team_member,
                participation::routes::remove_team_member,
                attendance::routes::send_attendance,
                requirements::submit_requirements,
                requirements::list_resources,
                leaderboard::update_leaderboard,
                leaderboard::get_leaderboard,
                academic::import_records,
            ],
        )
        .register(
            "/",
            catchers![
                error::bad_request,
                error::unauthorized,
                error::forbidden,
                error::not_found,
                error::conflict,
                error::unprocessable,
                error::internal,
            ],
        )
        .manage(config)
        .attach(RequestIdFairing);

    match mailer {
        Some(mailer) => rocket.manage(mailer),
        None => {
            tracing::error!("Could not construct a mailer, mail routes will fail");
            rocket
        }
    }
}
