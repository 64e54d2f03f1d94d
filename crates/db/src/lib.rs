#[macro_use]
pub mod text_enum;

pub mod academic;
pub mod club;
pub mod email;
pub mod event;
pub mod event_request;
pub mod leaderboard;
pub mod participation;
pub mod resource;
/// Database schema
pub mod schema;
pub mod session;
pub mod user;

use diesel::connection::{Instrumentation, InstrumentationEvent};
use rocket_sync_db_pools::database;

/// A pooled SQLite connection. Each connection is opened with WAL mode, a busy
/// timeout and foreign key enforcement.
#[database("database")]
pub struct DbConn(diesel::SqliteConnection);

struct QueryTracer;

impl Instrumentation for QueryTracer {
    fn on_connection_event(&mut self, event: InstrumentationEvent<'_>) {
        match event {
            InstrumentationEvent::StartQuery { query, .. } => {
                tracing::trace!("Started running query {query}");
            }
            InstrumentationEvent::FinishQuery { query, error, .. } => {
                if let Some(error) = error {
                    tracing::warn!(
                        "Encountered an error when running query {query} (error: {error})"
                    );
                }
            }
            InstrumentationEvent::BeginTransaction { depth, .. } => {
                tracing::trace!("Opened transaction (depth {depth})");
            }
            _ => (),
        }
    }
}

/// Attaches query tracing to every connection opened after this call.
pub fn install_query_tracer() {
    let result = diesel::connection::set_default_instrumentation(|| {
        Some(Box::new(QueryTracer) as Box<dyn Instrumentation>)
    });
    if let Err(e) = result {
        tracing::warn!("Could not install query tracer: {e}");
    }
}
