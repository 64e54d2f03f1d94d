use std::cmp::Ordering;

use db::{
    leaderboard::{CompetitorType, LeaderboardEntry},
    schema::{events, leaderboard_entries},
    user::{ActiveUser, User},
    DbConn,
};
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    deadline::Deadline,
    error::{ApiError, ApiResult},
    events::manage::find_event,
    permissions::{require, Permission},
    util::gen_uuid,
};

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub competitor_id: String,
    pub competitor_type: CompetitorType,
    pub marks: f64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreSheet {
    pub scores: Vec<Score>,
    pub show_marks: Option<bool>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub competitor_id: String,
    pub competitor_type: CompetitorType,
    pub rank: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marks: Option<f64>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Leaderboard {
    pub event_id: String,
    pub show_marks: bool,
    pub standings: Vec<Standing>,
}

fn by_marks(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    b.marks
        .total_cmp(&a.marks)
        .then_with(|| a.competitor_id.cmp(&b.competitor_id))
        .then_with(|| a.competitor_type.cmp(&b.competitor_type))
}

/// Orders entries by marks, highest first, and gives tied entries the same
/// rank with a gap after them (1, 2, 2, 4).
pub fn competition_ranks(mut entries: Vec<LeaderboardEntry>) -> Vec<LeaderboardEntry> {
    entries.sort_by(by_marks);
    let mut previous: Option<f64> = None;
    let mut rank = 0;
    for (position, entry) in entries.iter_mut().enumerate() {
        if previous != Some(entry.marks) {
            rank = position as i64 + 1;
            previous = Some(entry.marks);
        }
        entry.rank = Some(rank);
    }
    entries
}

/// Records the given scores, replacing earlier marks for the same
/// competitor, then ranks the whole board again.
#[tracing::instrument(skip(conn, deadline, caller, sheet))]
pub fn update_scores(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    event_public_id: &str,
    sheet: &ScoreSheet,
) -> Result<Vec<LeaderboardEntry>, ApiError> {
    for score in &sheet.scores {
        if score.competitor_id.trim().is_empty() {
            return Err(ApiError::validation("competitorId is required"));
        }
        if !score.marks.is_finite() {
            return Err(ApiError::validation("marks must be a number"));
        }
    }

    conn.immediate_transaction(|conn| {
        let event = find_event(conn, event_public_id)?;
        require(caller, Permission::ManageEvent(event.id), conn)?;
        if !event.has_leaderboard {
            return Err(ApiError::invalid_state(
                "this event does not keep a leaderboard",
            ));
        }

        if let Some(show) = sheet.show_marks {
            diesel::update(events::table.find(event.id))
                .set(events::show_leaderboard_marks.eq(show))
                .execute(conn)?;
        }

        for score in &sheet.scores {
            diesel::insert_into(leaderboard_entries::table)
                .values((
                    leaderboard_entries::public_id.eq(gen_uuid().to_string()),
                    leaderboard_entries::event_id.eq(event.id),
                    leaderboard_entries::competitor_id.eq(score.competitor_id.trim()),
                    leaderboard_entries::competitor_type.eq(score.competitor_type),
                    leaderboard_entries::marks.eq(score.marks),
                ))
                .on_conflict((
                    leaderboard_entries::event_id,
                    leaderboard_entries::competitor_id,
                    leaderboard_entries::competitor_type,
                ))
                .do_update()
                .set(leaderboard_entries::marks.eq(score.marks))
                .execute(conn)?;
        }

        let entries = leaderboard_entries::table
            .filter(leaderboard_entries::event_id.eq(event.id))
            .select(LeaderboardEntry::as_select())
            .load(conn)?;
        let ranked = competition_ranks(entries);
        for entry in &ranked {
            diesel::update(leaderboard_entries::table.find(entry.id))
                .set(leaderboard_entries::rank.eq(entry.rank))
                .execute(conn)?;
        }

        deadline.check()?;
        Ok(ranked)
    })
}

pub fn standings(
    conn: &mut SqliteConnection,
    event_public_id: &str,
) -> Result<Leaderboard, ApiError> {
    let event = find_event(conn, event_public_id)?;
    if !event.has_leaderboard {
        return Err(ApiError::NotFound("leaderboard"));
    }
    let entries = leaderboard_entries::table
        .filter(leaderboard_entries::event_id.eq(event.id))
        .select(LeaderboardEntry::as_select())
        .load(conn)?;

    let show_marks = event.show_leaderboard_marks;
    Ok(Leaderboard {
        event_id: event.public_id,
        show_marks,
        standings: competition_ranks(entries)
            .into_iter()
            .map(|entry| Standing {
                competitor_id: entry.competitor_id,
                competitor_type: entry.competitor_type,
                rank: entry.rank,
                marks: show_marks.then_some(entry.marks),
            })
            .collect(),
    })
}

#[put("/organizer/event/<id>/leaderboard", data = "<body>")]
pub async fn update_leaderboard(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    id: &str,
    body: Json<ScoreSheet>,
) -> ApiResult<Leaderboard> {
    let id = id.to_string();
    let span = span.0;
    let board = db
        .run(move |conn| {
            let _guard = span.enter();
            update_scores(conn, &deadline, &user.0, &id, &body)?;
            standings(conn, &id)
        })
        .await?;
    Ok(Json(board))
}

#[get("/events/<id>/leaderboard")]
pub async fn get_leaderboard(db: DbConn, id: &str) -> ApiResult<Leaderboard> {
    let id = id.to_string();
    Ok(Json(db.run(move |conn| standings(conn, &id)).await?))
}
