//! The event request approval lifecycle.
//!
//! A request starts in `Pending_Admin`. An event administrator either rejects
//! it or approves it, which issues an organizer account. Standalone requests
//! are then `Approved`; requests for a sub-event of a fest go on to the fest's
//! organizer, who may still reject them. Because the account already exists
//! at that point, rejection downgrades it to `Guest` instead of deleting it.

use chrono::{NaiveDate, NaiveDateTime, Utc};
use db::{
    event::Event,
    event_request::{EventRequest, RequestScope, RequestStatus},
    schema::{event_request_transitions, event_requests, events, users},
    user::{Role, User},
};
use diesel::prelude::*;
use email::{
    templates::{ApprovalNotice, RejectionNotice},
    MailContext, MailDescriptor, Recipient,
};
use serde::Deserialize;

use crate::{
    credentials::IssuedCredential,
    deadline::Deadline,
    error::ApiError,
    permissions::{require, Permission},
    util::{gen_uuid, is_valid_email},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AdminApprove,
    AdminReject,
    MainOrganizerApprove,
    MainOrganizerReject,
}

/// What else happens, inside the same transaction, when a transition fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Nothing,
    IssueAccount,
    /// Compensates an earlier `IssueAccount`.
    RevokeIssuedAccount,
}

#[derive(Debug, Clone, Copy)]
pub struct Transition {
    pub from: RequestStatus,
    pub action: Action,
    /// `None` matches either scope.
    pub scope: Option<RequestScope>,
    pub to: RequestStatus,
    pub effect: Effect,
}

pub const TRANSITIONS: &[Transition] = &[
    Transition {
        from: RequestStatus::PendingAdmin,
        action: Action::AdminApprove,
        scope: Some(RequestScope::Standalone),
        to: RequestStatus::Approved,
        effect: Effect::IssueAccount,
    },
    Transition {
        from: RequestStatus::PendingAdmin,
        action: Action::AdminApprove,
        scope: Some(RequestScope::PartOfFest),
        to: RequestStatus::PendingMainOrganizer,
        effect: Effect::IssueAccount,
    },
    Transition {
        from: RequestStatus::PendingAdmin,
        action: Action::AdminReject,
        scope: None,
        to: RequestStatus::Rejected,
        effect: Effect::Nothing,
    },
    Transition {
        from: RequestStatus::PendingMainOrganizer,
        action: Action::MainOrganizerApprove,
        scope: None,
        to: RequestStatus::Approved,
        effect: Effect::Nothing,
    },
    Transition {
        from: RequestStatus::PendingMainOrganizer,
        action: Action::MainOrganizerReject,
        scope: None,
        to: RequestStatus::Rejected,
        effect: Effect::RevokeIssuedAccount,
    },
];

pub fn find_transition(
    from: RequestStatus,
    scope: RequestScope,
    action: Action,
) -> Option<&'static Transition> {
    TRANSITIONS.iter().find(|t| {
        t.from == from
            && t.action == action
            && t.scope.map(|s| s == scope).unwrap_or(true)
    })
}

/// Whether a sequence of statuses is a walk along the transition graph
/// starting at submission.
pub fn is_valid_history(history: &[RequestStatus]) -> bool {
    match history.first() {
        Some(RequestStatus::PendingAdmin) => {}
        _ => return false,
    }
    history
        .windows(2)
        .all(|w| TRANSITIONS.iter().any(|t| t.from == w[0] && t.to == w[1]))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewEventRequest {
    pub requestor_email: String,
    pub event_details: String,
    pub request_type: String,
    pub scope: String,
    pub parent_fest_id: Option<String>,
    pub requested_event_count: Option<i64>,
}

/// The result of a transition, with the mail to send once it has committed.
#[derive(Debug)]
pub struct TransitionOutcome {
    pub request: EventRequest,
    pub mail: Vec<MailDescriptor>,
}

#[derive(Debug)]
pub struct Approval {
    pub outcome: TransitionOutcome,
    pub user_email: String,
    pub one_time_password: String,
}

pub fn load_request(
    conn: &mut SqliteConnection,
    public_id: &str,
) -> Result<EventRequest, ApiError> {
    event_requests::table
        .filter(event_requests::public_id.eq(public_id))
        .select(EventRequest::as_select())
        .first(conn)
        .optional()?
        .ok_or(ApiError::NotFound("event request"))
}

fn record_transition(
    conn: &mut SqliteConnection,
    request_id: i64,
    from: Option<RequestStatus>,
    to: RequestStatus,
    actor: Option<i64>,
    at: NaiveDateTime,
) -> QueryResult<()> {
    diesel::insert_into(event_request_transitions::table)
        .values((
            event_request_transitions::request_id.eq(request_id),
            event_request_transitions::from_status.eq(from),
            event_request_transitions::to_status.eq(to),
            event_request_transitions::actor_id.eq(actor),
            event_request_transitions::created_at.eq(at),
        ))
        .execute(conn)?;
    Ok(())
}

/// Moves `request` along the edge for `action`. The update only applies if
/// the stored status still equals the one that was read, so of two racing
/// transitions only one can win.
fn advance(
    conn: &mut SqliteConnection,
    request: &EventRequest,
    action: Action,
    actor: &User,
) -> Result<&'static Transition, ApiError> {
    let transition = find_transition(request.status, request.scope, action)
        .ok_or_else(|| {
            ApiError::invalid_state(format!(
                "this request is {} and cannot be acted on this way",
                request.status
            ))
        })?;

    let now = Utc::now().naive_utc();
    let n = diesel::update(event_requests::table)
        .filter(event_requests::id.eq(request.id))
        .filter(event_requests::status.eq(request.status))
        .set((
            event_requests::status.eq(transition.to),
            event_requests::updated_at.eq(now),
        ))
        .execute(conn)?;
    if n == 0 {
        return Err(ApiError::invalid_state(
            "this request was modified concurrently",
        ));
    }

    record_transition(
        conn,
        request.id,
        Some(request.status),
        transition.to,
        Some(actor.id),
        now,
    )?;

    tracing::info!(
        "Request {} moved from {} to {}",
        request.public_id,
        request.status,
        transition.to
    );

    Ok(transition)
}

fn reload(
    conn: &mut SqliteConnection,
    request: &EventRequest,
) -> QueryResult<EventRequest> {
    event_requests::table
        .find(request.id)
        .select(EventRequest::as_select())
        .first(conn)
}

fn approval_notice(request: &EventRequest, limit: i64) -> MailDescriptor {
    MailDescriptor::new(
        Recipient::new(&request.requestor_email, &request.requestor_email),
        MailContext::ApprovalNotice(ApprovalNotice {
            event_details: request.event_details.clone(),
            login_email: request.requestor_email.clone(),
            event_creation_limit: limit,
        }),
    )
}

fn rejection_notice(request: &EventRequest) -> MailDescriptor {
    MailDescriptor::new(
        Recipient::new(&request.requestor_email, &request.requestor_email),
        MailContext::RejectionNotice(RejectionNotice {
            event_details: request.event_details.clone(),
        }),
    )
}

/// Records a new request in `Pending_Admin`. Anyone may submit.
#[tracing::instrument(skip(conn, deadline))]
pub fn submit(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    form: &NewEventRequest,
) -> Result<EventRequest, ApiError> {
    let email = form.requestor_email.trim();
    if !is_valid_email(email) {
        return Err(ApiError::validation(
            "requestorEmail must be a valid email address",
        ));
    }
    if form.event_details.trim().is_empty() {
        return Err(ApiError::validation("eventDetails is required"));
    }
    if form.request_type.trim().is_empty() {
        return Err(ApiError::validation("requestType is required"));
    }
    let scope = form
        .scope
        .parse::<RequestScope>()
        .map_err(|e| ApiError::validation(e.to_string()))?;
    let count = form.requested_event_count.unwrap_or(1);
    if count < 1 {
        return Err(ApiError::validation(
            "requestedEventCount must be at least 1",
        ));
    }

    conn.immediate_transaction(|conn| {
        let parent_fest_id = match scope {
            RequestScope::Standalone => None,
            RequestScope::PartOfFest => {
                let pid = form
                    .parent_fest_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|pid| !pid.is_empty())
                    .ok_or_else(|| {
                        ApiError::validation(
                            "parentFestId is required for requests that are part of a fest",
                        )
                    })?;

                let (fest_id, fest_parent, owner_role) = events::table
                    .inner_join(users::table)
                    .filter(Event::with_public_id(pid))
                    .select((events::id, events::parent_id, users::role))
                    .first::<(i64, Option<i64>, Role)>(conn)
                    .optional()?
                    .ok_or(ApiError::NotFound("parent fest"))?;

                if fest_parent.is_some() {
                    return Err(ApiError::validation(
                        "parentFestId must name a top-level event",
                    ));
                }
                if owner_role != Role::Organizer {
                    return Err(ApiError::validation(
                        "the parent fest is not run by an organizer",
                    ));
                }
                Some(fest_id)
            }
        };

        let now = Utc::now().naive_utc();
        let request = diesel::insert_into(event_requests::table)
            .values((
                event_requests::public_id.eq(gen_uuid().to_string()),
                event_requests::requestor_email.eq(email),
                event_requests::event_details.eq(form.event_details.trim()),
                event_requests::request_type.eq(form.request_type.trim()),
                event_requests::scope.eq(scope),
                event_requests::parent_fest_id.eq(parent_fest_id),
                event_requests::requested_event_count.eq(count),
                event_requests::status.eq(RequestStatus::PendingAdmin),
                event_requests::created_at.eq(now),
                event_requests::updated_at.eq(now),
            ))
            .returning(EventRequest::as_returning())
            .get_result(conn)?;

        record_transition(
            conn,
            request.id,
            None,
            RequestStatus::PendingAdmin,
            None,
            now,
        )?;

        deadline.check()?;
        Ok(request)
    })
}

/// Approves a request on behalf of an event administrator, creating the
/// requestor's account. `credential` is generated by the caller so that
/// password hashing happens outside the transaction.
#[tracing::instrument(skip(conn, deadline, credential))]
pub fn admin_approve(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    admin: &User,
    request_id: &str,
    event_creation_limit: i64,
    access_expiry_date: NaiveDate,
    credential: IssuedCredential,
) -> Result<Approval, ApiError> {
    if event_creation_limit < 0 {
        return Err(ApiError::validation(
            "eventCreationLimit must not be negative",
        ));
    }

    conn.immediate_transaction(|conn| {
        require(admin, Permission::ReviewEventRequests, conn)?;

        let request = load_request(conn, request_id)?;
        let transition = advance(conn, &request, Action::AdminApprove, admin)?;
        debug_assert_eq!(transition.effect, Effect::IssueAccount);

        let existing = users::table
            .filter(User::with_email(&request.requestor_email))
            .count()
            .get_result::<i64>(conn)?;
        if existing > 0 {
            return Err(ApiError::conflict(
                "an account already exists for this email address",
            ));
        }

        let role = match request.scope {
            RequestScope::Standalone => Role::Organizer,
            RequestScope::PartOfFest => Role::SubOrganizer,
        };

        diesel::insert_into(users::table)
            .values((
                users::public_id.eq(gen_uuid().to_string()),
                users::email.eq(&request.requestor_email),
                users::password_hash.eq(&credential.hash),
                users::role.eq(role),
                users::event_creation_limit.eq(event_creation_limit),
                users::access_expiry_date.eq(Some(access_expiry_date)),
                users::must_change_password.eq(true),
                users::created_at.eq(Utc::now().naive_utc()),
            ))
            .execute(conn)?;

        let request = reload(conn, &request)?;
        let mail = if request.status == RequestStatus::Approved {
            vec![approval_notice(&request, event_creation_limit)]
        } else {
            vec![]
        };

        deadline.check()?;

        Ok(Approval {
            user_email: request.requestor_email.clone(),
            one_time_password: credential.plaintext.clone(),
            outcome: TransitionOutcome { request, mail },
        })
    })
}

#[tracing::instrument(skip(conn, deadline))]
pub fn admin_reject(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    admin: &User,
    request_id: &str,
) -> Result<TransitionOutcome, ApiError> {
    conn.immediate_transaction(|conn| {
        require(admin, Permission::ReviewEventRequests, conn)?;

        let request = load_request(conn, request_id)?;
        advance(conn, &request, Action::AdminReject, admin)?;
        let request = reload(conn, &request)?;

        deadline.check()?;
        Ok(TransitionOutcome {
            mail: vec![rejection_notice(&request)],
            request,
        })
    })
}

fn require_fest_owner(
    conn: &mut SqliteConnection,
    organizer: &User,
    request: &EventRequest,
) -> Result<(), ApiError> {
    match request.parent_fest_id {
        Some(fest_id) => {
            require(organizer, Permission::ActOnFestRequest(fest_id), conn)
        }
        None => Err(ApiError::forbidden(
            "this request does not belong to a fest you organize",
        )),
    }
}

#[tracing::instrument(skip(conn, deadline))]
pub fn main_organizer_approve(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    organizer: &User,
    request_id: &str,
) -> Result<TransitionOutcome, ApiError> {
    conn.immediate_transaction(|conn| {
        let request = load_request(conn, request_id)?;
        require_fest_owner(conn, organizer, &request)?;

        advance(conn, &request, Action::MainOrganizerApprove, organizer)?;
        let request = reload(conn, &request)?;

        let limit = users::table
            .filter(User::with_email(&request.requestor_email))
            .select(users::event_creation_limit)
            .first::<i64>(conn)
            .optional()?
            .unwrap_or(0);

        deadline.check()?;
        Ok(TransitionOutcome {
            mail: vec![approval_notice(&request, limit)],
            request,
        })
    })
}

/// Rejects a request awaiting the fest organizer and revokes the account
/// that was issued when the administrator approved it.
#[tracing::instrument(skip(conn, deadline))]
pub fn main_organizer_reject(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    organizer: &User,
    request_id: &str,
) -> Result<TransitionOutcome, ApiError> {
    conn.immediate_transaction(|conn| {
        let request = load_request(conn, request_id)?;
        require_fest_owner(conn, organizer, &request)?;

        let transition =
            advance(conn, &request, Action::MainOrganizerReject, organizer)?;

        if transition.effect == Effect::RevokeIssuedAccount {
            let n = diesel::update(users::table)
                .filter(User::with_email(&request.requestor_email))
                .set((
                    users::role.eq(Role::Guest),
                    users::event_creation_limit.eq(0),
                ))
                .execute(conn)?;
            if n == 0 {
                tracing::warn!(
                    "No account found for {} while revoking access for request {}",
                    request.requestor_email,
                    request.public_id
                );
            }
        }

        let request = reload(conn, &request)?;

        deadline.check()?;
        Ok(TransitionOutcome {
            mail: vec![rejection_notice(&request)],
            request,
        })
    })
}

/// The status history of a request, oldest first.
pub fn history(
    conn: &mut SqliteConnection,
    request_id: i64,
) -> QueryResult<Vec<RequestStatus>> {
    event_request_transitions::table
        .filter(event_request_transitions::request_id.eq(request_id))
        .order_by(event_request_transitions::id.asc())
        .select(event_request_transitions::to_status)
        .load(conn)
}

/// A request with the public id of its parent fest, if any.
pub type ListedRequest = (EventRequest, Option<String>);

pub fn list_pending_admin(
    conn: &mut SqliteConnection,
) -> QueryResult<Vec<ListedRequest>> {
    event_requests::table
        .left_join(events::table)
        .filter(event_requests::status.eq(RequestStatus::PendingAdmin))
        .order_by((event_requests::created_at.asc(), event_requests::id.asc()))
        .select((EventRequest::as_select(), events::public_id.nullable()))
        .load(conn)
}

pub fn list_pending_for_organizer(
    conn: &mut SqliteConnection,
    organizer: &User,
) -> QueryResult<Vec<ListedRequest>> {
    event_requests::table
        .inner_join(events::table)
        .filter(
            event_requests::status.eq(RequestStatus::PendingMainOrganizer),
        )
        .filter(events::organizer_id.eq(organizer.id))
        .order_by((event_requests::created_at.asc(), event_requests::id.asc()))
        .select((EventRequest::as_select(), events::public_id.nullable()))
        .load(conn)
}

#[cfg(test)]
mod tests {
    use db::event_request::{RequestScope, RequestStatus};

    use super::{find_transition, is_valid_history, Action, Effect};

    #[test]
    fn admin_approval_branches_on_scope() {
        let standalone = find_transition(
            RequestStatus::PendingAdmin,
            RequestScope::Standalone,
            Action::AdminApprove,
        )
        .unwrap();
        assert_eq!(standalone.to, RequestStatus::Approved);

        let fest = find_transition(
            RequestStatus::PendingAdmin,
            RequestScope::PartOfFest,
            Action::AdminApprove,
        )
        .unwrap();
        assert_eq!(fest.to, RequestStatus::PendingMainOrganizer);
        assert_eq!(fest.effect, Effect::IssueAccount);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for status in [RequestStatus::Approved, RequestStatus::Rejected] {
            for scope in RequestScope::ALL {
                for action in [
                    Action::AdminApprove,
                    Action::AdminReject,
                    Action::MainOrganizerApprove,
                    Action::MainOrganizerReject,
                ] {
                    assert!(find_transition(status, *scope, action).is_none());
                }
            }
        }
    }

    #[test]
    fn no_skipping_the_admin() {
        assert!(find_transition(
            RequestStatus::PendingAdmin,
            RequestScope::PartOfFest,
            Action::MainOrganizerApprove,
        )
        .is_none());
        assert!(!is_valid_history(&[
            RequestStatus::PendingAdmin,
            RequestStatus::PendingMainOrganizer,
            RequestStatus::PendingAdmin,
        ]));
        assert!(is_valid_history(&[
            RequestStatus::PendingAdmin,
            RequestStatus::PendingMainOrganizer,
            RequestStatus::Rejected,
        ]));
    }

    #[test]
    fn only_second_tier_rejection_compensates() {
        let t = find_transition(
            RequestStatus::PendingMainOrganizer,
            RequestScope::PartOfFest,
            Action::MainOrganizerReject,
        )
        .unwrap();
        assert_eq!(t.effect, Effect::RevokeIssuedAccount);
        let t = find_transition(
            RequestStatus::PendingAdmin,
            RequestScope::Standalone,
            Action::AdminReject,
        )
        .unwrap();
        assert_eq!(t.effect, Effect::Nothing);
    }
}
