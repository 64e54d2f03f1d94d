//! Resource requests: an organizer asks the in-charges of campus resources
//! (rooms, projectors, chairs) to set aside what their event needs.

use std::collections::BTreeMap;

use chrono::Utc;
use db::{
    academic::Employee,
    resource::{RequirementStatus, Resource},
    schema::{employees, event_requirements, resources},
    user::{ActiveUser, User},
    DbConn,
};
use diesel::prelude::*;
use email::{
    templates::{EventHeader, RequestedItem, ResourceRequest},
    Delivery, MailContext, MailDescriptor, Mailer, Recipient,
};
use rocket::{response::status::Created, serde::json::Json, State};
use serde::{Deserialize, Serialize};
use trace_request::TracingSpan;

use crate::{
    deadline::Deadline,
    error::{ApiError, ApiResult},
    events::manage::find_event,
    permissions::{require, Permission},
};

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RequirementItem {
    pub resource_id: String,
    pub quantity: i64,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RequirementList {
    pub items: Vec<RequirementItem>,
}

/// Drops blank and non-positive items.
fn usable_items(items: &[RequirementItem]) -> Vec<RequirementItem> {
    items
        .iter()
        .filter(|item| !item.resource_id.trim().is_empty() && item.quantity > 0)
        .map(|item| RequirementItem {
            resource_id: item.resource_id.trim().to_string(),
            quantity: item.quantity,
        })
        .collect()
}

/// Records what an event needs and prepares one message per in-charge,
/// listing only the items they look after.
#[tracing::instrument(skip(conn, deadline, caller, items))]
pub fn add_requirements(
    conn: &mut SqliteConnection,
    deadline: &Deadline,
    caller: &User,
    event_public_id: &str,
    items: &[RequirementItem],
) -> Result<Vec<MailDescriptor>, ApiError> {
    let items = usable_items(items);
    if items.is_empty() {
        return Err(ApiError::validation(
            "no resources were selected, or every quantity was zero",
        ));
    }

    conn.immediate_transaction(|conn| {
        let event = find_event(conn, event_public_id)?;
        require(caller, Permission::EditEvent(event.id), conn)?;

        let mut by_incharge = BTreeMap::<String, (Employee, Vec<RequestedItem>)>::new();
        for item in &items {
            let (resource, incharge) = resources::table
                .inner_join(employees::table)
                .filter(resources::resource_id.eq(&item.resource_id))
                .select((Resource::as_select(), Employee::as_select()))
                .first::<(Resource, Employee)>(conn)
                .optional()?
                .ok_or(ApiError::NotFound("resource"))?;

            diesel::insert_into(event_requirements::table)
                .values((
                    event_requirements::event_id.eq(event.id),
                    event_requirements::resource_id.eq(&resource.resource_id),
                    event_requirements::quantity.eq(item.quantity),
                    event_requirements::status.eq(RequirementStatus::Pending),
                    event_requirements::created_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)?;

            by_incharge
                .entry(incharge.employee_id.clone())
                .or_insert_with(|| (incharge, Vec::new()))
                .1
                .push(RequestedItem {
                    resource_name: resource.resource_name,
                    quantity: item.quantity,
                });
        }

        deadline.check()?;

        let header = EventHeader {
            name: event.event_name.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            venue: event.venue.clone(),
        };
        Ok(by_incharge
            .into_values()
            .map(|(incharge, items)| {
                MailDescriptor::new(
                    Recipient::new(incharge.name.clone(), incharge.email),
                    MailContext::ResourceRequest(ResourceRequest {
                        incharge_name: incharge.name,
                        event: header.clone(),
                        organizer_email: caller.email.clone(),
                        items,
                    }),
                )
            })
            .collect())
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementsSubmitted {
    pub message: &'static str,
    pub deliveries: Vec<Delivery>,
}

#[post("/requirements/<id>", data = "<body>")]
pub async fn submit_requirements(
    db: DbConn,
    user: ActiveUser,
    deadline: Deadline,
    span: TracingSpan,
    mailer: &State<Mailer>,
    id: &str,
    body: Json<RequirementList>,
) -> Result<Created<Json<RequirementsSubmitted>>, ApiError> {
    let id = id.to_string();
    let location = format!("/events/{id}");
    let span = span.0;
    let mail = db
        .run(move |conn| {
            let _guard = span.enter();
            add_requirements(conn, &deadline, &user.0, &id, &body.items)
        })
        .await?;

    let deliveries = mailer.dispatch_all(mail, &db).await;
    Ok(Created::new(location).body(Json(RequirementsSubmitted {
        message: "requirements recorded",
        deliveries,
    })))
}

#[get("/organizer/resources")]
pub async fn list_resources(
    db: DbConn,
    user: ActiveUser,
) -> ApiResult<Vec<Resource>> {
    let catalogue = db
        .run(move |conn| -> Result<_, ApiError> {
            require(&user.0, Permission::CreateEvents, conn)?;
            Ok(resources::table
                .order_by(resources::resource_name.asc())
                .select(Resource::as_select())
                .load(conn)?)
        })
        .await?;
    Ok(Json(catalogue))
}

#[cfg(test)]
mod tests {
    use super::{usable_items, RequirementItem};

    #[test]
    fn blank_and_empty_items_are_dropped() {
        let items = [
            RequirementItem {
                resource_id: " R1 ".to_string(),
                quantity: 3,
            },
            RequirementItem {
                resource_id: "".to_string(),
                quantity: 5,
            },
            RequirementItem {
                resource_id: "R2".to_string(),
                quantity: 0,
            },
        ];
        let usable = usable_items(&items);
        assert_eq!(usable.len(), 1);
        assert_eq!(usable[0].resource_id, "R1");
    }
}
