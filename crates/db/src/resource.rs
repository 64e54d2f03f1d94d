use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::resources;

text_enum! {
    pub enum RequirementStatus {
        Pending => "Pending",
        Approved => "Approved",
        Rejected => "Rejected",
    }
}

#[derive(
    Debug, Queryable, Selectable, Insertable, AsChangeset, Serialize, Deserialize, Clone,
)]
#[diesel(table_name = resources)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_id: String,
    pub resource_name: String,
    pub category: Option<String>,
    pub incharge_employee_id: String,
}
