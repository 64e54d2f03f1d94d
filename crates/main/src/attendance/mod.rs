//! Attendance reports for faculty whose classes clash with an event.

pub mod dispatch;
pub mod load;
pub mod reconcile;
pub mod routes;
pub mod slot;
