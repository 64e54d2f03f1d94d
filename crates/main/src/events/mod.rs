pub mod create;
pub mod manage;
pub mod routes;
pub mod uploads;
