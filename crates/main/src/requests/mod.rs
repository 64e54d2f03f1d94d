pub mod lifecycle;
pub mod routes;
