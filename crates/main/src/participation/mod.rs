pub mod check_in;
pub mod payments;
pub mod registration;
pub mod routes;
pub mod team;
