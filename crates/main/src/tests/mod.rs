mod attendance;
mod common;
mod events;
mod platform;
