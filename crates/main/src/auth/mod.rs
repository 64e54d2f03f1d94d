use db::user::bearer_token;
use rocket::{
    http::Status,
    request::{self, FromRequest},
    Request,
};

pub mod change_password;
pub mod login;
pub mod logout;

/// The raw bearer token presented with a request, whether or not it still
/// names a live session.
pub struct PresentedToken(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for PresentedToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, ()> {
        match bearer_token(request) {
            Some(token) => request::Outcome::Success(PresentedToken(token.to_string())),
            None => request::Outcome::Error((Status::Unauthorized, ())),
        }
    }
}
