//! Per-request identifiers and tracing spans.

use std::fmt;

use rocket::{
    Data, Response,
    fairing::{Fairing, Info, Kind},
    http::Status,
    request::{self, FromRequest, Request},
};
use sentry::configure_scope;
use tracing::{Span, info};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A request's ID. Taken from the `X-Request-Id` header when the client
/// supplies one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the current request's ID, assigning one only as necessary.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, Self::Error> {
        // `local_cache` runs the closure at most once per request.
        request::Outcome::Success(
            request
                .local_cache(|| {
                    RequestId(
                        request
                            .headers()
                            .get_one(REQUEST_ID_HEADER)
                            .filter(|id| !id.is_empty() && id.len() <= 128)
                            .map(ToString::to_string)
                            .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    )
                })
                .clone(),
        )
    }
}

/// The span opened for the current request. Handlers enter it inside
/// blocking database closures so that their logs carry the request fields.
pub struct TracingSpan<T = tracing::Span>(pub T);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TracingSpan {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> rocket::request::Outcome<Self, ()> {
        match request.local_cache(|| TracingSpan::<Option<Span>>(None)) {
            TracingSpan(Some(span)) => {
                rocket::request::Outcome::Success(TracingSpan(span.to_owned()))
            }
            TracingSpan(None) => rocket::request::Outcome::Error((
                Status::InternalServerError,
                (),
            )),
        }
    }
}

pub struct RequestIdFairing;

#[rocket::async_trait]
impl Fairing for RequestIdFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request ID fairing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let request_id = req.guard::<RequestId>().await;

        let _ = request_id.map(|request_id| {
            let span = tracing::info_span!(
                "request",
                http.method = %req.method(),
                http.uri = %req.uri().path(),
                http.status_code = tracing::field::Empty,
                http.request_id = %request_id
            );
            span.in_scope(|| {
                tracing::info!("received request");
                configure_scope(|scope| {
                    scope.set_tag("request_id", &request_id);
                    scope.set_transaction(Some(&format!(
                        "{} {}",
                        req.method(),
                        req.uri().path()
                    )));
                });
            });
            req.local_cache(|| {
                TracingSpan::<Option<tracing::Span>>(Some(span))
            });
        });
    }

    async fn on_response<'r>(
        &self,
        req: &'r Request<'_>,
        res: &mut Response<'r>,
    ) {
        let request_id = req.guard::<RequestId>().await;

        if let Some(span) = req
            .local_cache(|| TracingSpan::<Option<Span>>(None))
            .0
            .to_owned()
        {
            let entered = span.entered();
            entered.record("http.status_code", res.status().code);

            if let request::Outcome::Success(request_id) = &request_id {
                info!("Returning request {request_id} with {}", res.status());
            }

            entered.exit();
        }

        if let request::Outcome::Success(request_id) = request_id {
            res.set_raw_header(REQUEST_ID_HEADER, request_id.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::{get, local::blocking::Client, routes};

    use super::{REQUEST_ID_HEADER, RequestId, RequestIdFairing, TracingSpan};

    #[get("/")]
    fn echo(id: RequestId, _span: TracingSpan) -> String {
        id.0
    }

    fn client() -> Client {
        let rocket = rocket::build()
            .mount("/", routes![echo])
            .attach(RequestIdFairing);
        Client::tracked(rocket).unwrap()
    }

    #[test]
    fn supplied_request_ids_are_echoed() {
        let client = client();
        let response = client
            .get("/")
            .header(rocket::http::Header::new(REQUEST_ID_HEADER, "abc-123"))
            .dispatch();
        assert_eq!(response.headers().get_one(REQUEST_ID_HEADER), Some("abc-123"));
        assert_eq!(response.into_string().unwrap(), "abc-123");
    }

    #[test]
    fn missing_request_ids_are_generated() {
        let client = client();
        let response = client.get("/").dispatch();
        let header = response
            .headers()
            .get_one(REQUEST_ID_HEADER)
            .unwrap()
            .to_string();
        assert_eq!(response.into_string().unwrap(), header);
        assert_eq!(header.len(), 36);
    }
}
