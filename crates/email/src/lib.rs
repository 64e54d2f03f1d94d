//! Sends emails.
//!
//! Every message is first written to the `emails` table and then, if an SMTP
//! relay is configured, handed to it. Failures are reported back to the
//! caller but never abort the operation that produced the message.

use chrono::Utc;
use db::{schema::emails, DbConn};
use diesel::prelude::*;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use rocket::futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub mod templates;

use templates::{
    ApprovalNotice, AttendanceReport, PaymentRejected, RejectionNotice,
    Rendered, ResourceRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MailKind {
    AttendanceReport,
    PaymentRejected,
    ResourceRequest,
    ApprovalNotice,
    RejectionNotice,
}

impl MailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailKind::AttendanceReport => "AttendanceReport",
            MailKind::PaymentRejected => "PaymentRejected",
            MailKind::ResourceRequest => "ResourceRequest",
            MailKind::ApprovalNotice => "ApprovalNotice",
            MailKind::RejectionNotice => "RejectionNotice",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

impl Recipient {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    fn display(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone, Serialize)]
pub enum MailContext {
    AttendanceReport(AttendanceReport),
    PaymentRejected(PaymentRejected),
    ResourceRequest(ResourceRequest),
    ApprovalNotice(ApprovalNotice),
    RejectionNotice(RejectionNotice),
}

/// One outbound message to one recipient. The kind is carried by the
/// context, so the two cannot disagree.
#[derive(Debug, Clone, Serialize)]
pub struct MailDescriptor {
    pub recipient: Recipient,
    pub context: MailContext,
}

impl MailDescriptor {
    pub fn new(recipient: Recipient, context: MailContext) -> Self {
        Self { recipient, context }
    }

    pub fn kind(&self) -> MailKind {
        match &self.context {
            MailContext::AttendanceReport(_) => MailKind::AttendanceReport,
            MailContext::PaymentRejected(_) => MailKind::PaymentRejected,
            MailContext::ResourceRequest(_) => MailKind::ResourceRequest,
            MailContext::ApprovalNotice(_) => MailKind::ApprovalNotice,
            MailContext::RejectionNotice(_) => MailKind::RejectionNotice,
        }
    }

    pub fn render(&self) -> Rendered {
        match &self.context {
            MailContext::AttendanceReport(c) => {
                templates::attendance_report(c)
            }
            MailContext::PaymentRejected(c) => templates::payment_rejected(c),
            MailContext::ResourceRequest(c) => templates::resource_request(c),
            MailContext::ApprovalNotice(c) => templates::approval_notice(c),
            MailContext::RejectionNotice(c) => templates::rejection_notice(c),
        }
    }
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("could not build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP relay failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("could not record message: {0}")]
    Outbox(#[from] diesel::result::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error")]
pub enum DeliveryStatus {
    /// Handed to the SMTP relay.
    Relayed,
    /// Written to the outbox only (no relay configured).
    Recorded,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub kind: MailKind,
    pub recipient: String,
    pub status: DeliveryStatus,
}

impl Delivery {
    pub fn failed(&self) -> bool {
        matches!(self.status, DeliveryStatus::Failed(_))
    }
}

struct Prepared {
    kind: MailKind,
    recipient: Recipient,
    message_id: String,
    rendered: Rendered,
}

pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
    domain: String,
}

impl Mailer {
    /// Reads `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_DOMAIN`
    /// and `MAIL_FROM`. Without `SMTP_HOST` messages are only recorded.
    pub fn from_env() -> Result<Self, MailError> {
        let domain = std::env::var("SMTP_DOMAIN")
            .unwrap_or_else(|_| "localhost".to_string());
        let from = match std::env::var("MAIL_FROM") {
            Ok(from) => from.parse::<Mailbox>()?,
            Err(_) => Mailbox::new(
                Some("Campus Events".to_string()),
                format!("noreply@{domain}").parse::<Address>()?,
            ),
        };

        let transport = match std::env::var("SMTP_HOST") {
            Ok(host) => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::relay(&host)?;
                if let (Ok(username), Ok(password)) = (
                    std::env::var("SMTP_USERNAME"),
                    std::env::var("SMTP_PASSWORD"),
                ) {
                    builder =
                        builder.credentials(Credentials::new(username, password));
                }
                tracing::info!("Relaying mail through {host}");
                Some(builder.build())
            }
            Err(_) => {
                tracing::info!("SMTP_HOST is not set, mail will only be recorded");
                None
            }
        };

        Ok(Self {
            transport,
            from,
            domain,
        })
    }

    /// A mailer that never relays, whatever the environment says.
    pub fn record_only() -> Result<Self, MailError> {
        Ok(Self {
            transport: None,
            from: Mailbox::new(
                Some("Campus Events".to_string()),
                Address::new("noreply", "localhost")?,
            ),
            domain: "localhost".to_string(),
        })
    }

    /// Sends every descriptor, returning one [`Delivery`] per descriptor in
    /// the same order. Outbox rows are written in descriptor order; relaying
    /// happens concurrently.
    #[tracing::instrument(skip_all, fields(count = descriptors.len()))]
    pub async fn dispatch_all(
        &self,
        descriptors: Vec<MailDescriptor>,
        db: &DbConn,
    ) -> Vec<Delivery> {
        let prepared = descriptors
            .into_iter()
            .map(|descriptor| Prepared {
                kind: descriptor.kind(),
                message_id: format!("{}@{}", Uuid::now_v7(), self.domain),
                rendered: descriptor.render(),
                recipient: descriptor.recipient,
            })
            .collect::<Vec<_>>();

        let rows = prepared
            .iter()
            .map(|p| {
                (
                    emails::message_id.eq(p.message_id.clone()),
                    emails::kind.eq(p.kind.as_str()),
                    emails::recipients.eq(p.recipient.display()),
                    emails::subject.eq(p.rendered.subject.clone()),
                    emails::contents.eq(Some(p.rendered.text.clone())),
                    emails::delivered.eq(false),
                    emails::created_at.eq(Utc::now().naive_utc()),
                )
            })
            .collect::<Vec<_>>();

        let recorded = db
            .run(move |conn| {
                conn.transaction(|conn| {
                    for row in rows {
                        diesel::insert_into(emails::table)
                            .values(row)
                            .execute(conn)?;
                    }
                    Ok::<_, diesel::result::Error>(())
                })
            })
            .await;

        if let Err(e) = recorded {
            tracing::error!("Failed to record outbound mail: {e}");
            let reason = MailError::Outbox(e).to_string();
            return prepared
                .into_iter()
                .map(|p| Delivery {
                    kind: p.kind,
                    recipient: p.recipient.email,
                    status: DeliveryStatus::Failed(reason.clone()),
                })
                .collect();
        }

        let outcomes =
            join_all(prepared.iter().map(|p| self.relay(p))).await;

        let updates = prepared
            .iter()
            .zip(outcomes.iter())
            .filter_map(|(p, outcome)| match outcome {
                DeliveryStatus::Relayed => {
                    Some((p.message_id.clone(), true, None))
                }
                DeliveryStatus::Failed(e) => {
                    Some((p.message_id.clone(), false, Some(e.clone())))
                }
                DeliveryStatus::Recorded => None,
            })
            .collect::<Vec<_>>();

        if !updates.is_empty() {
            let result = db
                .run(move |conn| {
                    for (message_id, delivered, error) in updates {
                        diesel::update(emails::table)
                            .filter(emails::message_id.eq(message_id))
                            .set((
                                emails::delivered.eq(delivered),
                                emails::error.eq(error),
                            ))
                            .execute(conn)?;
                    }
                    Ok::<_, diesel::result::Error>(())
                })
                .await;
            if let Err(e) = result {
                tracing::warn!("Failed to update mail delivery status: {e}");
            }
        }

        prepared
            .into_iter()
            .zip(outcomes)
            .map(|(p, status)| {
                if let DeliveryStatus::Failed(e) = &status {
                    tracing::warn!(
                        "Failed to send {} to {}: {e}",
                        p.kind.as_str(),
                        p.recipient.email
                    );
                }
                Delivery {
                    kind: p.kind,
                    recipient: p.recipient.email,
                    status,
                }
            })
            .collect()
    }

    async fn relay(&self, prepared: &Prepared) -> DeliveryStatus {
        let message = match self.build_message(prepared) {
            Ok(message) => message,
            Err(e) => return DeliveryStatus::Failed(e.to_string()),
        };

        match &self.transport {
            Some(transport) => match transport.send(message).await {
                Ok(_) => DeliveryStatus::Relayed,
                Err(e) => DeliveryStatus::Failed(MailError::Smtp(e).to_string()),
            },
            None => DeliveryStatus::Recorded,
        }
    }

    fn build_message(&self, prepared: &Prepared) -> Result<Message, MailError> {
        let to = Mailbox::new(
            Some(prepared.recipient.name.clone()),
            prepared.recipient.email.parse::<Address>()?,
        );

        Ok(Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(prepared.rendered.subject.clone())
            .message_id(Some(format!("<{}>", prepared.message_id)))
            .multipart(MultiPart::alternative_plain_html(
                prepared.rendered.text.clone(),
                prepared.rendered.html.clone(),
            ))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_context() {
        let descriptor = MailDescriptor::new(
            Recipient::new("Asha", "asha@example.com"),
            MailContext::RejectionNotice(RejectionNotice {
                event_details: "Robotics expo".to_string(),
            }),
        );
        assert_eq!(descriptor.kind(), MailKind::RejectionNotice);
        assert!(descriptor.render().text.contains("Robotics expo"));
    }

    #[test]
    fn bad_recipient_addresses_fail_to_build() {
        let mailer = Mailer::record_only().unwrap();
        let prepared = Prepared {
            kind: MailKind::ApprovalNotice,
            recipient: Recipient::new("Nobody", "not an address"),
            message_id: "x@localhost".to_string(),
            rendered: templates::rejection_notice(&RejectionNotice {
                event_details: String::new(),
            }),
        };
        assert!(matches!(
            mailer.build_message(&prepared),
            Err(MailError::Address(_))
        ));
    }
}
