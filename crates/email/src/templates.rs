//! Subjects and bodies for each kind of outbound message.

use chrono::NaiveDateTime;
use maud::{html, Markup};
use serde::Serialize;

const TIME_FORMAT: &str = "%a %d %b %Y, %H:%M";

#[derive(Debug, Clone, Serialize)]
pub struct EventHeader {
    pub name: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub venue: String,
}

impl EventHeader {
    fn window(&self) -> String {
        format!(
            "{} to {}",
            self.start_time.format(TIME_FORMAT),
            self.end_time.format(TIME_FORMAT)
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AbsentStudent {
    pub student_id: String,
    pub name: String,
    pub class_roll_no: String,
}

/// One class a faculty member teaches that overlaps the event.
#[derive(Debug, Clone, Serialize)]
pub struct MissedSession {
    pub course_name: String,
    pub year: i64,
    pub section: String,
    pub subject_name: String,
    pub time_slot: String,
    pub students: Vec<AbsentStudent>,
}

impl MissedSession {
    pub fn label(&self) -> String {
        format!(
            "{} / Year {} / Section {} / {} ({})",
            self.course_name,
            self.year,
            self.section,
            self.subject_name,
            self.time_slot
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitteeContact {
    pub name: String,
    pub role: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceReport {
    pub faculty_name: String,
    pub event: EventHeader,
    pub sessions: Vec<MissedSession>,
    pub committee: Vec<CommitteeContact>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRejected {
    pub event_name: String,
    pub registrant: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestedItem {
    pub resource_name: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceRequest {
    pub incharge_name: String,
    pub event: EventHeader,
    pub organizer_email: String,
    pub items: Vec<RequestedItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApprovalNotice {
    pub event_details: String,
    pub login_email: String,
    pub event_creation_limit: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectionNotice {
    pub event_details: String,
}

pub struct Rendered {
    pub subject: String,
    pub html: String,
    pub text: String,
}

fn page(body: Markup) -> String {
    html! {
        (maud::DOCTYPE)
        html {
            body style="font-family: sans-serif" {
                (body)
            }
        }
    }
    .into_string()
}

pub fn attendance_report(report: &AttendanceReport) -> Rendered {
    let subject = format!("Attendance notice: {}", report.event.name);

    let html = page(html! {
        p { "Dear " (report.faculty_name) "," }
        p {
            "The following students attended "
            strong { (report.event.name) }
            " (" (report.event.window()) ", " (report.event.venue) ")"
            " and could not attend your classes listed below."
        }
        @for session in &report.sessions {
            h3 { (session.label()) }
            table border="1" cellpadding="4" {
                tr { th { "Student ID" } th { "Name" } th { "Roll No." } }
                @for student in &session.students {
                    tr {
                        td { (student.student_id) }
                        td { (student.name) }
                        td { (student.class_roll_no) }
                    }
                }
            }
        }
        @if !report.committee.is_empty() {
            h3 { "Organizing team" }
            ul {
                @for member in &report.committee {
                    li { (member.name) " (" (member.role) ", " (member.email) ")" }
                }
            }
        }
    });

    let mut text = format!(
        "Dear {},\n\nThe following students attended {} ({}, {}) and could not attend your classes listed below.\n",
        report.faculty_name,
        report.event.name,
        report.event.window(),
        report.event.venue
    );
    for session in &report.sessions {
        text.push_str(&format!("\n{}\n", session.label()));
        for student in &session.students {
            text.push_str(&format!(
                "  - {} {} ({})\n",
                student.student_id, student.name, student.class_roll_no
            ));
        }
    }
    if !report.committee.is_empty() {
        text.push_str("\nOrganizing team:\n");
        for member in &report.committee {
            text.push_str(&format!(
                "  - {} ({}, {})\n",
                member.name, member.role, member.email
            ));
        }
    }

    Rendered {
        subject,
        html,
        text,
    }
}

pub fn payment_rejected(notice: &PaymentRejected) -> Rendered {
    let subject = format!("Payment rejected: {}", notice.event_name);
    let html = page(html! {
        p { "Hello " (notice.registrant) "," }
        p {
            "Your payment for " strong { (notice.event_name) }
            " could not be verified and your registration has been removed."
        }
        p { "Reason: " (notice.reason) }
    });
    let text = format!(
        "Hello {},\n\nYour payment for {} could not be verified and your registration has been removed.\n\nReason: {}\n",
        notice.registrant, notice.event_name, notice.reason
    );
    Rendered {
        subject,
        html,
        text,
    }
}

pub fn resource_request(request: &ResourceRequest) -> Rendered {
    let subject = format!("Resource request: {}", request.event.name);
    let html = page(html! {
        p { "Dear " (request.incharge_name) "," }
        p {
            (request.organizer_email) " has requested the following for "
            strong { (request.event.name) }
            " (" (request.event.window()) ", " (request.event.venue) "):"
        }
        ul {
            @for item in &request.items {
                li { (item.resource_name) " x " (item.quantity) }
            }
        }
    });
    let mut text = format!(
        "Dear {},\n\n{} has requested the following for {} ({}, {}):\n",
        request.incharge_name,
        request.organizer_email,
        request.event.name,
        request.event.window(),
        request.event.venue
    );
    for item in &request.items {
        text.push_str(&format!("  - {} x {}\n", item.resource_name, item.quantity));
    }
    Rendered {
        subject,
        html,
        text,
    }
}

pub fn approval_notice(notice: &ApprovalNotice) -> Rendered {
    let subject = "Your event request has been approved".to_string();
    let html = page(html! {
        p { "Your event request has been approved." }
        blockquote { (notice.event_details) }
        p {
            "Sign in as " strong { (notice.login_email) }
            " with the one-time password given to you by the event administrators."
            " You may create up to " (notice.event_creation_limit) " event(s)."
        }
    });
    let text = format!(
        "Your event request has been approved.\n\n> {}\n\nSign in as {} with the one-time password given to you by the event administrators. You may create up to {} event(s).\n",
        notice.event_details, notice.login_email, notice.event_creation_limit
    );
    Rendered {
        subject,
        html,
        text,
    }
}

pub fn rejection_notice(notice: &RejectionNotice) -> Rendered {
    let subject = "Your event request was not approved".to_string();
    let html = page(html! {
        p { "Your event request was not approved." }
        blockquote { (notice.event_details) }
    });
    let text = format!(
        "Your event request was not approved.\n\n> {}\n",
        notice.event_details
    );
    Rendered {
        subject,
        html,
        text,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn header() -> EventHeader {
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        EventHeader {
            name: "Hackathon".to_string(),
            start_time: day.and_hms_opt(10, 0, 0).unwrap(),
            end_time: day.and_hms_opt(12, 0, 0).unwrap(),
            venue: "Main Hall".to_string(),
        }
    }

    #[test]
    fn attendance_report_lists_every_student() {
        let rendered = attendance_report(&AttendanceReport {
            faculty_name: "Dr. Rao".to_string(),
            event: header(),
            sessions: vec![MissedSession {
                course_name: "BTCS".to_string(),
                year: 2,
                section: "A".to_string(),
                subject_name: "DS".to_string(),
                time_slot: "09:00-11:00".to_string(),
                students: vec![AbsentStudent {
                    student_id: "S1".to_string(),
                    name: "Asha <script>".to_string(),
                    class_roll_no: "12".to_string(),
                }],
            }],
            committee: vec![],
        });

        assert_eq!(rendered.subject, "Attendance notice: Hackathon");
        assert!(rendered.text.contains("BTCS / Year 2 / Section A / DS (09:00-11:00)"));
        assert!(rendered.text.contains("S1 Asha <script> (12)"));
        assert!(rendered.html.contains("Asha &lt;script&gt;"));
        assert!(!rendered.text.contains("Organizing team"));
    }
}
