use diesel::prelude::*;
use serde::Serialize;

use crate::{
    academic::{Employee, Student},
    schema::{employees, event_members, students, teams},
};

text_enum! {
    pub enum PaymentStatus {
        NotApplicable => "N/A",
        Pending => "Pending",
        Verified => "Verified",
    }
}

text_enum! {
    pub enum MemberType {
        Student => "Student",
        Employee => "Employee",
    }
}

text_enum! {
    pub enum MemberRole {
        Participant => "Participant",
        CommitteeMember => "Committee Member",
        StudentOrganiser => "Student Organiser",
        EmployeeOrganiser => "Employee Organiser",
    }
}

impl MemberRole {
    /// Roles that make up an event's organizing team.
    pub const COMMITTEE: &'static [MemberRole] = &[
        MemberRole::CommitteeMember,
        MemberRole::StudentOrganiser,
        MemberRole::EmployeeOrganiser,
    ];

    pub fn is_committee(&self) -> bool {
        Self::COMMITTEE.contains(self)
    }
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = teams)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Team {
    pub id: i64,
    pub public_id: String,
    pub event_id: i64,
    pub team_name: String,
    pub team_leader_student_id: String,
    pub payment_status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub payment_screenshot_path: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Clone)]
#[diesel(table_name = event_members)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EventMember {
    pub id: i64,
    pub public_id: String,
    pub event_id: i64,
    pub member_id: String,
    pub member_type: MemberType,
    pub role: MemberRole,
    pub team_id: Option<i64>,
    pub payment_status: PaymentStatus,
    pub checked_in: bool,
    pub transaction_id: Option<String>,
    pub payment_screenshot_path: Option<String>,
}

impl EventMember {
    pub fn member_ref(&self) -> MemberRef {
        MemberRef::new(self.member_type, self.member_id.clone())
    }
}

/// A tagged reference from an event member to the academic record it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Student(String),
    Employee(String),
}

/// The record a [`MemberRef`] points at.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "memberType", content = "record")]
pub enum Member {
    Student(Student),
    Employee(Employee),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Student(student) => &student.name,
            Member::Employee(employee) => &employee.name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Member::Student(student) => &student.email,
            Member::Employee(employee) => &employee.email,
        }
    }
}

impl MemberRef {
    pub fn new(member_type: MemberType, member_id: String) -> Self {
        match member_type {
            MemberType::Student => MemberRef::Student(member_id),
            MemberType::Employee => MemberRef::Employee(member_id),
        }
    }

    pub fn member_type(&self) -> MemberType {
        match self {
            MemberRef::Student(_) => MemberType::Student,
            MemberRef::Employee(_) => MemberType::Employee,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            MemberRef::Student(id) | MemberRef::Employee(id) => id,
        }
    }

    /// Loads the referenced record, or `None` if it no longer exists.
    pub fn resolve(
        &self,
        conn: &mut SqliteConnection,
    ) -> QueryResult<Option<Member>> {
        match self {
            MemberRef::Student(id) => students::table
                .find(id)
                .select(Student::as_select())
                .first(conn)
                .optional()
                .map(|student| student.map(Member::Student)),
            MemberRef::Employee(id) => employees::table
                .find(id)
                .select(Employee::as_select())
                .first(conn)
                .optional()
                .map(|employee| employee.map(Member::Employee)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{MemberRef, MemberRole, MemberType, PaymentStatus};

    #[test]
    fn stored_names_keep_their_spacing() {
        assert_eq!(MemberRole::CommitteeMember.as_str(), "Committee Member");
        assert_eq!(
            "Student Organiser".parse::<MemberRole>().unwrap(),
            MemberRole::StudentOrganiser
        );
        assert_eq!(PaymentStatus::NotApplicable.as_str(), "N/A");
        assert!("Organiser".parse::<MemberRole>().is_err());
    }

    #[test]
    fn participants_are_not_committee() {
        assert!(!MemberRole::Participant.is_committee());
        assert!(MemberRole::EmployeeOrganiser.is_committee());
    }

    #[test]
    fn member_ref_keeps_its_tag() {
        let r = MemberRef::new(MemberType::Employee, "EMP42".to_string());
        assert_eq!(r, MemberRef::Employee("EMP42".to_string()));
        assert_eq!(r.member_type(), MemberType::Employee);
        assert_eq!(r.id(), "EMP42");
    }
}
