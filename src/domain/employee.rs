//! Employee domain models.
//!
//! An employee is a person's membership in one organization. Employees are
//! created by admins in the `invited` state and become `active` once the
//! invitation is accepted and linked to a user account.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Role within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    /// Full access, including deleting the organization.
    Owner,
    /// Manages employees, policies, incidents and training.
    Admin,
    /// Attests policies, completes training, reports incidents.
    Employee,
}

impl OrgRole {
    /// Owners and admins manage the organization.
    pub fn is_admin(&self) -> bool {
        matches!(self, OrgRole::Owner | OrgRole::Admin)
    }
}

impl Default for OrgRole {
    fn default() -> Self {
        OrgRole::Employee
    }
}

impl std::fmt::Display for OrgRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrgRole::Owner => write!(f, "owner"),
            OrgRole::Admin => write!(f, "admin"),
            OrgRole::Employee => write!(f, "employee"),
        }
    }
}

impl std::str::FromStr for OrgRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(OrgRole::Owner),
            "admin" => Ok(OrgRole::Admin),
            "employee" => Ok(OrgRole::Employee),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Lifecycle of an employee record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeStatus {
    Invited,
    Active,
    Inactive,
}

impl std::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmployeeStatus::Invited => write!(f, "invited"),
            EmployeeStatus::Active => write!(f, "active"),
            EmployeeStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl std::str::FromStr for EmployeeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invited" => Ok(EmployeeStatus::Invited),
            "active" => Ok(EmployeeStatus::Active),
            "inactive" => Ok(EmployeeStatus::Inactive),
            _ => Err(format!("Unknown employee status: {}", s)),
        }
    }
}

/// An employee of an organization.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Employee {
    /// Unique identifier.
    pub id: Uuid,
    /// Organization this employee belongs to.
    pub organization_id: Uuid,
    /// Linked user account, once the invitation has been accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Work email, unique within the organization.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department_id: Option<Uuid>,
    /// Role in the organization.
    pub role: OrgRole,
    /// Current status.
    pub status: EmployeeStatus,
    /// When the employee was created.
    pub created_at: DateTime<Utc>,
    /// When the employee was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    /// Create an invited employee with no linked user.
    pub fn invited(
        organization_id: Uuid,
        email: String,
        first_name: String,
        last_name: String,
        role: OrgRole,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            user_id: None,
            email: email.trim().to_lowercase(),
            first_name,
            last_name,
            job_title: None,
            department_id: None,
            role,
            status: EmployeeStatus::Invited,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an active employee already linked to a user (organization creators).
    pub fn active_for_user(
        organization_id: Uuid,
        user_id: Uuid,
        email: String,
        name: Option<&str>,
        role: OrgRole,
    ) -> Self {
        let (first_name, last_name) = split_name(name.unwrap_or(""));
        let mut employee = Self::invited(organization_id, email, first_name, last_name, role);
        employee.user_id = Some(user_id);
        employee.status = EmployeeStatus::Active;
        employee
    }

    /// Display name, "First Last".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Split a free-form display name into first and last name.
pub fn split_name(name: &str) -> (String, String) {
    let name = name.trim();
    match name.split_once(char::is_whitespace) {
        Some((first, rest)) => (first.to_string(), rest.trim().to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// A user's membership in an organization (for API responses).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrganizationMembership {
    /// Organization ID.
    pub organization_id: Uuid,
    /// Organization name.
    pub name: String,
    /// Organization slug.
    pub slug: String,
    /// Employee record ID in that organization.
    pub employee_id: Uuid,
    /// User's role in the organization.
    pub role: OrgRole,
}

/// Filters for employee listings.
#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub department_id: Option<Uuid>,
    pub status: Option<EmployeeStatus>,
    pub role: Option<OrgRole>,
    /// Case-insensitive match on first name, last name or email.
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(OrgRole::Owner.is_admin());
        assert!(OrgRole::Admin.is_admin());
        assert!(!OrgRole::Employee.is_admin());
    }

    #[test]
    fn test_invited_employee_normalizes_email() {
        let e = Employee::invited(
            Uuid::new_v4(),
            "  Nurse.Joy@Clinic.org ".to_string(),
            "Joy".to_string(),
            "Nurse".to_string(),
            OrgRole::Employee,
        );
        assert_eq!(e.email, "nurse.joy@clinic.org");
        assert_eq!(e.status, EmployeeStatus::Invited);
        assert!(e.user_id.is_none());
    }

    #[test]
    fn test_split_name() {
        assert_eq!(
            split_name("Ada  King Lovelace"),
            ("Ada".to_string(), "King Lovelace".to_string())
        );
        assert_eq!(split_name("Cher"), ("Cher".to_string(), String::new()));
        assert_eq!(split_name(""), (String::new(), String::new()));
    }
}
