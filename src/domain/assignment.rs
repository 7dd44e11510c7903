//! Policy assignment and attestation domain models.
//!
//! An assignment asks one employee to read and attest one policy bundle.
//! Status only moves forward: `pending` -> `viewed` -> `attested`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// State of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    /// Assigned, not yet opened.
    Pending,
    /// Opened by the assignee.
    Viewed,
    /// Acknowledged by the assignee. Terminal.
    Attested,
}

impl AssignmentStatus {
    /// Whether the assignee still owes an attestation.
    pub fn is_open(self) -> bool {
        self != AssignmentStatus::Attested
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentStatus::Pending => write!(f, "pending"),
            AssignmentStatus::Viewed => write!(f, "viewed"),
            AssignmentStatus::Attested => write!(f, "attested"),
        }
    }
}

impl std::str::FromStr for AssignmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AssignmentStatus::Pending),
            "viewed" => Ok(AssignmentStatus::Viewed),
            "attested" => Ok(AssignmentStatus::Attested),
            _ => Err(format!("Unknown assignment status: {}", s)),
        }
    }
}

/// A bundle assigned to an employee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Assignment {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub bundle_id: Uuid,
    pub employee_id: Uuid,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Typed signature captured at attestation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Employee who made the assignment.
    pub assigned_by: Uuid,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attested_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn new(
        organization_id: Uuid,
        bundle_id: Uuid,
        employee_id: Uuid,
        due_date: Option<NaiveDate>,
        assigned_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            bundle_id,
            employee_id,
            status: AssignmentStatus::Pending,
            due_date,
            signature: None,
            assigned_by,
            assigned_at: Utc::now(),
            viewed_at: None,
            attested_at: None,
        }
    }

    /// Not attested and past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        is_overdue(self.status, self.due_date, today)
    }
}

/// Overdue rule shared by assignments and their list rows.
pub fn is_overdue(status: AssignmentStatus, due_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    status.is_open() && due_date.map(|d| d < today).unwrap_or(false)
}

/// Assignment row for list views, joined with bundle and employee names.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignmentSummary {
    pub id: Uuid,
    pub bundle_id: Uuid,
    pub bundle_name: String,
    pub employee_id: Uuid,
    pub employee_name: String,
    pub employee_email: String,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub is_overdue: bool,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attested_at: Option<DateTime<Utc>>,
}

/// Optional filters for listing assignments.
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub status: Option<AssignmentStatus>,
    pub employee_id: Option<Uuid>,
    pub bundle_id: Option<Uuid>,
    /// Only assignments that are (or are not) overdue as of `today`.
    pub overdue: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_overdue_rule() {
        let today = date("2026-03-10");
        assert!(is_overdue(AssignmentStatus::Pending, Some(date("2026-03-09")), today));
        assert!(is_overdue(AssignmentStatus::Viewed, Some(date("2026-01-01")), today));
        // Due today is not overdue yet.
        assert!(!is_overdue(AssignmentStatus::Pending, Some(today), today));
        assert!(!is_overdue(AssignmentStatus::Attested, Some(date("2026-01-01")), today));
        assert!(!is_overdue(AssignmentStatus::Pending, None, today));
    }

    #[test]
    fn test_status_order_moves_forward() {
        assert!(AssignmentStatus::Pending < AssignmentStatus::Viewed);
        assert!(AssignmentStatus::Viewed < AssignmentStatus::Attested);
        assert!(!AssignmentStatus::Attested.is_open());
    }
}
