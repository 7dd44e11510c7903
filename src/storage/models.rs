//! Database models for Compliance Core.
//!
//! These are the row types returned by SQLx queries. IDs and timestamps are
//! stored as TEXT and parsed back into domain types here.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{
    is_overdue, Assignment, AssignmentStatus, AssignmentSummary, AuditEvent, BundleSummary,
    Department, Employee, Incident, ModuleProgress, Organization, OrganizationMembership, Policy,
    PolicyBundle, TrainingModule, TrainingProgress, TrainingStatus, User,
};
use crate::error::ComplianceError;

fn parse_uuid(s: &str) -> Result<Uuid, ComplianceError> {
    Uuid::parse_str(s).map_err(|e| ComplianceError::Internal(e.to_string()))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, ComplianceError> {
    s.as_deref().map(parse_uuid).transpose()
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, ComplianceError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ComplianceError::Internal(e.to_string()))
}

fn parse_opt_time(s: Option<String>) -> Result<Option<DateTime<Utc>>, ComplianceError> {
    s.as_deref().map(parse_time).transpose()
}

fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>, ComplianceError> {
    s.map(|d| {
        NaiveDate::parse_from_str(&d, "%Y-%m-%d")
            .map_err(|e| ComplianceError::Internal(e.to_string()))
    })
    .transpose()
}

fn parse_enum<T: std::str::FromStr<Err = String>>(s: &str) -> Result<T, ComplianceError> {
    s.parse::<T>().map_err(ComplianceError::Internal)
}

// ==================== Users & Organizations ====================

/// Database row for users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = ComplianceError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_uuid(&row.id)?,
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Database row for organizations table.
#[derive(Debug, Clone, FromRow)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub entity_type: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = ComplianceError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        Ok(Organization {
            id: parse_uuid(&row.id)?,
            name: row.name,
            slug: row.slug,
            entity_type: parse_enum(&row.entity_type)?,
            description: row.description,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Row for a user's memberships (organizations joined with employees).
#[derive(Debug, Clone, FromRow)]
pub struct MembershipRow {
    pub organization_id: String,
    pub name: String,
    pub slug: String,
    pub employee_id: String,
    pub role: String,
}

impl TryFrom<MembershipRow> for OrganizationMembership {
    type Error = ComplianceError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        Ok(OrganizationMembership {
            organization_id: parse_uuid(&row.organization_id)?,
            name: row.name,
            slug: row.slug,
            employee_id: parse_uuid(&row.employee_id)?,
            role: parse_enum(&row.role)?,
        })
    }
}

// ==================== Departments & Employees ====================

/// Database row for departments table.
#[derive(Debug, Clone, FromRow)]
pub struct DepartmentRow {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<DepartmentRow> for Department {
    type Error = ComplianceError;

    fn try_from(row: DepartmentRow) -> Result<Self, Self::Error> {
        Ok(Department {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            name: row.name,
            description: row.description,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Database row for employees table.
#[derive(Debug, Clone, FromRow)]
pub struct EmployeeRow {
    pub id: String,
    pub organization_id: String,
    pub user_id: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: Option<String>,
    pub department_id: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = ComplianceError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            user_id: parse_opt_uuid(row.user_id)?,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            job_title: row.job_title,
            department_id: parse_opt_uuid(row.department_id)?,
            role: parse_enum(&row.role)?,
            status: parse_enum(&row.status)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

// ==================== Policies & Assignments ====================

/// Database row for policies table.
#[derive(Debug, Clone, FromRow)]
pub struct PolicyRow {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub category: String,
    pub applies_to: String,
    pub content: String,
    pub version: i64,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<PolicyRow> for Policy {
    type Error = ComplianceError;

    fn try_from(row: PolicyRow) -> Result<Self, Self::Error> {
        Ok(Policy {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            title: row.title,
            category: parse_enum(&row.category)?,
            applies_to: parse_enum(&row.applies_to)?,
            content: row.content,
            version: row.version,
            status: parse_enum(&row.status)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Database row for policy_bundles table (policy IDs are loaded separately).
#[derive(Debug, Clone, FromRow)]
pub struct BundleRow {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row for bundle list views with aggregate counts.
#[derive(Debug, Clone, FromRow)]
pub struct BundleSummaryRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub policy_count: i64,
    pub assignment_count: i64,
    pub attested_count: i64,
    pub created_at: String,
}

impl BundleRow {
    /// Combine with the bundle's ordered policy IDs.
    pub fn into_bundle(self, policy_ids: Vec<Uuid>) -> Result<PolicyBundle, ComplianceError> {
        Ok(PolicyBundle {
            id: parse_uuid(&self.id)?,
            organization_id: parse_uuid(&self.organization_id)?,
            name: self.name,
            description: self.description,
            policy_ids,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

impl TryFrom<BundleSummaryRow> for BundleSummary {
    type Error = ComplianceError;

    fn try_from(row: BundleSummaryRow) -> Result<Self, Self::Error> {
        Ok(BundleSummary {
            id: parse_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            policy_count: row.policy_count,
            assignment_count: row.assignment_count,
            attested_count: row.attested_count,
            created_at: parse_time(&row.created_at)?,
        })
    }
}

/// Database row for assignments table.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub id: String,
    pub organization_id: String,
    pub bundle_id: String,
    pub employee_id: String,
    pub status: String,
    pub due_date: Option<String>,
    pub signature: Option<String>,
    pub assigned_by: String,
    pub assigned_at: String,
    pub viewed_at: Option<String>,
    pub attested_at: Option<String>,
}

impl TryFrom<AssignmentRow> for Assignment {
    type Error = ComplianceError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        Ok(Assignment {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            bundle_id: parse_uuid(&row.bundle_id)?,
            employee_id: parse_uuid(&row.employee_id)?,
            status: parse_enum(&row.status)?,
            due_date: parse_opt_date(row.due_date)?,
            signature: row.signature,
            assigned_by: parse_uuid(&row.assigned_by)?,
            assigned_at: parse_time(&row.assigned_at)?,
            viewed_at: parse_opt_time(row.viewed_at)?,
            attested_at: parse_opt_time(row.attested_at)?,
        })
    }
}

/// Row for assignment list views (joined with bundles and employees).
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentSummaryRow {
    pub id: String,
    pub bundle_id: String,
    pub bundle_name: String,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: String,
    pub due_date: Option<String>,
    pub assigned_at: String,
    pub attested_at: Option<String>,
}

impl AssignmentSummaryRow {
    /// Convert to the API shape, deriving `is_overdue` against `today`.
    pub fn into_summary(self, today: NaiveDate) -> Result<AssignmentSummary, ComplianceError> {
        let status: AssignmentStatus = parse_enum(&self.status)?;
        let due_date = parse_opt_date(self.due_date)?;
        Ok(AssignmentSummary {
            id: parse_uuid(&self.id)?,
            bundle_id: parse_uuid(&self.bundle_id)?,
            bundle_name: self.bundle_name,
            employee_id: parse_uuid(&self.employee_id)?,
            employee_name: format!("{} {}", self.first_name, self.last_name)
                .trim()
                .to_string(),
            employee_email: self.email,
            status,
            due_date,
            is_overdue: is_overdue(status, due_date, today),
            assigned_at: parse_time(&self.assigned_at)?,
            attested_at: parse_opt_time(self.attested_at)?,
        })
    }
}

// ==================== Incidents ====================

/// Database row for incidents table.
#[derive(Debug, Clone, FromRow)]
pub struct IncidentRow {
    pub id: String,
    pub organization_id: String,
    pub reported_by: String,
    pub title: String,
    pub description: String,
    pub incident_type: String,
    pub severity: String,
    pub status: String,
    pub phi_involved: bool,
    pub affected_individuals: Option<i64>,
    pub occurred_at: Option<String>,
    pub discovered_at: String,
    pub resolution_notes: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = ComplianceError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        Ok(Incident {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            reported_by: parse_uuid(&row.reported_by)?,
            title: row.title,
            description: row.description,
            incident_type: parse_enum(&row.incident_type)?,
            severity: parse_enum(&row.severity)?,
            status: parse_enum(&row.status)?,
            phi_involved: row.phi_involved,
            affected_individuals: row.affected_individuals,
            occurred_at: parse_opt_time(row.occurred_at)?,
            discovered_at: parse_time(&row.discovered_at)?,
            resolution_notes: row.resolution_notes,
            resolved_at: parse_opt_time(row.resolved_at)?,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

// ==================== Training ====================

/// Database row for training_modules table.
#[derive(Debug, Clone, FromRow)]
pub struct TrainingModuleRow {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub description: Option<String>,
    pub content: String,
    pub duration_minutes: i64,
    pub required: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<TrainingModuleRow> for TrainingModule {
    type Error = ComplianceError;

    fn try_from(row: TrainingModuleRow) -> Result<Self, Self::Error> {
        Ok(TrainingModule {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            title: row.title,
            description: row.description,
            content: row.content,
            duration_minutes: row.duration_minutes,
            required: row.required,
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Database row for training_progress table.
#[derive(Debug, Clone, FromRow)]
pub struct TrainingProgressRow {
    pub id: String,
    pub organization_id: String,
    pub employee_id: String,
    pub module_id: String,
    pub status: String,
    pub progress_percent: i64,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub updated_at: String,
}

impl TryFrom<TrainingProgressRow> for TrainingProgress {
    type Error = ComplianceError;

    fn try_from(row: TrainingProgressRow) -> Result<Self, Self::Error> {
        Ok(TrainingProgress {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            employee_id: parse_uuid(&row.employee_id)?,
            module_id: parse_uuid(&row.module_id)?,
            status: parse_enum(&row.status)?,
            progress_percent: row.progress_percent,
            started_at: parse_opt_time(row.started_at)?,
            completed_at: parse_opt_time(row.completed_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

/// Row for per-module progress (modules left-joined with one employee's progress).
#[derive(Debug, Clone, FromRow)]
pub struct ModuleProgressRow {
    pub module_id: String,
    pub title: String,
    pub required: bool,
    pub duration_minutes: i64,
    pub status: Option<String>,
    pub progress_percent: Option<i64>,
    pub completed_at: Option<String>,
}

impl TryFrom<ModuleProgressRow> for ModuleProgress {
    type Error = ComplianceError;

    fn try_from(row: ModuleProgressRow) -> Result<Self, Self::Error> {
        Ok(ModuleProgress {
            module_id: parse_uuid(&row.module_id)?,
            title: row.title,
            required: row.required,
            duration_minutes: row.duration_minutes,
            status: row
                .status
                .as_deref()
                .map(parse_enum::<TrainingStatus>)
                .transpose()?
                .unwrap_or(TrainingStatus::NotStarted),
            progress_percent: row.progress_percent.unwrap_or(0),
            completed_at: parse_opt_time(row.completed_at)?,
        })
    }
}

// ==================== Audit ====================

/// Database row for audit_events table.
#[derive(Debug, Clone, FromRow)]
pub struct AuditEventRow {
    pub id: String,
    pub organization_id: String,
    pub actor_employee_id: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub details: Option<String>,
    pub created_at: String,
}

impl TryFrom<AuditEventRow> for AuditEvent {
    type Error = ComplianceError;

    fn try_from(row: AuditEventRow) -> Result<Self, Self::Error> {
        Ok(AuditEvent {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            actor_employee_id: parse_uuid(&row.actor_employee_id)?,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: parse_uuid(&row.entity_id)?,
            details: row.details.map(|d| serde_json::from_str(&d)).transpose()?,
            created_at: parse_time(&row.created_at)?,
        })
    }
}
