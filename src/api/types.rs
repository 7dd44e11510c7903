//! API request and response types.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::domain::{
    Applicability, Assignment, AssignmentSummary, AuditEvent, BundleSummary, DepartmentSummary,
    Employee, EmployeeStatus, EmployeeTrainingRow, EntityType, Incident, IncidentStatus,
    IncidentType, ModuleProgress, OrgRole, OrganizationMembership, Policy, PolicyCategory,
    PolicyStatus, Severity, TrainingModule, TrainingSummary, User,
};

fn default_limit() -> i64 {
    50
}

fn default_true() -> bool {
    true
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ==================== Health ====================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Database connectivity.
    pub database: String,
    /// Timestamp.
    pub timestamp: String,
}

// ==================== Authentication ====================

/// Account registration request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Login request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// User email.
    pub email: String,
    /// User password.
    pub password: String,
}

/// Accept an employee invitation.
///
/// Creates the user account when none exists for the invited email;
/// otherwise the password must match the existing account.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptInviteRequest {
    /// The one-time `inv_` token.
    pub token: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Token issued by register, login and invite acceptance.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// JWT token.
    pub token: String,
    pub user: User,
    /// Token expiration in seconds.
    pub expires_in: i64,
}

/// The caller and their organization memberships.
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub organizations: Vec<OrganizationMembership>,
}

// ==================== Organizations ====================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub entity_type: EntityType,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrganizationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrganizationsResponse {
    pub organizations: Vec<OrganizationMembership>,
}

// ==================== Departments ====================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDepartmentRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDepartmentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListDepartmentsResponse {
    pub departments: Vec<DepartmentSummary>,
}

// ==================== Employees ====================

/// Query parameters for listing employees.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListEmployeesQuery {
    #[serde(default)]
    pub department_id: Option<Uuid>,
    /// invited, active or inactive.
    #[serde(default)]
    pub status: Option<String>,
    /// owner, admin or employee.
    #[serde(default)]
    pub role: Option<String>,
    /// Matches first name, last name or email.
    #[serde(default)]
    pub search: Option<String>,
    /// Maximum number of results (1..=100).
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Offset for pagination.
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListEmployeesResponse {
    pub employees: Vec<Employee>,
    /// Total matching employees (for pagination).
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEmployeeRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    /// Defaults to `employee`.
    #[serde(default)]
    pub role: Option<OrgRole>,
}

/// An invited employee and the one-time token to share with them.
#[derive(Debug, Serialize, ToSchema)]
pub struct InviteResponse {
    pub employee: Employee,
    /// Shown once; only its hash is stored.
    pub invite_token: String,
}

/// Partial employee update. `null` clears `job_title` and `department_id`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateEmployeeRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub job_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub department_id: Option<Option<Uuid>>,
    #[serde(default)]
    pub role: Option<OrgRole>,
    #[serde(default)]
    pub status: Option<EmployeeStatus>,
}

// ==================== Policies ====================

/// Query parameters for listing policies.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPoliciesQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub applies_to: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListPoliciesResponse {
    pub policies: Vec<Policy>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePolicyRequest {
    pub title: String,
    #[serde(default)]
    pub category: Option<PolicyCategory>,
    #[serde(default)]
    pub applies_to: Option<Applicability>,
    /// Markdown source.
    pub content: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePolicyRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<PolicyCategory>,
    #[serde(default)]
    pub applies_to: Option<Applicability>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<PolicyStatus>,
}

/// A policy with its content rendered to HTML.
#[derive(Debug, Serialize, ToSchema)]
pub struct PolicyResponse {
    #[serde(flatten)]
    pub policy: Policy,
    pub content_html: String,
}

// ==================== Markdown ====================

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkdownPreviewRequest {
    pub markdown: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkdownPreviewResponse {
    pub html: String,
}

// ==================== Policy Bundles ====================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBundleRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered policy IDs; repeats are dropped.
    #[serde(default)]
    pub policy_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBundleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Replaces the whole policy list when present.
    #[serde(default)]
    pub policy_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListBundlesResponse {
    pub bundles: Vec<BundleSummary>,
}

/// Who should receive a bundle. Targets are combined.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignBundleRequest {
    #[serde(default)]
    pub employee_ids: Vec<Uuid>,
    #[serde(default)]
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub all_employees: bool,
    /// Defaults to today plus the configured number of days.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignBundleResponse {
    pub created: usize,
    /// Targets that already hold an open assignment for the bundle.
    pub skipped: usize,
    pub assignments: Vec<Assignment>,
}

// ==================== Assignments ====================

/// Query parameters for listing assignments.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAssignmentsQuery {
    /// pending, viewed or attested.
    #[serde(default)]
    pub status: Option<String>,
    /// Ignored for non-admins.
    #[serde(default)]
    pub employee_id: Option<Uuid>,
    #[serde(default)]
    pub bundle_id: Option<Uuid>,
    #[serde(default)]
    pub overdue: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListAssignmentsResponse {
    pub assignments: Vec<AssignmentSummary>,
}

/// An assignment with the policies it asks the employee to read.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentDetailResponse {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub bundle_name: String,
    pub is_overdue: bool,
    pub policies: Vec<PolicyResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttestRequest {
    /// Typed signature, usually the employee's full name.
    pub signature: String,
    /// Must be `true`.
    #[serde(default)]
    pub acknowledged: bool,
}

// ==================== Incidents ====================

/// Query parameters for listing incidents.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListIncidentsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub incident_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListIncidentsResponse {
    pub incidents: Vec<Incident>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIncidentRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub incident_type: Option<IncidentType>,
    /// Defaults to `medium`.
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub phi_involved: bool,
    #[serde(default)]
    pub affected_individuals: Option<i64>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    /// Defaults to now.
    #[serde(default)]
    pub discovered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateIncidentRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub incident_type: Option<IncidentType>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub phi_involved: Option<bool>,
    #[serde(default)]
    pub affected_individuals: Option<i64>,
    #[serde(default)]
    pub status: Option<IncidentStatus>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
}

/// An incident with its breach notification deadline.
#[derive(Debug, Serialize, ToSchema)]
pub struct IncidentResponse {
    #[serde(flatten)]
    pub incident: Incident,
    /// Set when PHI is involved.
    pub notification_deadline: Option<DateTime<Utc>>,
}

// ==================== Training ====================

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateModuleRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Markdown source.
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub duration_minutes: i64,
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateModuleRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub required: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListModulesResponse {
    pub modules: Vec<TrainingModule>,
}

/// A training module with its content rendered to HTML.
#[derive(Debug, Serialize, ToSchema)]
pub struct ModuleResponse {
    #[serde(flatten)]
    pub module: TrainingModule,
    pub content_html: String,
}

/// Selects whose training records to read. Only admins may name another employee.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    #[serde(default)]
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressListResponse {
    pub employee_id: Uuid,
    pub modules: Vec<ModuleProgress>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProgressRequest {
    /// 0..=100.
    pub progress_percent: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainingSummaryResponse {
    pub employee_id: Uuid,
    #[serde(flatten)]
    pub summary: TrainingSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrainingReportResponse {
    pub employees: Vec<EmployeeTrainingRow>,
    /// Mean completion percentage across the listed employees.
    pub average_completion: i64,
}

// ==================== Audit Log ====================

/// Query parameters for the audit log.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogQuery {
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    pub events: Vec<AuditEvent>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_employee_distinguishes_null_from_absent() {
        let absent: UpdateEmployeeRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(absent.department_id.is_none());

        let cleared: UpdateEmployeeRequest =
            serde_json::from_str(r#"{"department_id": null}"#).unwrap();
        assert_eq!(cleared.department_id, Some(None));

        let id = Uuid::new_v4();
        let set: UpdateEmployeeRequest =
            serde_json::from_str(&format!(r#"{{"department_id": "{}"}}"#, id)).unwrap();
        assert_eq!(set.department_id, Some(Some(id)));
    }

    #[test]
    fn test_request_defaults() {
        let module: CreateModuleRequest = serde_json::from_str(r#"{"title": "HIPAA"}"#).unwrap();
        assert!(module.required);
        assert_eq!(module.duration_minutes, 0);

        let attest: AttestRequest = serde_json::from_str(r#"{"signature": "Sam"}"#).unwrap();
        assert!(!attest.acknowledged);

        let query: ListIncidentsQuery = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(query.limit, 50);
    }

    #[test]
    fn test_policy_response_flattens() {
        let policy = Policy::new(
            Uuid::new_v4(),
            "Privacy".to_string(),
            PolicyCategory::Privacy,
            Applicability::All,
            "**Be careful**".to_string(),
        );
        let value = serde_json::to_value(PolicyResponse {
            policy,
            content_html: "<p><strong>Be careful</strong></p>\n".to_string(),
        })
        .unwrap();
        assert_eq!(value["title"], "Privacy");
        assert_eq!(value["status"], "draft");
        assert!(value["content_html"].as_str().unwrap().contains("<strong>"));
    }
}
