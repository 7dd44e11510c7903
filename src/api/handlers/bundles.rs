//! Policy bundles and bulk assignment.

use std::collections::HashSet;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::api::handlers::{optional_text, record_audit, required_text};
use crate::api::types::{
    AssignBundleRequest, AssignBundleResponse, CreateBundleRequest, ListBundlesResponse,
    UpdateBundleRequest,
};
use crate::auth::OrgContext;
use crate::domain::{dedup_preserving_order, Assignment, BundleDetails, Employee, PolicyBundle};
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

/// Reject policy IDs that are not in the caller's organization.
async fn ensure_policies_exist(
    state: &AppState,
    ctx: &OrgContext,
    policy_ids: &[Uuid],
) -> ComplianceResult<()> {
    let missing = state
        .repository
        .find_missing_policy_ids(ctx.organization_id, policy_ids)
        .await?;
    if !missing.is_empty() {
        let ids: Vec<String> = missing.iter().map(Uuid::to_string).collect();
        return Err(ComplianceError::BadRequest(format!(
            "Unknown policy IDs: {}",
            ids.join(", ")
        )));
    }
    Ok(())
}

/// Pick the employees an assignment request targets.
///
/// Explicit IDs must name assignable employees; department and all-employee
/// targets silently cover whoever currently qualifies.
fn resolve_targets(
    assignable: Vec<Employee>,
    request: &AssignBundleRequest,
) -> ComplianceResult<Vec<Employee>> {
    let known: HashSet<Uuid> = assignable.iter().map(|e| e.id).collect();
    if let Some(unknown) = request.employee_ids.iter().find(|id| !known.contains(id)) {
        return Err(ComplianceError::BadRequest(format!(
            "Employee {} is not an assignable member of this organization",
            unknown
        )));
    }

    let requested: HashSet<Uuid> = request.employee_ids.iter().copied().collect();
    Ok(assignable
        .into_iter()
        .filter(|e| {
            request.all_employees
                || requested.contains(&e.id)
                || (request.department_id.is_some() && e.department_id == request.department_id)
        })
        .collect())
}

/// List policy bundles.
///
/// GET /api/policy-bundles
#[utoipa::path(
    get,
    path = "/api/policy-bundles",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Bundles with policy and assignment counts", body = ListBundlesResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "policy-bundles"
)]
pub async fn list_bundles(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> ComplianceResult<Json<ListBundlesResponse>> {
    let bundles = state.repository.list_bundles(ctx.organization_id).await?;
    Ok(Json(ListBundlesResponse { bundles }))
}

/// Create a policy bundle.
///
/// POST /api/policy-bundles
#[utoipa::path(
    post,
    path = "/api/policy-bundles",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = CreateBundleRequest,
    responses(
        (status = 201, description = "Bundle created", body = BundleDetails),
        (status = 400, description = "Missing name or unknown policy"),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "policy-bundles"
)]
pub async fn create_bundle(
    State(state): State<AppState>,
    ctx: OrgContext,
    Json(request): Json<CreateBundleRequest>,
) -> ComplianceResult<(StatusCode, Json<BundleDetails>)> {
    ctx.require_admin()?;
    let name = required_text(&request.name, "name")?;

    let bundle = PolicyBundle::new(
        ctx.organization_id,
        name,
        optional_text(request.description),
        request.policy_ids,
    );
    ensure_policies_exist(&state, &ctx, &bundle.policy_ids).await?;
    state.repository.create_bundle(&bundle).await?;

    record_audit(
        &state,
        &ctx,
        "bundle.created",
        "policy_bundle",
        bundle.id,
        serde_json::json!({ "name": bundle.name, "policy_count": bundle.policy_ids.len() }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        bundle_id = %bundle.id,
        policies = bundle.policy_ids.len(),
        "Policy bundle created"
    );

    let policies = state.repository.get_bundle_policies(bundle.id).await?;
    Ok((StatusCode::CREATED, Json(BundleDetails { bundle, policies })))
}

/// Get a bundle with its policies in order.
///
/// GET /api/policy-bundles/{id}
#[utoipa::path(
    get,
    path = "/api/policy-bundles/{id}",
    params(
        ("id" = Uuid, Path, description = "Bundle ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Bundle", body = BundleDetails),
        (status = 404, description = "Bundle not found")
    ),
    security(("bearer_auth" = [])),
    tag = "policy-bundles"
)]
pub async fn get_bundle(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<BundleDetails>> {
    let bundle = state.repository.get_bundle(ctx.organization_id, id).await?;
    let policies = state.repository.get_bundle_policies(bundle.id).await?;
    Ok(Json(BundleDetails { bundle, policies }))
}

/// Update a bundle. A supplied policy list replaces the current one.
///
/// PATCH /api/policy-bundles/{id}
#[utoipa::path(
    patch,
    path = "/api/policy-bundles/{id}",
    params(
        ("id" = Uuid, Path, description = "Bundle ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = UpdateBundleRequest,
    responses(
        (status = 200, description = "Bundle updated", body = BundleDetails),
        (status = 400, description = "Blank name or unknown policy"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Bundle not found")
    ),
    security(("bearer_auth" = [])),
    tag = "policy-bundles"
)]
pub async fn update_bundle(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBundleRequest>,
) -> ComplianceResult<Json<BundleDetails>> {
    ctx.require_admin()?;
    let mut bundle = state.repository.get_bundle(ctx.organization_id, id).await?;

    if let Some(name) = request.name {
        bundle.name = required_text(&name, "name")?;
    }
    if let Some(description) = request.description {
        bundle.description = optional_text(Some(description));
    }
    if let Some(policy_ids) = request.policy_ids {
        let policy_ids = dedup_preserving_order(policy_ids);
        ensure_policies_exist(&state, &ctx, &policy_ids).await?;
        bundle.policy_ids = policy_ids;
    }

    bundle.updated_at = Utc::now();
    state.repository.update_bundle(&bundle).await?;

    record_audit(
        &state,
        &ctx,
        "bundle.updated",
        "policy_bundle",
        id,
        serde_json::json!({ "name": bundle.name, "policy_count": bundle.policy_ids.len() }),
    )
    .await;

    let policies = state.repository.get_bundle_policies(bundle.id).await?;
    Ok(Json(BundleDetails { bundle, policies }))
}

/// Delete a bundle and its assignments.
///
/// DELETE /api/policy-bundles/{id}
#[utoipa::path(
    delete,
    path = "/api/policy-bundles/{id}",
    params(
        ("id" = Uuid, Path, description = "Bundle ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 204, description = "Bundle deleted"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Bundle not found")
    ),
    security(("bearer_auth" = [])),
    tag = "policy-bundles"
)]
pub async fn delete_bundle(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    ctx.require_admin()?;
    state
        .repository
        .delete_bundle(ctx.organization_id, id)
        .await?;

    record_audit(
        &state,
        &ctx,
        "bundle.deleted",
        "policy_bundle",
        id,
        serde_json::json!({}),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        bundle_id = %id,
        "Policy bundle deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Assign a bundle to employees.
///
/// POST /api/policy-bundles/{id}/assign
#[utoipa::path(
    post,
    path = "/api/policy-bundles/{id}/assign",
    params(
        ("id" = Uuid, Path, description = "Bundle ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = AssignBundleRequest,
    responses(
        (status = 201, description = "Assignments created", body = AssignBundleResponse),
        (status = 400, description = "No target, empty bundle, past due date or unknown employee"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Bundle not found")
    ),
    security(("bearer_auth" = [])),
    tag = "policy-bundles"
)]
pub async fn assign_bundle(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignBundleRequest>,
) -> ComplianceResult<(StatusCode, Json<AssignBundleResponse>)> {
    ctx.require_admin()?;

    if request.employee_ids.is_empty() && request.department_id.is_none() && !request.all_employees
    {
        return Err(ComplianceError::BadRequest(
            "Provide employee_ids, department_id or all_employees".to_string(),
        ));
    }

    let bundle = state.repository.get_bundle(ctx.organization_id, id).await?;
    if bundle.policy_ids.is_empty() {
        return Err(ComplianceError::BadRequest(
            "Cannot assign a bundle with no policies".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    let due_date = request
        .due_date
        .unwrap_or(today + Duration::days(state.compliance.default_due_days));
    if due_date < today {
        return Err(ComplianceError::BadRequest(
            "due_date cannot be in the past".to_string(),
        ));
    }

    if let Some(department_id) = request.department_id {
        state
            .repository
            .get_department(ctx.organization_id, department_id)
            .await?;
    }

    let assignable = state
        .repository
        .list_assignable_employees(ctx.organization_id)
        .await?;
    let targets = resolve_targets(assignable, &request)?;
    let open = state
        .repository
        .open_assignment_employee_ids(ctx.organization_id, bundle.id)
        .await?;

    let (already_assigned, to_assign): (Vec<Employee>, Vec<Employee>) =
        targets.into_iter().partition(|e| open.contains(&e.id));

    let assignments: Vec<Assignment> = to_assign
        .iter()
        .map(|e| {
            Assignment::new(
                ctx.organization_id,
                bundle.id,
                e.id,
                Some(due_date),
                ctx.employee.id,
            )
        })
        .collect();
    state.repository.create_assignments(&assignments).await?;

    record_audit(
        &state,
        &ctx,
        "bundle.assigned",
        "policy_bundle",
        bundle.id,
        serde_json::json!({
            "created": assignments.len(),
            "skipped": already_assigned.len(),
            "due_date": due_date,
        }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        bundle_id = %bundle.id,
        created = assignments.len(),
        skipped = already_assigned.len(),
        "Policy bundle assigned"
    );

    Ok((
        StatusCode::CREATED,
        Json(AssignBundleResponse {
            created: assignments.len(),
            skipped: already_assigned.len(),
            assignments,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use crate::domain::OrgRole;

    use super::*;

    fn employee(organization_id: Uuid, email: &str, department_id: Option<Uuid>) -> Employee {
        let mut employee = Employee::invited(
            organization_id,
            email.to_string(),
            "Test".to_string(),
            "Person".to_string(),
            OrgRole::Employee,
        );
        employee.department_id = department_id;
        employee
    }

    fn request(employee_ids: Vec<Uuid>, department_id: Option<Uuid>, all: bool) -> AssignBundleRequest {
        AssignBundleRequest {
            employee_ids,
            department_id,
            all_employees: all,
            due_date: None,
        }
    }

    #[test]
    fn test_resolve_targets_combines_selectors() {
        let org = Uuid::new_v4();
        let nursing = Uuid::new_v4();
        let a = employee(org, "a@clinic.org", Some(nursing));
        let b = employee(org, "b@clinic.org", None);
        let c = employee(org, "c@clinic.org", None);
        let everyone = vec![a.clone(), b.clone(), c.clone()];

        let picked = resolve_targets(everyone.clone(), &request(vec![b.id], Some(nursing), false))
            .unwrap();
        let ids: Vec<Uuid> = picked.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        let picked = resolve_targets(everyone.clone(), &request(vec![], None, true)).unwrap();
        assert_eq!(picked.len(), 3);

        let picked = resolve_targets(everyone, &request(vec![], Some(Uuid::new_v4()), false))
            .unwrap();
        assert!(picked.is_empty());
    }

    #[test]
    fn test_resolve_targets_rejects_unknown_employee() {
        let org = Uuid::new_v4();
        let a = employee(org, "a@clinic.org", None);
        let result = resolve_targets(vec![a], &request(vec![Uuid::new_v4()], None, false));
        assert!(matches!(result, Err(ComplianceError::BadRequest(_))));
    }
}
