//! Attestation assignments.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::api::handlers::{parse_param, record_audit};
use crate::api::types::{
    AssignmentDetailResponse, AttestRequest, ListAssignmentsQuery, ListAssignmentsResponse,
    PolicyResponse,
};
use crate::auth::OrgContext;
use crate::domain::{Assignment, AssignmentFilter, AssignmentStatus};
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

/// Load an assignment that belongs to the caller.
async fn own_assignment(
    state: &AppState,
    ctx: &OrgContext,
    id: Uuid,
) -> ComplianceResult<Assignment> {
    let assignment = state.repository.get_assignment(ctx.organization_id, id).await?;
    if assignment.employee_id != ctx.employee.id {
        return Err(ComplianceError::Forbidden(
            "Only the assigned employee can do this".to_string(),
        ));
    }
    Ok(assignment)
}

/// List assignments. Non-admins only see their own.
///
/// GET /api/assignments
#[utoipa::path(
    get,
    path = "/api/assignments",
    params(
        ListAssignmentsQuery,
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Assignments", body = ListAssignmentsResponse),
        (status = 400, description = "Invalid filter")
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn list_assignments(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<ListAssignmentsQuery>,
) -> ComplianceResult<Json<ListAssignmentsResponse>> {
    let filter = AssignmentFilter {
        status: parse_param::<AssignmentStatus>(query.status.as_deref())?,
        employee_id: if ctx.is_admin() {
            query.employee_id
        } else {
            Some(ctx.employee.id)
        },
        bundle_id: query.bundle_id,
        overdue: query.overdue,
    };

    let assignments = state
        .repository
        .list_assignments(ctx.organization_id, &filter, Utc::now().date_naive())
        .await?;

    Ok(Json(ListAssignmentsResponse { assignments }))
}

/// List the caller's assignments.
///
/// GET /api/assignments/mine
#[utoipa::path(
    get,
    path = "/api/assignments/mine",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "The caller's assignments", body = ListAssignmentsResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn my_assignments(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> ComplianceResult<Json<ListAssignmentsResponse>> {
    let filter = AssignmentFilter {
        employee_id: Some(ctx.employee.id),
        ..Default::default()
    };
    let assignments = state
        .repository
        .list_assignments(ctx.organization_id, &filter, Utc::now().date_naive())
        .await?;

    Ok(Json(ListAssignmentsResponse { assignments }))
}

/// Get an assignment with the policies to read.
///
/// GET /api/assignments/{id}
#[utoipa::path(
    get,
    path = "/api/assignments/{id}",
    params(
        ("id" = Uuid, Path, description = "Assignment ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Assignment", body = AssignmentDetailResponse),
        (status = 403, description = "Not the assignee or an admin"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn get_assignment(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<AssignmentDetailResponse>> {
    let assignment = state.repository.get_assignment(ctx.organization_id, id).await?;
    if !ctx.is_self_or_admin(assignment.employee_id) {
        return Err(ComplianceError::Forbidden(
            "You can only view your own assignments".to_string(),
        ));
    }

    let bundle = state
        .repository
        .get_bundle(ctx.organization_id, assignment.bundle_id)
        .await?;
    let policies = state
        .repository
        .get_bundle_policies(bundle.id)
        .await?
        .into_iter()
        .map(PolicyResponse::from)
        .collect();

    Ok(Json(AssignmentDetailResponse {
        is_overdue: assignment.is_overdue(Utc::now().date_naive()),
        assignment,
        bundle_name: bundle.name,
        policies,
    }))
}

/// Mark an assignment as viewed.
///
/// POST /api/assignments/{id}/view
#[utoipa::path(
    post,
    path = "/api/assignments/{id}/view",
    params(
        ("id" = Uuid, Path, description = "Assignment ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Current assignment state", body = Assignment),
        (status = 403, description = "Not the assignee"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn view_assignment(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<Assignment>> {
    let current = own_assignment(&state, &ctx, id).await?;
    let updated = state
        .repository
        .mark_assignment_viewed(ctx.organization_id, id, Utc::now())
        .await?;

    if current.status != updated.status {
        record_audit(
            &state,
            &ctx,
            "assignment.viewed",
            "assignment",
            id,
            serde_json::json!({ "bundle_id": updated.bundle_id }),
        )
        .await;
    }

    Ok(Json(updated))
}

/// Attest to an assignment.
///
/// POST /api/assignments/{id}/attest
#[utoipa::path(
    post,
    path = "/api/assignments/{id}/attest",
    params(
        ("id" = Uuid, Path, description = "Assignment ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = AttestRequest,
    responses(
        (status = 200, description = "Assignment attested", body = Assignment),
        (status = 400, description = "Not acknowledged, blank signature or already attested"),
        (status = 403, description = "Not the assignee"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn attest_assignment(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AttestRequest>,
) -> ComplianceResult<Json<Assignment>> {
    if !request.acknowledged {
        return Err(ComplianceError::BadRequest(
            "You must acknowledge the policies to attest".to_string(),
        ));
    }
    let signature = request.signature.trim();
    if signature.is_empty() {
        return Err(ComplianceError::BadRequest(
            "signature is required".to_string(),
        ));
    }

    own_assignment(&state, &ctx, id).await?;
    let attested = state
        .repository
        .attest_assignment(ctx.organization_id, id, signature, Utc::now())
        .await?;

    record_audit(
        &state,
        &ctx,
        "assignment.attested",
        "assignment",
        id,
        serde_json::json!({ "bundle_id": attested.bundle_id, "signature": signature }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        assignment_id = %id,
        employee_id = %ctx.employee.id,
        "Assignment attested"
    );

    Ok(Json(attested))
}

/// Revoke an assignment.
///
/// DELETE /api/assignments/{id}
#[utoipa::path(
    delete,
    path = "/api/assignments/{id}",
    params(
        ("id" = Uuid, Path, description = "Assignment ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 204, description = "Assignment revoked"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Assignment not found")
    ),
    security(("bearer_auth" = [])),
    tag = "assignments"
)]
pub async fn delete_assignment(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    ctx.require_admin()?;
    state
        .repository
        .delete_assignment(ctx.organization_id, id)
        .await?;

    record_audit(
        &state,
        &ctx,
        "assignment.revoked",
        "assignment",
        id,
        serde_json::json!({}),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        assignment_id = %id,
        "Assignment revoked"
    );

    Ok(StatusCode::NO_CONTENT)
}
