use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::handlers::{optional_text, record_audit, required_text};
use crate::api::types::{
    CreateDepartmentRequest, ListDepartmentsResponse, UpdateDepartmentRequest,
};
use crate::auth::OrgContext;
use crate::domain::Department;
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

async fn ensure_name_available(
    state: &AppState,
    ctx: &OrgContext,
    name: &str,
    current: Option<Uuid>,
) -> ComplianceResult<()> {
    match state
        .repository
        .find_department_by_name(ctx.organization_id, name)
        .await?
    {
        Some(existing) if Some(existing.id) != current => Err(ComplianceError::BadRequest(
            format!("Department '{}' already exists", name),
        )),
        _ => Ok(()),
    }
}

/// List departments with employee counts.
///
/// GET /api/departments
#[utoipa::path(
    get,
    path = "/api/departments",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Departments", body = ListDepartmentsResponse),
        (status = 403, description = "Not a member")
    ),
    security(("bearer_auth" = [])),
    tag = "departments"
)]
pub async fn list_departments(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> ComplianceResult<Json<ListDepartmentsResponse>> {
    let departments = state
        .repository
        .list_departments(ctx.organization_id)
        .await?;
    Ok(Json(ListDepartmentsResponse { departments }))
}

/// Create a department.
///
/// POST /api/departments
#[utoipa::path(
    post,
    path = "/api/departments",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = CreateDepartmentRequest,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 400, description = "Missing or duplicate name"),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "departments"
)]
pub async fn create_department(
    State(state): State<AppState>,
    ctx: OrgContext,
    Json(request): Json<CreateDepartmentRequest>,
) -> ComplianceResult<(StatusCode, Json<Department>)> {
    ctx.require_admin()?;
    let name = required_text(&request.name, "name")?;
    ensure_name_available(&state, &ctx, &name, None).await?;

    let department = Department::new(
        ctx.organization_id,
        name,
        optional_text(request.description),
    );
    state.repository.create_department(&department).await?;

    record_audit(
        &state,
        &ctx,
        "department.created",
        "department",
        department.id,
        serde_json::json!({ "name": department.name }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        department_id = %department.id,
        "Department created"
    );

    Ok((StatusCode::CREATED, Json(department)))
}

/// Update a department.
///
/// PATCH /api/departments/{id}
#[utoipa::path(
    patch,
    path = "/api/departments/{id}",
    params(
        ("id" = Uuid, Path, description = "Department ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = UpdateDepartmentRequest,
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 400, description = "Blank or duplicate name"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "departments"
)]
pub async fn update_department(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDepartmentRequest>,
) -> ComplianceResult<Json<Department>> {
    ctx.require_admin()?;
    let mut department = state
        .repository
        .get_department(ctx.organization_id, id)
        .await?;

    if let Some(name) = request.name {
        let name = required_text(&name, "name")?;
        ensure_name_available(&state, &ctx, &name, Some(id)).await?;
        department.name = name;
    }
    if let Some(description) = request.description {
        department.description = optional_text(Some(description));
    }
    department.updated_at = chrono::Utc::now();
    state.repository.update_department(&department).await?;

    record_audit(
        &state,
        &ctx,
        "department.updated",
        "department",
        id,
        serde_json::json!({ "name": department.name }),
    )
    .await;

    Ok(Json(department))
}

/// Delete a department. Its employees are left without a department.
///
/// DELETE /api/departments/{id}
#[utoipa::path(
    delete,
    path = "/api/departments/{id}",
    params(
        ("id" = Uuid, Path, description = "Department ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 204, description = "Department deleted"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Department not found")
    ),
    security(("bearer_auth" = [])),
    tag = "departments"
)]
pub async fn delete_department(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    ctx.require_admin()?;
    state
        .repository
        .delete_department(ctx.organization_id, id)
        .await?;

    record_audit(
        &state,
        &ctx,
        "department.deleted",
        "department",
        id,
        serde_json::json!({}),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        department_id = %id,
        "Department deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
