//! Employee directory and invitations.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::handlers::{
    optional_text, page, parse_param, record_audit, required_text, validate_email,
};
use crate::api::types::{
    CreateEmployeeRequest, InviteResponse, ListEmployeesQuery, ListEmployeesResponse,
    UpdateEmployeeRequest,
};
use crate::auth::{generate_invite_token, hash_invite_token, OrgContext};
use crate::domain::{Employee, EmployeeFilter, EmployeeStatus, OrgRole};
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

/// Resolve a department ID supplied by a client, reporting foreign IDs as bad input.
async fn ensure_department(
    state: &AppState,
    ctx: &OrgContext,
    department_id: Uuid,
) -> ComplianceResult<()> {
    match state
        .repository
        .get_department(ctx.organization_id, department_id)
        .await
    {
        Ok(_) => Ok(()),
        Err(ComplianceError::NotFound(_)) => Err(ComplianceError::BadRequest(format!(
            "Department {} does not belong to this organization",
            department_id
        ))),
        Err(e) => Err(e),
    }
}

/// Reject changes that would leave the organization without an active owner.
async fn ensure_other_owner(state: &AppState, ctx: &OrgContext) -> ComplianceResult<()> {
    if state
        .repository
        .count_active_owners(ctx.organization_id)
        .await?
        <= 1
    {
        return Err(ComplianceError::BadRequest(
            "The organization must keep at least one active owner".to_string(),
        ));
    }
    Ok(())
}

/// List employees.
///
/// GET /api/employees
#[utoipa::path(
    get,
    path = "/api/employees",
    params(
        ListEmployeesQuery,
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Employees", body = ListEmployeesResponse),
        (status = 400, description = "Invalid filter"),
        (status = 403, description = "Not a member")
    ),
    security(("bearer_auth" = [])),
    tag = "employees"
)]
pub async fn list_employees(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<ListEmployeesQuery>,
) -> ComplianceResult<Json<ListEmployeesResponse>> {
    let (limit, offset) = page(query.limit, query.offset);
    let filter = EmployeeFilter {
        department_id: query.department_id,
        status: parse_param::<EmployeeStatus>(query.status.as_deref())?,
        role: parse_param::<OrgRole>(query.role.as_deref())?,
        search: optional_text(query.search),
    };

    let (employees, total) = state
        .repository
        .list_employees(ctx.organization_id, &filter, limit, offset)
        .await?;

    Ok(Json(ListEmployeesResponse {
        employees,
        total,
        limit,
        offset,
    }))
}

/// Invite an employee.
///
/// POST /api/employees
#[utoipa::path(
    post,
    path = "/api/employees",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = CreateEmployeeRequest,
    responses(
        (status = 201, description = "Employee invited", body = InviteResponse),
        (status = 400, description = "Invalid input or duplicate email"),
        (status = 403, description = "Caller may not grant this role")
    ),
    security(("bearer_auth" = [])),
    tag = "employees"
)]
pub async fn create_employee(
    State(state): State<AppState>,
    ctx: OrgContext,
    Json(request): Json<CreateEmployeeRequest>,
) -> ComplianceResult<(StatusCode, Json<InviteResponse>)> {
    ctx.require_admin()?;

    let email = validate_email(&request.email)?;
    let first_name = required_text(&request.first_name, "first_name")?;
    let last_name = required_text(&request.last_name, "last_name")?;
    let role = request.role.unwrap_or_default();
    if role == OrgRole::Owner {
        ctx.require_owner()?;
    }
    if let Some(department_id) = request.department_id {
        ensure_department(&state, &ctx, department_id).await?;
    }
    if state
        .repository
        .find_employee_by_email(ctx.organization_id, &email)
        .await?
        .is_some()
    {
        return Err(ComplianceError::BadRequest(format!(
            "An employee with email {} already exists",
            email
        )));
    }

    let mut employee = Employee::invited(ctx.organization_id, email, first_name, last_name, role);
    employee.job_title = optional_text(request.job_title);
    employee.department_id = request.department_id;

    let invite_token = generate_invite_token();
    state
        .repository
        .create_employee(&employee, Some(&hash_invite_token(&invite_token)))
        .await?;

    record_audit(
        &state,
        &ctx,
        "employee.invited",
        "employee",
        employee.id,
        serde_json::json!({ "email": employee.email, "role": employee.role }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        employee_id = %employee.id,
        role = %employee.role,
        "Employee invited"
    );

    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            employee,
            invite_token,
        }),
    ))
}

/// Get an employee.
///
/// GET /api/employees/{id}
#[utoipa::path(
    get,
    path = "/api/employees/{id}",
    params(
        ("id" = Uuid, Path, description = "Employee ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Employee", body = Employee),
        (status = 403, description = "Not the employee or an admin"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "employees"
)]
pub async fn get_employee(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<Employee>> {
    if !ctx.is_self_or_admin(id) {
        return Err(ComplianceError::Forbidden(
            "You can only view your own employee record".to_string(),
        ));
    }
    let employee = state.repository.get_employee(ctx.organization_id, id).await?;
    Ok(Json(employee))
}

/// Update an employee.
///
/// PATCH /api/employees/{id}
#[utoipa::path(
    patch,
    path = "/api/employees/{id}",
    params(
        ("id" = Uuid, Path, description = "Employee ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = UpdateEmployeeRequest,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Invalid change"),
        (status = 403, description = "Caller may not make this change"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "employees"
)]
pub async fn update_employee(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> ComplianceResult<Json<Employee>> {
    ctx.require_admin()?;
    let mut employee = state.repository.get_employee(ctx.organization_id, id).await?;
    // Owners are only editable by other owners.
    if employee.role == OrgRole::Owner {
        ctx.require_owner()?;
    }
    let mut changed = Vec::new();

    if let Some(first_name) = request.first_name {
        employee.first_name = required_text(&first_name, "first_name")?;
        changed.push("first_name");
    }
    if let Some(last_name) = request.last_name {
        employee.last_name = required_text(&last_name, "last_name")?;
        changed.push("last_name");
    }
    if let Some(job_title) = request.job_title {
        employee.job_title = optional_text(job_title);
        changed.push("job_title");
    }
    if let Some(department_id) = request.department_id {
        if let Some(department_id) = department_id {
            ensure_department(&state, &ctx, department_id).await?;
        }
        employee.department_id = department_id;
        changed.push("department_id");
    }

    let was_active_owner =
        employee.role == OrgRole::Owner && employee.status == EmployeeStatus::Active;

    if let Some(role) = request.role.filter(|r| *r != employee.role) {
        if role == OrgRole::Owner || employee.role == OrgRole::Owner {
            ctx.require_owner()?;
        }
        employee.role = role;
        changed.push("role");
    }
    if let Some(status) = request.status.filter(|s| *s != employee.status) {
        match status {
            EmployeeStatus::Invited => {
                return Err(ComplianceError::BadRequest(
                    "Employees cannot be returned to invited status".to_string(),
                ));
            }
            EmployeeStatus::Active if employee.user_id.is_none() => {
                return Err(ComplianceError::BadRequest(
                    "Employee has not accepted their invitation".to_string(),
                ));
            }
            _ => {}
        }
        employee.status = status;
        changed.push("status");
    }

    let still_active_owner =
        employee.role == OrgRole::Owner && employee.status == EmployeeStatus::Active;
    if was_active_owner && !still_active_owner {
        ensure_other_owner(&state, &ctx).await?;
    }

    employee.updated_at = chrono::Utc::now();
    state.repository.update_employee(&employee).await?;

    record_audit(
        &state,
        &ctx,
        "employee.updated",
        "employee",
        id,
        serde_json::json!({ "fields": changed }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        employee_id = %id,
        fields = ?changed,
        "Employee updated"
    );

    Ok(Json(employee))
}

/// Remove an employee from the organization.
///
/// DELETE /api/employees/{id}
#[utoipa::path(
    delete,
    path = "/api/employees/{id}",
    params(
        ("id" = Uuid, Path, description = "Employee ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 204, description = "Employee removed"),
        (status = 400, description = "Cannot remove yourself or the last owner"),
        (status = 403, description = "Caller may not remove this employee"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "employees"
)]
pub async fn delete_employee(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    ctx.require_admin()?;
    if id == ctx.employee.id {
        return Err(ComplianceError::BadRequest(
            "You cannot remove yourself".to_string(),
        ));
    }

    let employee = state.repository.get_employee(ctx.organization_id, id).await?;
    if employee.role == OrgRole::Owner {
        ctx.require_owner()?;
        if employee.status == EmployeeStatus::Active {
            ensure_other_owner(&state, &ctx).await?;
        }
    }

    state
        .repository
        .delete_employee(ctx.organization_id, id)
        .await?;

    record_audit(
        &state,
        &ctx,
        "employee.removed",
        "employee",
        id,
        serde_json::json!({ "email": employee.email }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        employee_id = %id,
        "Employee removed"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Issue a fresh invitation token.
///
/// POST /api/employees/{id}/reinvite
#[utoipa::path(
    post,
    path = "/api/employees/{id}/reinvite",
    params(
        ("id" = Uuid, Path, description = "Employee ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "New invitation token", body = InviteResponse),
        (status = 400, description = "Employee is not in invited status"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "employees"
)]
pub async fn reinvite_employee(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<InviteResponse>> {
    ctx.require_admin()?;
    let employee = state.repository.get_employee(ctx.organization_id, id).await?;
    if employee.status != EmployeeStatus::Invited {
        return Err(ComplianceError::BadRequest(
            "Only invited employees can be re-invited".to_string(),
        ));
    }

    let invite_token = generate_invite_token();
    state
        .repository
        .set_invite_token_hash(ctx.organization_id, id, &hash_invite_token(&invite_token))
        .await?;

    record_audit(
        &state,
        &ctx,
        "employee.reinvited",
        "employee",
        id,
        serde_json::json!({ "email": employee.email }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        employee_id = %id,
        "Invitation reissued"
    );

    Ok(Json(InviteResponse {
        employee,
        invite_token,
    }))
}
