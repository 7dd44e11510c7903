//! Training modules and progress tracking.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use crate::api::handlers::{optional_text, record_audit, required_text};
use crate::api::types::{
    CreateModuleRequest, EmployeeQuery, ListModulesResponse, ModuleResponse,
    ProgressListResponse, TrainingReportResponse, TrainingSummaryResponse, UpdateModuleRequest,
    UpdateProgressRequest,
};
use crate::auth::OrgContext;
use crate::domain::{percentage, TrainingModule, TrainingProgress, TrainingStatus};
use crate::error::{ComplianceError, ComplianceResult};
use crate::markdown::render_markdown;
use crate::AppState;

impl From<TrainingModule> for ModuleResponse {
    fn from(module: TrainingModule) -> Self {
        let content_html = render_markdown(&module.content);
        Self {
            module,
            content_html,
        }
    }
}

fn validate_duration(minutes: i64) -> ComplianceResult<()> {
    if minutes < 0 {
        return Err(ComplianceError::BadRequest(
            "duration_minutes cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Whose records a request reads: the caller, or any employee for admins.
async fn target_employee(
    state: &AppState,
    ctx: &OrgContext,
    requested: Option<Uuid>,
) -> ComplianceResult<Uuid> {
    match requested {
        None => Ok(ctx.employee.id),
        Some(id) if id == ctx.employee.id => Ok(id),
        Some(id) => {
            if !ctx.is_admin() {
                return Err(ComplianceError::Forbidden(
                    "You can only view your own training records".to_string(),
                ));
            }
            state.repository.get_employee(ctx.organization_id, id).await?;
            Ok(id)
        }
    }
}

/// List training modules.
///
/// GET /api/training/modules
#[utoipa::path(
    get,
    path = "/api/training/modules",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Training modules", body = ListModulesResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn list_modules(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> ComplianceResult<Json<ListModulesResponse>> {
    let modules = state
        .repository
        .list_training_modules(ctx.organization_id)
        .await?;
    Ok(Json(ListModulesResponse { modules }))
}

/// Create a training module.
///
/// POST /api/training/modules
#[utoipa::path(
    post,
    path = "/api/training/modules",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = CreateModuleRequest,
    responses(
        (status = 201, description = "Module created", body = ModuleResponse),
        (status = 400, description = "Missing title or negative duration"),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn create_module(
    State(state): State<AppState>,
    ctx: OrgContext,
    Json(request): Json<CreateModuleRequest>,
) -> ComplianceResult<(StatusCode, Json<ModuleResponse>)> {
    ctx.require_admin()?;
    let title = required_text(&request.title, "title")?;
    validate_duration(request.duration_minutes)?;

    let module = TrainingModule::new(
        ctx.organization_id,
        title,
        optional_text(request.description),
        request.content,
        request.duration_minutes,
        request.required,
    );
    state.repository.create_training_module(&module).await?;

    record_audit(
        &state,
        &ctx,
        "training_module.created",
        "training_module",
        module.id,
        serde_json::json!({ "title": module.title, "required": module.required }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        module_id = %module.id,
        "Training module created"
    );

    Ok((StatusCode::CREATED, Json(module.into())))
}

/// Get a training module with rendered content.
///
/// GET /api/training/modules/{id}
#[utoipa::path(
    get,
    path = "/api/training/modules/{id}",
    params(
        ("id" = Uuid, Path, description = "Module ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Training module", body = ModuleResponse),
        (status = 404, description = "Module not found")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn get_module(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<ModuleResponse>> {
    let module = state
        .repository
        .get_training_module(ctx.organization_id, id)
        .await?;
    Ok(Json(module.into()))
}

/// Update a training module.
///
/// PATCH /api/training/modules/{id}
#[utoipa::path(
    patch,
    path = "/api/training/modules/{id}",
    params(
        ("id" = Uuid, Path, description = "Module ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = UpdateModuleRequest,
    responses(
        (status = 200, description = "Module updated", body = ModuleResponse),
        (status = 400, description = "Blank title or negative duration"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Module not found")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn update_module(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateModuleRequest>,
) -> ComplianceResult<Json<ModuleResponse>> {
    ctx.require_admin()?;
    let mut module = state
        .repository
        .get_training_module(ctx.organization_id, id)
        .await?;

    if let Some(title) = request.title {
        module.title = required_text(&title, "title")?;
    }
    if let Some(description) = request.description {
        module.description = optional_text(Some(description));
    }
    if let Some(content) = request.content {
        module.content = content;
    }
    if let Some(minutes) = request.duration_minutes {
        validate_duration(minutes)?;
        module.duration_minutes = minutes;
    }
    if let Some(required) = request.required {
        module.required = required;
    }

    module.updated_at = Utc::now();
    state.repository.update_training_module(&module).await?;

    record_audit(
        &state,
        &ctx,
        "training_module.updated",
        "training_module",
        id,
        serde_json::json!({ "title": module.title }),
    )
    .await;

    Ok(Json(module.into()))
}

/// Delete a training module and its progress records.
///
/// DELETE /api/training/modules/{id}
#[utoipa::path(
    delete,
    path = "/api/training/modules/{id}",
    params(
        ("id" = Uuid, Path, description = "Module ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 204, description = "Module deleted"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Module not found")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn delete_module(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    ctx.require_admin()?;
    state
        .repository
        .delete_training_module(ctx.organization_id, id)
        .await?;

    record_audit(
        &state,
        &ctx,
        "training_module.deleted",
        "training_module",
        id,
        serde_json::json!({}),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        module_id = %id,
        "Training module deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Per-module progress for the caller or, for admins, another employee.
///
/// GET /api/training/progress
#[utoipa::path(
    get,
    path = "/api/training/progress",
    params(
        EmployeeQuery,
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Progress per module", body = ProgressListResponse),
        (status = 403, description = "Non-admin asked for another employee")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn list_progress(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<EmployeeQuery>,
) -> ComplianceResult<Json<ProgressListResponse>> {
    let employee_id = target_employee(&state, &ctx, query.employee_id).await?;
    let modules = state
        .repository
        .list_module_progress(ctx.organization_id, employee_id)
        .await?;

    Ok(Json(ProgressListResponse {
        employee_id,
        modules,
    }))
}

/// Report the caller's progress on a module.
///
/// PUT /api/training/progress/{module_id}
#[utoipa::path(
    put,
    path = "/api/training/progress/{module_id}",
    params(
        ("module_id" = Uuid, Path, description = "Module ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = UpdateProgressRequest,
    responses(
        (status = 200, description = "Progress recorded", body = TrainingProgress),
        (status = 400, description = "Percentage outside 0..=100"),
        (status = 404, description = "Module not found")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn update_progress(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(module_id): Path<Uuid>,
    Json(request): Json<UpdateProgressRequest>,
) -> ComplianceResult<Json<TrainingProgress>> {
    if !(0..=100).contains(&request.progress_percent) {
        return Err(ComplianceError::BadRequest(
            "progress_percent must be between 0 and 100".to_string(),
        ));
    }
    state
        .repository
        .get_training_module(ctx.organization_id, module_id)
        .await?;

    let mut progress = state
        .repository
        .get_training_progress(ctx.employee.id, module_id)
        .await?
        .unwrap_or_else(|| TrainingProgress::new(ctx.organization_id, ctx.employee.id, module_id));
    let previous = progress.status;

    progress.apply_progress(request.progress_percent, Utc::now());
    let progress = state.repository.save_training_progress(&progress).await?;

    if progress.status != previous {
        let action = if progress.status == TrainingStatus::Completed {
            "training.completed"
        } else {
            "training.progressed"
        };
        record_audit(
            &state,
            &ctx,
            action,
            "training_module",
            module_id,
            serde_json::json!({ "progress_percent": progress.progress_percent }),
        )
        .await;
    }

    tracing::info!(
        organization_id = %ctx.organization_id,
        employee_id = %ctx.employee.id,
        module_id = %module_id,
        progress_percent = progress.progress_percent,
        status = %progress.status,
        "Training progress recorded"
    );

    Ok(Json(progress))
}

/// Training summary for the caller or, for admins, another employee.
///
/// GET /api/training/summary
#[utoipa::path(
    get,
    path = "/api/training/summary",
    params(
        EmployeeQuery,
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Training summary", body = TrainingSummaryResponse),
        (status = 403, description = "Non-admin asked for another employee")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn training_summary(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<EmployeeQuery>,
) -> ComplianceResult<Json<TrainingSummaryResponse>> {
    let employee_id = target_employee(&state, &ctx, query.employee_id).await?;
    let summary = state
        .repository
        .training_summary(ctx.organization_id, employee_id)
        .await?;

    Ok(Json(TrainingSummaryResponse {
        employee_id,
        summary,
    }))
}

/// Organization-wide training report.
///
/// GET /api/training/report
#[utoipa::path(
    get,
    path = "/api/training/report",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "One row per active employee", body = TrainingReportResponse),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "training"
)]
pub async fn training_report(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> ComplianceResult<Json<TrainingReportResponse>> {
    ctx.require_admin()?;
    let employees = state
        .repository
        .training_report(ctx.organization_id)
        .await?;

    let total: i64 = employees
        .iter()
        .map(|row| row.summary.completion_percentage)
        .sum();
    let average_completion = percentage(total, employees.len() as i64 * 100);

    Ok(Json(TrainingReportResponse {
        employees,
        average_completion,
    }))
}
