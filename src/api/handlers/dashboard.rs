use axum::{extract::State, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::OrgContext;
use crate::domain::{ComplianceDashboard, EmployeeDashboard};
use crate::error::ComplianceResult;
use crate::AppState;

/// Organization compliance dashboard.
///
/// GET /api/dashboard
#[utoipa::path(
    get,
    path = "/api/dashboard",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Compliance metrics", body = ComplianceDashboard),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "dashboard"
)]
pub async fn compliance_dashboard(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> ComplianceResult<Json<ComplianceDashboard>> {
    ctx.require_admin()?;
    let dashboard = state
        .repository
        .compliance_dashboard(ctx.organization_id, Utc::now().date_naive())
        .await?;

    tracing::debug!(
        organization_id = %ctx.organization_id,
        compliance_score = dashboard.compliance_score,
        "Dashboard computed"
    );

    Ok(Json(dashboard))
}

/// The caller's personal dashboard.
///
/// GET /api/dashboard/me
#[utoipa::path(
    get,
    path = "/api/dashboard/me",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Personal compliance status", body = EmployeeDashboard)
    ),
    security(("bearer_auth" = [])),
    tag = "dashboard"
)]
pub async fn my_dashboard(
    State(state): State<AppState>,
    ctx: OrgContext,
) -> ComplianceResult<Json<EmployeeDashboard>> {
    let dashboard = state
        .repository
        .employee_dashboard(
            ctx.organization_id,
            ctx.employee.id,
            Utc::now().date_naive(),
        )
        .await?;
    Ok(Json(dashboard))
}
