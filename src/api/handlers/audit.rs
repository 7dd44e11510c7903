use axum::{
    extract::{Query, State},
    Json,
};
use uuid::Uuid;

use crate::api::handlers::{optional_text, page};
use crate::api::types::{AuditLogQuery, AuditLogResponse};
use crate::auth::OrgContext;
use crate::error::ComplianceResult;
use crate::AppState;

/// Read the organization's audit log, newest first.
///
/// GET /api/audit-log
#[utoipa::path(
    get,
    path = "/api/audit-log",
    params(
        AuditLogQuery,
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "audit"
)]
pub async fn list_audit_log(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<AuditLogQuery>,
) -> ComplianceResult<Json<AuditLogResponse>> {
    ctx.require_admin()?;
    let (limit, offset) = page(query.limit, query.offset);
    let entity_type = optional_text(query.entity_type);

    let (events, total) = state
        .repository
        .list_audit_events(ctx.organization_id, entity_type.as_deref(), limit, offset)
        .await?;

    Ok(Json(AuditLogResponse {
        events,
        total,
        limit,
        offset,
    }))
}
