//! Policy documents.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::api::handlers::{parse_param, record_audit, required_text};
use crate::api::types::{
    CreatePolicyRequest, ListPoliciesQuery, ListPoliciesResponse, PolicyResponse,
    UpdatePolicyRequest,
};
use crate::auth::OrgContext;
use crate::domain::{Applicability, Policy, PolicyCategory, PolicyFilter, PolicyStatus};
use crate::error::{ComplianceError, ComplianceResult};
use crate::markdown::render_markdown;
use crate::AppState;

impl From<Policy> for PolicyResponse {
    fn from(policy: Policy) -> Self {
        let content_html = render_markdown(&policy.content);
        Self {
            policy,
            content_html,
        }
    }
}

/// List policies. Non-admins only see published policies.
///
/// GET /api/policies
#[utoipa::path(
    get,
    path = "/api/policies",
    params(
        ListPoliciesQuery,
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Policies", body = ListPoliciesResponse),
        (status = 400, description = "Invalid filter")
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn list_policies(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<ListPoliciesQuery>,
) -> ComplianceResult<Json<ListPoliciesResponse>> {
    let mut filter = PolicyFilter {
        category: parse_param::<PolicyCategory>(query.category.as_deref())?,
        status: parse_param::<PolicyStatus>(query.status.as_deref())?,
        applies_to: parse_param::<Applicability>(query.applies_to.as_deref())?,
    };

    if !ctx.is_admin() {
        match filter.status {
            None | Some(PolicyStatus::Published) => filter.status = Some(PolicyStatus::Published),
            Some(_) => {
                return Ok(Json(ListPoliciesResponse { policies: vec![] }));
            }
        }
    }

    let policies = state
        .repository
        .list_policies(ctx.organization_id, &filter)
        .await?;

    Ok(Json(ListPoliciesResponse { policies }))
}

/// Create a draft policy.
///
/// POST /api/policies
#[utoipa::path(
    post,
    path = "/api/policies",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = CreatePolicyRequest,
    responses(
        (status = 201, description = "Policy created", body = PolicyResponse),
        (status = 400, description = "Missing title or content"),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn create_policy(
    State(state): State<AppState>,
    ctx: OrgContext,
    Json(request): Json<CreatePolicyRequest>,
) -> ComplianceResult<(StatusCode, Json<PolicyResponse>)> {
    ctx.require_admin()?;
    let title = required_text(&request.title, "title")?;
    if request.content.trim().is_empty() {
        return Err(ComplianceError::BadRequest("content is required".to_string()));
    }

    let policy = Policy::new(
        ctx.organization_id,
        title,
        request.category.unwrap_or_default(),
        request.applies_to.unwrap_or_default(),
        request.content,
    );
    state.repository.create_policy(&policy).await?;

    record_audit(
        &state,
        &ctx,
        "policy.created",
        "policy",
        policy.id,
        serde_json::json!({ "title": policy.title }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        policy_id = %policy.id,
        category = %policy.category,
        "Policy created"
    );

    Ok((StatusCode::CREATED, Json(policy.into())))
}

/// Get a policy with rendered content.
///
/// GET /api/policies/{id}
#[utoipa::path(
    get,
    path = "/api/policies/{id}",
    params(
        ("id" = Uuid, Path, description = "Policy ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Policy", body = PolicyResponse),
        (status = 404, description = "Policy not found")
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn get_policy(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<PolicyResponse>> {
    let policy = state.repository.get_policy(ctx.organization_id, id).await?;
    if !ctx.is_admin() && policy.status != PolicyStatus::Published {
        return Err(ComplianceError::NotFound(format!("Policy {} not found", id)));
    }
    Ok(Json(policy.into()))
}

/// Update a policy.
///
/// PATCH /api/policies/{id}
#[utoipa::path(
    patch,
    path = "/api/policies/{id}",
    params(
        ("id" = Uuid, Path, description = "Policy ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = UpdatePolicyRequest,
    responses(
        (status = 200, description = "Policy updated", body = PolicyResponse),
        (status = 400, description = "Invalid field or status transition"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Policy not found")
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn update_policy(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdatePolicyRequest>,
) -> ComplianceResult<Json<PolicyResponse>> {
    ctx.require_admin()?;
    let mut policy = state.repository.get_policy(ctx.organization_id, id).await?;
    let previous_status = policy.status;

    if let Some(title) = request.title {
        policy.title = required_text(&title, "title")?;
    }
    if let Some(category) = request.category {
        policy.category = category;
    }
    if let Some(applies_to) = request.applies_to {
        policy.applies_to = applies_to;
    }
    if let Some(content) = request.content {
        if content.trim().is_empty() {
            return Err(ComplianceError::BadRequest("content is required".to_string()));
        }
        if content != policy.content {
            if previous_status == PolicyStatus::Published {
                policy.version += 1;
            }
            policy.content = content;
        }
    }
    if let Some(status) = request.status.filter(|s| *s != previous_status) {
        if !previous_status.can_transition_to(status) {
            return Err(ComplianceError::BadRequest(format!(
                "Cannot change policy status from {} to {}",
                previous_status, status
            )));
        }
        policy.status = status;
    }

    policy.updated_at = chrono::Utc::now();
    state.repository.update_policy(&policy).await?;

    record_audit(
        &state,
        &ctx,
        "policy.updated",
        "policy",
        id,
        serde_json::json!({
            "status": policy.status,
            "previous_status": previous_status,
            "version": policy.version,
        }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        policy_id = %id,
        status = %policy.status,
        version = policy.version,
        "Policy updated"
    );

    Ok(Json(policy.into()))
}

/// Delete a policy. It is removed from every bundle.
///
/// DELETE /api/policies/{id}
#[utoipa::path(
    delete,
    path = "/api/policies/{id}",
    params(
        ("id" = Uuid, Path, description = "Policy ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 204, description = "Policy deleted"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Policy not found")
    ),
    security(("bearer_auth" = [])),
    tag = "policies"
)]
pub async fn delete_policy(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    ctx.require_admin()?;
    state
        .repository
        .delete_policy(ctx.organization_id, id)
        .await?;

    record_audit(
        &state,
        &ctx,
        "policy.deleted",
        "policy",
        id,
        serde_json::json!({}),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        policy_id = %id,
        "Policy deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
