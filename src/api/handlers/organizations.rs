//! Organization endpoints.
//!
//! These routes address the organization by path rather than by the
//! `X-Organization-Id` header, so membership is resolved here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use crate::api::handlers::{optional_text, record_audit, required_text};
use crate::api::types::{
    CreateOrganizationRequest, ListOrganizationsResponse, UpdateOrganizationRequest,
};
use crate::auth::{Claims, OrgContext};
use crate::domain::{Employee, EmployeeStatus, OrgRole, Organization};
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

/// The caller's active membership in the organization named by the path.
async fn membership(
    state: &AppState,
    claims: &Claims,
    organization_id: Uuid,
) -> ComplianceResult<OrgContext> {
    let employee = state
        .repository
        .find_employee_by_user(organization_id, claims.user_id()?)
        .await?
        .filter(|e| e.status == EmployeeStatus::Active)
        .ok_or_else(|| {
            ComplianceError::Forbidden("Not a member of this organization".to_string())
        })?;

    Ok(OrgContext {
        organization_id,
        employee,
    })
}

/// Derive a slug from the name and reject it when another organization owns it.
async fn available_slug(
    state: &AppState,
    name: &str,
    current: Option<Uuid>,
) -> ComplianceResult<String> {
    let slug = Organization::slugify(name);
    if slug.is_empty() {
        return Err(ComplianceError::BadRequest(
            "Organization name must contain letters or digits".to_string(),
        ));
    }

    match state.repository.get_organization_by_slug(&slug).await? {
        Some(existing) if Some(existing.id) != current => Err(ComplianceError::BadRequest(
            format!("An organization with slug '{}' already exists", slug),
        )),
        _ => Ok(slug),
    }
}

/// Create an organization owned by the caller.
///
/// POST /api/organizations
#[utoipa::path(
    post,
    path = "/api/organizations",
    request_body = CreateOrganizationRequest,
    responses(
        (status = 201, description = "Organization created", body = Organization),
        (status = 400, description = "Missing name or duplicate slug"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "organizations"
)]
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(request): Json<CreateOrganizationRequest>,
) -> ComplianceResult<(StatusCode, Json<Organization>)> {
    let name = required_text(&request.name, "name")?;
    available_slug(&state, &name, None).await?;

    let user = state.repository.get_user(claims.user_id()?).await?;
    let organization = Organization::new(
        name,
        request.entity_type,
        optional_text(request.description),
    );
    let owner = Employee::active_for_user(
        organization.id,
        user.id,
        user.email.clone(),
        user.name.as_deref(),
        OrgRole::Owner,
    );
    state
        .repository
        .create_organization(&organization, &owner)
        .await?;

    let ctx = OrgContext {
        organization_id: organization.id,
        employee: owner,
    };
    record_audit(
        &state,
        &ctx,
        "organization.created",
        "organization",
        organization.id,
        serde_json::json!({ "name": organization.name, "slug": organization.slug }),
    )
    .await;

    tracing::info!(
        organization_id = %organization.id,
        user_id = %user.id,
        slug = %organization.slug,
        "Organization created"
    );

    Ok((StatusCode::CREATED, Json(organization)))
}

/// List the caller's organizations.
///
/// GET /api/organizations
#[utoipa::path(
    get,
    path = "/api/organizations",
    responses(
        (status = 200, description = "Organizations the caller belongs to", body = ListOrganizationsResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "organizations"
)]
pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ComplianceResult<Json<ListOrganizationsResponse>> {
    let organizations = state
        .repository
        .get_user_memberships(claims.user_id()?)
        .await?;

    Ok(Json(ListOrganizationsResponse { organizations }))
}

/// Get an organization.
///
/// GET /api/organizations/{id}
#[utoipa::path(
    get,
    path = "/api/organizations/{id}",
    params(
        ("id" = Uuid, Path, description = "Organization ID")
    ),
    responses(
        (status = 200, description = "Organization details", body = Organization),
        (status = 403, description = "Not a member"),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_auth" = [])),
    tag = "organizations"
)]
pub async fn get_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<Organization>> {
    membership(&state, &claims, id).await?;
    let organization = state.repository.get_organization(id).await?;
    Ok(Json(organization))
}

/// Update an organization.
///
/// PATCH /api/organizations/{id}
#[utoipa::path(
    patch,
    path = "/api/organizations/{id}",
    params(
        ("id" = Uuid, Path, description = "Organization ID")
    ),
    request_body = UpdateOrganizationRequest,
    responses(
        (status = 200, description = "Organization updated", body = Organization),
        (status = 400, description = "Invalid name or duplicate slug"),
        (status = 403, description = "Caller is not an owner or admin")
    ),
    security(("bearer_auth" = [])),
    tag = "organizations"
)]
pub async fn update_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrganizationRequest>,
) -> ComplianceResult<Json<Organization>> {
    let ctx = membership(&state, &claims, id).await?;
    ctx.require_admin()?;

    let mut organization = state.repository.get_organization(id).await?;
    let mut changed = Vec::new();

    if let Some(name) = request.name {
        let name = required_text(&name, "name")?;
        organization.slug = available_slug(&state, &name, Some(id)).await?;
        organization.name = name;
        changed.push("name");
    }
    if let Some(entity_type) = request.entity_type {
        organization.entity_type = entity_type;
        changed.push("entity_type");
    }
    if let Some(description) = request.description {
        organization.description = optional_text(Some(description));
        changed.push("description");
    }

    organization.updated_at = chrono::Utc::now();
    state.repository.update_organization(&organization).await?;

    record_audit(
        &state,
        &ctx,
        "organization.updated",
        "organization",
        id,
        serde_json::json!({ "fields": changed }),
    )
    .await;

    tracing::info!(organization_id = %id, "Organization updated");

    Ok(Json(organization))
}

/// Delete an organization and everything it owns.
///
/// DELETE /api/organizations/{id}
#[utoipa::path(
    delete,
    path = "/api/organizations/{id}",
    params(
        ("id" = Uuid, Path, description = "Organization ID")
    ),
    responses(
        (status = 204, description = "Organization deleted"),
        (status = 403, description = "Caller is not an owner"),
        (status = 404, description = "Organization not found")
    ),
    security(("bearer_auth" = [])),
    tag = "organizations"
)]
pub async fn delete_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    let ctx = membership(&state, &claims, id).await?;
    ctx.require_owner()?;

    state.repository.delete_organization(id).await?;

    tracing::info!(
        organization_id = %id,
        employee_id = %ctx.employee.id,
        "Organization deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
