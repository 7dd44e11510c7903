//! Incident reporting.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::api::handlers::{optional_text, page, parse_param, record_audit, required_text};
use crate::api::types::{
    CreateIncidentRequest, IncidentResponse, ListIncidentsQuery, ListIncidentsResponse,
    UpdateIncidentRequest,
};
use crate::auth::OrgContext;
use crate::domain::{
    is_reasonable_timestamp, Incident, IncidentFilter, IncidentStatus, IncidentType, Severity,
};
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

fn respond(state: &AppState, incident: Incident) -> IncidentResponse {
    IncidentResponse {
        notification_deadline: incident
            .notification_deadline(state.compliance.breach_notification_days),
        incident,
    }
}

fn validate_affected(count: Option<i64>) -> ComplianceResult<()> {
    if count.is_some_and(|n| n < 0) {
        return Err(ComplianceError::BadRequest(
            "affected_individuals cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// Check the reported timeline: both timestamps within a plausible range,
/// discovery not in the future, occurrence not after discovery.
fn validate_timeline(
    discovered_at: DateTime<Utc>,
    occurred_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ComplianceResult<()> {
    if !is_reasonable_timestamp(discovered_at) || discovered_at > now {
        return Err(ComplianceError::BadRequest(
            "discovered_at must be a past date after 1900".to_string(),
        ));
    }
    if let Some(occurred_at) = occurred_at {
        if !is_reasonable_timestamp(occurred_at) {
            return Err(ComplianceError::BadRequest(
                "occurred_at must be a date after 1900".to_string(),
            ));
        }
        if occurred_at > discovered_at {
            return Err(ComplianceError::BadRequest(
                "occurred_at cannot be after discovered_at".to_string(),
            ));
        }
    }
    Ok(())
}

fn ensure_not_closed(incident: &Incident) -> ComplianceResult<()> {
    if incident.status == IncidentStatus::Closed {
        return Err(ComplianceError::BadRequest(
            "Closed incidents cannot be modified".to_string(),
        ));
    }
    Ok(())
}

/// Move an incident to `next`, maintaining the resolution fields.
fn change_status(
    incident: &mut Incident,
    next: IncidentStatus,
    now: DateTime<Utc>,
) -> ComplianceResult<()> {
    if !incident.status.can_transition_to(next) {
        return Err(ComplianceError::BadRequest(format!(
            "Cannot change incident status from {} to {}",
            incident.status, next
        )));
    }

    if next == IncidentStatus::Resolved {
        if incident.resolution_notes.is_none() {
            return Err(ComplianceError::BadRequest(
                "resolution_notes are required to resolve an incident".to_string(),
            ));
        }
        incident.resolved_at = Some(now);
    } else if incident.status == IncidentStatus::Resolved {
        incident.resolved_at = None;
    }

    incident.status = next;
    Ok(())
}

/// List incidents. Non-admins only see incidents they reported.
///
/// GET /api/incidents
#[utoipa::path(
    get,
    path = "/api/incidents",
    params(
        ListIncidentsQuery,
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Incidents", body = ListIncidentsResponse),
        (status = 400, description = "Invalid filter")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn list_incidents(
    State(state): State<AppState>,
    ctx: OrgContext,
    Query(query): Query<ListIncidentsQuery>,
) -> ComplianceResult<Json<ListIncidentsResponse>> {
    let (limit, offset) = page(query.limit, query.offset);
    let filter = IncidentFilter {
        status: parse_param::<IncidentStatus>(query.status.as_deref())?,
        severity: parse_param::<Severity>(query.severity.as_deref())?,
        incident_type: parse_param::<IncidentType>(query.incident_type.as_deref())?,
        reported_by: (!ctx.is_admin()).then_some(ctx.employee.id),
    };

    let (incidents, total) = state
        .repository
        .list_incidents(ctx.organization_id, &filter, limit, offset)
        .await?;

    Ok(Json(ListIncidentsResponse {
        incidents,
        total,
        limit,
        offset,
    }))
}

/// Report an incident.
///
/// POST /api/incidents
#[utoipa::path(
    post,
    path = "/api/incidents",
    params(
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = CreateIncidentRequest,
    responses(
        (status = 201, description = "Incident reported", body = IncidentResponse),
        (status = 400, description = "Invalid input")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn create_incident(
    State(state): State<AppState>,
    ctx: OrgContext,
    Json(request): Json<CreateIncidentRequest>,
) -> ComplianceResult<(StatusCode, Json<IncidentResponse>)> {
    let title = required_text(&request.title, "title")?;
    let description = required_text(&request.description, "description")?;
    validate_affected(request.affected_individuals)?;

    let mut incident = Incident::new(ctx.organization_id, ctx.employee.id, title, description);
    if let Some(incident_type) = request.incident_type {
        incident.incident_type = incident_type;
    }
    if let Some(severity) = request.severity {
        incident.severity = severity;
    }
    incident.phi_involved = request.phi_involved;
    incident.affected_individuals = request.affected_individuals;
    if let Some(discovered_at) = request.discovered_at {
        incident.discovered_at = discovered_at;
    }
    validate_timeline(incident.discovered_at, request.occurred_at, incident.created_at)?;
    incident.occurred_at = request.occurred_at;

    state.repository.create_incident(&incident).await?;

    record_audit(
        &state,
        &ctx,
        "incident.created",
        "incident",
        incident.id,
        serde_json::json!({
            "severity": incident.severity,
            "incident_type": incident.incident_type,
            "phi_involved": incident.phi_involved,
        }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        incident_id = %incident.id,
        severity = %incident.severity,
        phi_involved = incident.phi_involved,
        "Incident reported"
    );

    Ok((StatusCode::CREATED, Json(respond(&state, incident))))
}

/// Get an incident.
///
/// GET /api/incidents/{id}
#[utoipa::path(
    get,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 200, description = "Incident", body = IncidentResponse),
        (status = 403, description = "Not the reporter or an admin"),
        (status = 404, description = "Incident not found")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn get_incident(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<Json<IncidentResponse>> {
    let incident = state.repository.get_incident(ctx.organization_id, id).await?;
    if !ctx.is_self_or_admin(incident.reported_by) {
        return Err(ComplianceError::Forbidden(
            "You can only view incidents you reported".to_string(),
        ));
    }
    Ok(Json(respond(&state, incident)))
}

/// Update an incident.
///
/// PATCH /api/incidents/{id}
#[utoipa::path(
    patch,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    request_body = UpdateIncidentRequest,
    responses(
        (status = 200, description = "Incident updated", body = IncidentResponse),
        (status = 400, description = "Invalid field or status transition"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Incident not found")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn update_incident(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateIncidentRequest>,
) -> ComplianceResult<Json<IncidentResponse>> {
    ctx.require_admin()?;
    let mut incident = state.repository.get_incident(ctx.organization_id, id).await?;
    ensure_not_closed(&incident)?;
    let previous_status = incident.status;

    if let Some(title) = request.title {
        incident.title = required_text(&title, "title")?;
    }
    if let Some(description) = request.description {
        incident.description = required_text(&description, "description")?;
    }
    if let Some(incident_type) = request.incident_type {
        incident.incident_type = incident_type;
    }
    if let Some(severity) = request.severity {
        incident.severity = severity;
    }
    if let Some(phi_involved) = request.phi_involved {
        incident.phi_involved = phi_involved;
    }
    if request.affected_individuals.is_some() {
        validate_affected(request.affected_individuals)?;
        incident.affected_individuals = request.affected_individuals;
    }
    if let Some(notes) = optional_text(request.resolution_notes) {
        incident.resolution_notes = Some(notes);
    }

    let now = Utc::now();
    if let Some(status) = request.status.filter(|s| *s != previous_status) {
        change_status(&mut incident, status, now)?;
    }

    incident.updated_at = now;
    state.repository.update_incident(&incident).await?;

    record_audit(
        &state,
        &ctx,
        "incident.updated",
        "incident",
        id,
        serde_json::json!({
            "status": incident.status,
            "previous_status": previous_status,
            "severity": incident.severity,
        }),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        incident_id = %id,
        status = %incident.status,
        "Incident updated"
    );

    Ok(Json(respond(&state, incident)))
}

/// Delete an incident.
///
/// DELETE /api/incidents/{id}
#[utoipa::path(
    delete,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID"),
        ("X-Organization-Id" = Uuid, Header, description = "Organization scope")
    ),
    responses(
        (status = 204, description = "Incident deleted"),
        (status = 403, description = "Caller is not an owner or admin"),
        (status = 404, description = "Incident not found")
    ),
    security(("bearer_auth" = [])),
    tag = "incidents"
)]
pub async fn delete_incident(
    State(state): State<AppState>,
    ctx: OrgContext,
    Path(id): Path<Uuid>,
) -> ComplianceResult<StatusCode> {
    ctx.require_admin()?;
    state
        .repository
        .delete_incident(ctx.organization_id, id)
        .await?;

    record_audit(
        &state,
        &ctx,
        "incident.deleted",
        "incident",
        id,
        serde_json::json!({}),
    )
    .await;

    tracing::info!(
        organization_id = %ctx.organization_id,
        incident_id = %id,
        "Incident deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn incident() -> Incident {
        Incident::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Misdirected email".to_string(),
            "Lab results sent to the wrong patient".to_string(),
        )
    }

    #[test]
    fn test_resolving_requires_notes() {
        let mut incident = incident();
        let result = change_status(&mut incident, IncidentStatus::Resolved, Utc::now());
        assert!(matches!(result, Err(ComplianceError::BadRequest(_))));
        assert_eq!(incident.status, IncidentStatus::Open);

        incident.resolution_notes = Some("Recipient confirmed deletion".to_string());
        change_status(&mut incident, IncidentStatus::Resolved, Utc::now()).unwrap();
        assert_eq!(incident.status, IncidentStatus::Resolved);
        assert!(incident.resolved_at.is_some());
    }

    #[test]
    fn test_reopening_clears_resolved_at() {
        let mut incident = incident();
        incident.resolution_notes = Some("Fixed".to_string());
        change_status(&mut incident, IncidentStatus::Resolved, Utc::now()).unwrap();
        change_status(&mut incident, IncidentStatus::Investigating, Utc::now()).unwrap();
        assert!(incident.resolved_at.is_none());
    }

    #[test]
    fn test_closed_is_terminal() {
        let mut incident = incident();
        incident.resolution_notes = Some("Fixed".to_string());
        change_status(&mut incident, IncidentStatus::Resolved, Utc::now()).unwrap();
        change_status(&mut incident, IncidentStatus::Closed, Utc::now()).unwrap();
        assert!(change_status(&mut incident, IncidentStatus::Open, Utc::now()).is_err());
        assert!(change_status(&mut incident, IncidentStatus::Investigating, Utc::now()).is_err());
        assert!(matches!(
            ensure_not_closed(&incident),
            Err(ComplianceError::BadRequest(_))
        ));
    }

    #[test]
    fn test_timeline_bounds() {
        let now = Utc::now();
        let parse = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
        let far_future = Utc.with_ymd_and_hms(200_000, 1, 1, 0, 0, 0).unwrap();
        let discovered = parse("2026-03-01T09:00:00Z");

        assert!(validate_timeline(now, None, now).is_ok());
        assert!(validate_timeline(discovered, Some(parse("2026-02-27T18:00:00Z")), now).is_ok());
        assert!(validate_timeline(far_future, None, now).is_err());
        assert!(validate_timeline(now + chrono::Duration::days(1), None, now).is_err());
        assert!(validate_timeline(parse("1850-01-01T00:00:00Z"), None, now).is_err());
        assert!(validate_timeline(now, Some(parse("0001-01-01T00:00:00Z")), now).is_err());
        assert!(validate_timeline(discovered, Some(parse("2026-03-02T09:00:00Z")), now).is_err());
    }

    #[test]
    fn test_negative_affected_individuals_rejected() {
        assert!(validate_affected(Some(-1)).is_err());
        assert!(validate_affected(Some(0)).is_ok());
        assert!(validate_affected(None).is_ok());
    }
}
