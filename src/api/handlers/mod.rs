//! HTTP request handlers, one module per resource.

pub mod assignments;
pub mod audit;
pub mod auth;
pub mod bundles;
pub mod dashboard;
pub mod departments;
pub mod employees;
pub mod health;
pub mod incidents;
pub mod markdown;
pub mod organizations;
pub mod policies;
pub mod training;

use std::str::FromStr;

use uuid::Uuid;

use crate::auth::OrgContext;
use crate::domain::AuditEvent;
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

/// Largest page a list endpoint returns.
const MAX_PAGE_SIZE: i64 = 100;

/// Clamp client pagination to sane bounds.
pub(crate) fn page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_PAGE_SIZE), offset.max(0))
}

/// Parse an optional query-string enum value; blank means "no filter".
pub(crate) fn parse_param<T>(value: Option<&str>) -> ComplianceResult<Option<T>>
where
    T: FromStr<Err = String>,
{
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<T>().map_err(ComplianceError::BadRequest))
        .transpose()
}

/// Trim a required text field, rejecting blanks.
pub(crate) fn required_text(value: &str, field: &str) -> ComplianceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ComplianceError::BadRequest(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Trim optional text, treating blanks as absent.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Minimal shape check for email addresses.
pub(crate) fn validate_email(email: &str) -> ComplianceResult<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ComplianceError::BadRequest(
            "A valid email address is required".to_string(),
        )),
    }
}

/// Record an audit event for a change made by the caller.
///
/// The change has already been committed, so a failed write is logged rather
/// than returned.
pub(crate) async fn record_audit(
    state: &AppState,
    ctx: &OrgContext,
    action: &str,
    entity_type: &str,
    entity_id: Uuid,
    details: serde_json::Value,
) {
    let event = AuditEvent::new(
        ctx.organization_id,
        ctx.employee.id,
        action,
        entity_type,
        entity_id,
        Some(details),
    );
    write_audit(state, &event).await;
}

pub(crate) async fn write_audit(state: &AppState, event: &AuditEvent) {
    if let Err(e) = state.repository.record_audit_event(event).await {
        tracing::warn!(
            organization_id = %event.organization_id,
            action = %event.action,
            error = %e,
            "Failed to record audit event"
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::Severity;

    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(page(50, 0), (50, 0));
        assert_eq!(page(0, -5), (1, 0));
        assert_eq!(page(1000, 20), (100, 20));
    }

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param::<Severity>(Some("high")).unwrap(),
            Some(Severity::High)
        );
        assert_eq!(parse_param::<Severity>(Some("  ")).unwrap(), None);
        assert_eq!(parse_param::<Severity>(None).unwrap(), None);
        assert!(matches!(
            parse_param::<Severity>(Some("catastrophic")),
            Err(ComplianceError::BadRequest(_))
        ));
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(required_text("  Privacy ", "title").unwrap(), "Privacy");
        assert!(required_text("   ", "title").is_err());
        assert_eq!(optional_text(Some("  ".to_string())), None);
        assert_eq!(optional_text(Some(" IT ".to_string())), Some("IT".to_string()));
        assert_eq!(validate_email(" Nurse@Clinic.org ").unwrap(), "nurse@clinic.org");
        assert!(validate_email("nurse").is_err());
        assert!(validate_email("@clinic.org").is_err());
    }
}
