//! Organization scoping for tenant-owned routes.
//!
//! Requests name their organization in the `X-Organization-Id` header. The
//! [`OrgContext`] extractor resolves the caller's employee record in that
//! organization; every org-owned query is then filtered by its
//! `organization_id`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::auth::Claims;
use crate::domain::{Employee, EmployeeStatus, OrgRole};
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

/// Header naming the organization a request acts on.
pub const ORGANIZATION_HEADER: &str = "X-Organization-Id";

/// The caller's active membership in the requested organization.
#[derive(Debug, Clone)]
pub struct OrgContext {
    pub organization_id: Uuid,
    /// The caller's employee record.
    pub employee: Employee,
}

impl OrgContext {
    pub fn is_admin(&self) -> bool {
        self.employee.role.is_admin()
    }

    pub fn is_owner(&self) -> bool {
        self.employee.role == OrgRole::Owner
    }

    /// Reject callers who are not owners or admins.
    pub fn require_admin(&self) -> ComplianceResult<()> {
        if !self.is_admin() {
            return Err(ComplianceError::Forbidden(
                "Only owners and admins can perform this action".to_string(),
            ));
        }
        Ok(())
    }

    /// Reject callers who are not owners.
    pub fn require_owner(&self) -> ComplianceResult<()> {
        if !self.is_owner() {
            return Err(ComplianceError::Forbidden(
                "Only owners can perform this action".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the caller may act on the given employee's personal records.
    pub fn is_self_or_admin(&self, employee_id: Uuid) -> bool {
        self.employee.id == employee_id || self.is_admin()
    }
}

/// Parse the organization header value.
pub fn parse_organization_header(value: Option<&str>) -> ComplianceResult<Uuid> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty()).ok_or_else(|| {
        ComplianceError::BadRequest(format!("Missing {} header", ORGANIZATION_HEADER))
    })?;
    Uuid::parse_str(raw).map_err(|_| {
        ComplianceError::BadRequest(format!("{} must be a UUID", ORGANIZATION_HEADER))
    })
}

impl FromRequestParts<AppState> for OrgContext {
    type Rejection = ComplianceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .ok_or_else(|| ComplianceError::Unauthorized("Authentication required".to_string()))?;
        let user_id = claims.user_id()?;

        let organization_id = parse_organization_header(
            parts
                .headers
                .get(ORGANIZATION_HEADER)
                .and_then(|v| v.to_str().ok()),
        )?;

        let employee = state
            .repository
            .find_employee_by_user(organization_id, user_id)
            .await?
            .ok_or_else(|| {
                ComplianceError::Forbidden("Not a member of this organization".to_string())
            })?;

        if employee.status != EmployeeStatus::Active {
            tracing::warn!(
                organization_id = %organization_id,
                employee_id = %employee.id,
                status = %employee.status,
                "Inactive employee attempted access"
            );
            return Err(ComplianceError::Forbidden(
                "Membership in this organization is not active".to_string(),
            ));
        }

        Ok(OrgContext {
            organization_id,
            employee,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_organization_header() {
        let id = Uuid::new_v4();
        assert_eq!(
            parse_organization_header(Some(&id.to_string())).unwrap(),
            id
        );
        assert!(matches!(
            parse_organization_header(None),
            Err(ComplianceError::BadRequest(_))
        ));
        assert!(matches!(
            parse_organization_header(Some("  ")),
            Err(ComplianceError::BadRequest(_))
        ));
        assert!(matches!(
            parse_organization_header(Some("acme")),
            Err(ComplianceError::BadRequest(_))
        ));
    }

    #[test]
    fn test_role_checks() {
        let org = Uuid::new_v4();
        let mut employee = Employee::invited(
            org,
            "staff@clinic.org".to_string(),
            "Sam".to_string(),
            "Staff".to_string(),
            OrgRole::Employee,
        );
        employee.status = EmployeeStatus::Active;
        let other = Uuid::new_v4();

        let ctx = OrgContext {
            organization_id: org,
            employee: employee.clone(),
        };
        assert!(ctx.require_admin().is_err());
        assert!(ctx.is_self_or_admin(employee.id));
        assert!(!ctx.is_self_or_admin(other));

        employee.role = OrgRole::Admin;
        let ctx = OrgContext {
            organization_id: org,
            employee,
        };
        assert!(ctx.require_admin().is_ok());
        assert!(ctx.require_owner().is_err());
        assert!(ctx.is_self_or_admin(other));
    }
}
