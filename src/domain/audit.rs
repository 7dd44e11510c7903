//! Audit trail of state-changing operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// One recorded operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Employee who performed the operation.
    pub actor_employee_id: Uuid,
    /// Dotted action name, e.g. `incident.created`.
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        organization_id: Uuid,
        actor_employee_id: Uuid,
        action: &str,
        entity_type: &str,
        entity_id: Uuid,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            actor_employee_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details,
            created_at: Utc::now(),
        }
    }
}
