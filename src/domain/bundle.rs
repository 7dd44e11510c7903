//! Policy bundle domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::Policy;

/// A named, ordered group of policies assigned to employees together.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PolicyBundle {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Policy IDs in display order.
    pub policy_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyBundle {
    pub fn new(
        organization_id: Uuid,
        name: String,
        description: Option<String>,
        policy_ids: Vec<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            name,
            description,
            policy_ids: dedup_preserving_order(policy_ids),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Remove repeated IDs, keeping the first occurrence.
pub fn dedup_preserving_order(ids: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

/// Bundle row for list views.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BundleSummary {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub policy_count: i64,
    pub assignment_count: i64,
    pub attested_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A bundle with its policies resolved.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BundleDetails {
    #[serde(flatten)]
    pub bundle: PolicyBundle,
    pub policies: Vec<Policy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(dedup_preserving_order(vec![b, a, b, c, a]), vec![b, a, c]);
    }
}
