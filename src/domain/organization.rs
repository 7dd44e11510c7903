//! Organization domain models.
//!
//! Organizations are the tenancy boundary: every employee, policy, incident
//! and training record belongs to exactly one organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// HIPAA classification of an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Health plans, clearinghouses and providers transmitting PHI.
    CoveredEntity,
    /// Vendors that handle PHI on behalf of a covered entity.
    BusinessAssociate,
    /// Covered entity with designated non-covered components.
    HybridEntity,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::CoveredEntity => write!(f, "covered_entity"),
            EntityType::BusinessAssociate => write!(f, "business_associate"),
            EntityType::HybridEntity => write!(f, "hybrid_entity"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "covered_entity" => Ok(EntityType::CoveredEntity),
            "business_associate" => Ok(EntityType::BusinessAssociate),
            "hybrid_entity" => Ok(EntityType::HybridEntity),
            _ => Err(format!("Unknown entity type: {}", s)),
        }
    }
}

/// A healthcare organization using the service.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Organization {
    /// Unique identifier.
    pub id: Uuid,
    /// Organization name.
    pub name: String,
    /// URL-friendly slug.
    pub slug: String,
    /// HIPAA classification.
    pub entity_type: EntityType,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the organization was created.
    pub created_at: DateTime<Utc>,
    /// When the organization was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// Create a new organization, deriving its slug from the name.
    pub fn new(name: String, entity_type: EntityType, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            slug: Self::slugify(&name),
            name,
            entity_type,
            description,
            created_at: now,
            updated_at: now,
        }
    }

    /// Generate a slug from a name.
    pub fn slugify(name: &str) -> String {
        name.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .split('-')
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(Organization::slugify("Mercy Clinic"), "mercy-clinic");
        assert_eq!(
            Organization::slugify("  St. Luke's  Health 2 "),
            "st-luke-s-health-2"
        );
        assert_eq!(Organization::slugify("!!!"), "");
    }

    #[test]
    fn test_entity_type_round_trip_strings() {
        assert_eq!(EntityType::BusinessAssociate.to_string(), "business_associate");
        assert_eq!(
            "Covered_Entity".parse::<EntityType>().unwrap(),
            EntityType::CoveredEntity
        );
        assert!("clinic".parse::<EntityType>().is_err());
    }
}
