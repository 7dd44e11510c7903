//! Policy document domain models.
//!
//! Policies are markdown documents owned by an organization. Publishing a
//! policy makes it visible to employees; editing the content of a published
//! policy bumps its version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Subject area of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCategory {
    Privacy,
    Security,
    BreachNotification,
    Administrative,
    Physical,
    Technical,
    Other,
}

impl Default for PolicyCategory {
    fn default() -> Self {
        PolicyCategory::Other
    }
}

impl std::fmt::Display for PolicyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PolicyCategory::Privacy => "privacy",
            PolicyCategory::Security => "security",
            PolicyCategory::BreachNotification => "breach_notification",
            PolicyCategory::Administrative => "administrative",
            PolicyCategory::Physical => "physical",
            PolicyCategory::Technical => "technical",
            PolicyCategory::Other => "other",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for PolicyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "privacy" => Ok(PolicyCategory::Privacy),
            "security" => Ok(PolicyCategory::Security),
            "breach_notification" => Ok(PolicyCategory::BreachNotification),
            "administrative" => Ok(PolicyCategory::Administrative),
            "physical" => Ok(PolicyCategory::Physical),
            "technical" => Ok(PolicyCategory::Technical),
            "other" => Ok(PolicyCategory::Other),
            _ => Err(format!("Unknown policy category: {}", s)),
        }
    }
}

/// Which kind of organization a policy is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    CoveredEntity,
    BusinessAssociate,
    All,
}

impl Default for Applicability {
    fn default() -> Self {
        Applicability::All
    }
}

impl std::fmt::Display for Applicability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Applicability::CoveredEntity => write!(f, "covered_entity"),
            Applicability::BusinessAssociate => write!(f, "business_associate"),
            Applicability::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for Applicability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "covered_entity" => Ok(Applicability::CoveredEntity),
            "business_associate" => Ok(Applicability::BusinessAssociate),
            "all" => Ok(Applicability::All),
            _ => Err(format!("Unknown applicability: {}", s)),
        }
    }
}

/// Publication state of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PolicyStatus {
    Draft,
    Published,
    Archived,
}

impl PolicyStatus {
    /// Whether a policy may move from `self` to `next`.
    pub fn can_transition_to(self, next: PolicyStatus) -> bool {
        use PolicyStatus::*;
        matches!(
            (self, next),
            (Draft, Published) | (Draft, Archived) | (Published, Archived) | (Archived, Draft)
        ) || self == next
    }
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyStatus::Draft => write!(f, "draft"),
            PolicyStatus::Published => write!(f, "published"),
            PolicyStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for PolicyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(PolicyStatus::Draft),
            "published" => Ok(PolicyStatus::Published),
            "archived" => Ok(PolicyStatus::Archived),
            _ => Err(format!("Unknown policy status: {}", s)),
        }
    }
}

/// A policy document.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Policy {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub category: PolicyCategory,
    pub applies_to: Applicability,
    /// Markdown source.
    pub content: String,
    /// Starts at 1, incremented when published content changes.
    pub version: i64,
    pub status: PolicyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    /// Create a new draft policy.
    pub fn new(
        organization_id: Uuid,
        title: String,
        category: PolicyCategory,
        applies_to: Applicability,
        content: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            title,
            category,
            applies_to,
            content,
            version: 1,
            status: PolicyStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Optional filters for listing policies.
#[derive(Debug, Clone, Default)]
pub struct PolicyFilter {
    pub category: Option<PolicyCategory>,
    pub status: Option<PolicyStatus>,
    pub applies_to: Option<Applicability>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_status_transitions() {
        use PolicyStatus::*;
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Archived));
        assert!(Archived.can_transition_to(Draft));
        assert!(Published.can_transition_to(Published));
        assert!(!Published.can_transition_to(Draft));
        assert!(!Archived.can_transition_to(Published));
    }

    #[test]
    fn test_new_policy_is_draft_v1() {
        let p = Policy::new(
            Uuid::new_v4(),
            "Minimum Necessary".to_string(),
            PolicyCategory::Privacy,
            Applicability::All,
            "# Minimum necessary".to_string(),
        );
        assert_eq!(p.status, PolicyStatus::Draft);
        assert_eq!(p.version, 1);
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(
            "breach_notification".parse::<PolicyCategory>().unwrap(),
            PolicyCategory::BreachNotification
        );
        assert!("finance".parse::<PolicyCategory>().is_err());
    }
}
