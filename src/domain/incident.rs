//! Incident reporting domain models.
//!
//! Any employee may report an incident. Admins move it through
//! `open` -> `investigating` -> `resolved` -> `closed`.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncidentType {
    PrivacyBreach,
    SecurityIncident,
    UnauthorizedAccess,
    LostDevice,
    ImproperDisclosure,
    Other,
}

impl Default for IncidentType {
    fn default() -> Self {
        IncidentType::Other
    }
}

impl std::fmt::Display for IncidentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IncidentType::PrivacyBreach => "privacy_breach",
            IncidentType::SecurityIncident => "security_incident",
            IncidentType::UnauthorizedAccess => "unauthorized_access",
            IncidentType::LostDevice => "lost_device",
            IncidentType::ImproperDisclosure => "improper_disclosure",
            IncidentType::Other => "other",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for IncidentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "privacy_breach" => Ok(IncidentType::PrivacyBreach),
            "security_incident" => Ok(IncidentType::SecurityIncident),
            "unauthorized_access" => Ok(IncidentType::UnauthorizedAccess),
            "lost_device" => Ok(IncidentType::LostDevice),
            "improper_disclosure" => Ok(IncidentType::ImproperDisclosure),
            "other" => Ok(IncidentType::Other),
            _ => Err(format!("Unknown incident type: {}", s)),
        }
    }
}

/// Severity of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Medium
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Workflow state of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl IncidentStatus {
    /// Whether an incident may move from `self` to `next`.
    pub fn can_transition_to(self, next: IncidentStatus) -> bool {
        use IncidentStatus::*;
        (self == next && self != Closed)
            || matches!(
                (self, next),
                (Open, Investigating)
                    | (Open, Resolved)
                    | (Investigating, Resolved)
                    | (Investigating, Open)
                    | (Resolved, Closed)
                    | (Resolved, Investigating)
            )
    }

    /// Not yet resolved or closed.
    pub fn is_active(self) -> bool {
        matches!(self, IncidentStatus::Open | IncidentStatus::Investigating)
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidentStatus::Open => write!(f, "open"),
            IncidentStatus::Investigating => write!(f, "investigating"),
            IncidentStatus::Resolved => write!(f, "resolved"),
            IncidentStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(IncidentStatus::Open),
            "investigating" => Ok(IncidentStatus::Investigating),
            "resolved" => Ok(IncidentStatus::Resolved),
            "closed" => Ok(IncidentStatus::Closed),
            _ => Err(format!("Unknown incident status: {}", s)),
        }
    }
}

/// A reported incident.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Incident {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Employee who reported the incident.
    pub reported_by: Uuid,
    pub title: String,
    pub description: String,
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub status: IncidentStatus,
    /// Whether protected health information was involved.
    pub phi_involved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_individuals: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
    pub discovered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    /// Create a new open incident.
    pub fn new(organization_id: Uuid, reported_by: Uuid, title: String, description: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            reported_by,
            title,
            description,
            incident_type: IncidentType::default(),
            severity: Severity::default(),
            status: IncidentStatus::Open,
            phi_involved: false,
            affected_individuals: None,
            occurred_at: None,
            discovered_at: now,
            resolution_notes: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deadline for breach notification when PHI is involved.
    ///
    /// `None` when no PHI is involved or the deadline is not representable.
    pub fn notification_deadline(&self, notification_days: i64) -> Option<DateTime<Utc>> {
        if !self.phi_involved {
            return None;
        }
        self.discovered_at
            .checked_add_signed(Duration::try_days(notification_days)?)
    }
}

/// Earliest and latest calendar years accepted for incident timestamps.
pub const INCIDENT_YEARS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Whether `at` falls inside [`INCIDENT_YEARS`].
pub fn is_reasonable_timestamp(at: DateTime<Utc>) -> bool {
    INCIDENT_YEARS.contains(&at.year())
}

/// Optional filters for listing incidents.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub severity: Option<Severity>,
    pub incident_type: Option<IncidentType>,
    /// Restrict to incidents reported by this employee.
    pub reported_by: Option<Uuid>,
}
