//! Dashboard metrics for compliance reporting.
//!
//! Counts are gathered by the repository; the arithmetic that turns them
//! into rates and the overall compliance score lives here.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Incident, Severity, TrainingSummary};

/// Integer percentage of `part` in `whole`, rounded half away from zero.
///
/// Returns 0 when `whole` is not positive and never exceeds 100.
pub fn percentage(part: i64, whole: i64) -> i64 {
    if whole <= 0 {
        return 0;
    }
    let pct = (part.max(0) as f64 / whole as f64 * 100.0).round() as i64;
    pct.min(100)
}

/// Headcount by employee status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EmployeeStats {
    pub total: i64,
    pub active: i64,
    pub invited: i64,
    pub inactive: i64,
}

/// Attestation progress across all assignments.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AttestationStats {
    pub total: i64,
    pub attested: i64,
    pub viewed: i64,
    pub pending: i64,
    pub overdue: i64,
    /// Attested over total, 0..=100.
    pub completion_rate: i64,
}

/// Incident count for one severity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SeverityCount {
    pub severity: Severity,
    pub count: i64,
}

/// Incident counts by status.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct IncidentStats {
    pub total: i64,
    pub open: i64,
    pub investigating: i64,
    pub resolved: i64,
    pub closed: i64,
    pub phi_involved: i64,
    /// One entry per severity, zero counts included.
    pub by_severity: Vec<SeverityCount>,
}

/// Training completion across active employees and all modules.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct TrainingStats {
    pub modules: i64,
    /// Active employees × modules.
    pub total_assignments: i64,
    pub completed: i64,
    /// Completed over total assignments, 0..=100.
    pub completion_rate: i64,
}

/// Organization-wide compliance dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComplianceDashboard {
    pub organization_id: Uuid,
    pub employees: EmployeeStats,
    pub attestations: AttestationStats,
    pub incidents: IncidentStats,
    pub training: TrainingStats,
    /// Mean of the applicable completion rates, 0..=100.
    pub compliance_score: i64,
    pub recent_incidents: Vec<Incident>,
}

/// Combine attestation and training completion into one score.
///
/// Rates whose denominator is zero do not count; with nothing to measure
/// the organization scores 100.
pub fn compliance_score(attestations: &AttestationStats, training: &TrainingStats) -> i64 {
    let rates: Vec<i64> = [
        (attestations.total > 0).then_some(attestations.completion_rate),
        (training.total_assignments > 0).then_some(training.completion_rate),
    ]
    .into_iter()
    .flatten()
    .collect();

    if rates.is_empty() {
        return 100;
    }
    percentage(rates.iter().sum(), rates.len() as i64 * 100)
}

/// Personal dashboard for the calling employee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeDashboard {
    pub employee_id: Uuid,
    pub pending_assignments: i64,
    pub overdue_assignments: i64,
    pub attested_assignments: i64,
    pub training: TrainingSummary,
    /// Incidents this employee reported that are still open or investigating.
    pub open_reported_incidents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(3, 3), 100);
        assert_eq!(percentage(4, 3), 100);
        assert_eq!(percentage(-1, 3), 0);
    }

    #[test]
    fn test_compliance_score_ignores_empty_rates() {
        let attestations = AttestationStats {
            total: 4,
            attested: 3,
            completion_rate: 75,
            ..Default::default()
        };
        let no_training = TrainingStats::default();
        assert_eq!(compliance_score(&attestations, &no_training), 75);

        let training = TrainingStats {
            modules: 2,
            total_assignments: 10,
            completed: 5,
            completion_rate: 50,
        };
        assert_eq!(compliance_score(&attestations, &training), 63);
        assert_eq!(
            compliance_score(&AttestationStats::default(), &TrainingStats::default()),
            100
        );
    }
}
