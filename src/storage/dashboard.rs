//! Aggregate queries for the compliance dashboards.

use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{
    compliance_score, percentage, AttestationStats, ComplianceDashboard, EmployeeDashboard,
    EmployeeStats, Incident, IncidentStats, Severity, SeverityCount, TrainingStats,
};
use crate::error::ComplianceResult;
use crate::storage::models::IncidentRow;
use crate::storage::ComplianceRepository;

/// Incidents shown on the organization dashboard.
const RECENT_INCIDENT_LIMIT: i64 = 5;

impl ComplianceRepository {
    /// Count rows of `table` in the organization grouped by `column`.
    async fn count_by(
        &self,
        table: &str,
        column: &str,
        organization_id: Uuid,
    ) -> ComplianceResult<HashMap<String, i64>> {
        let query = format!(
            "SELECT {column}, COUNT(*) FROM {table} WHERE organization_id = ? GROUP BY {column}"
        );
        let rows: Vec<(String, i64)> = sqlx::query_as(&query)
            .bind(organization_id.to_string())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().collect())
    }

    /// Headcount by employee status.
    pub async fn employee_stats(&self, organization_id: Uuid) -> ComplianceResult<EmployeeStats> {
        let counts = self.count_by("employees", "status", organization_id).await?;
        let get = |key: &str| counts.get(key).copied().unwrap_or(0);

        Ok(EmployeeStats {
            total: counts.values().sum(),
            active: get("active"),
            invited: get("invited"),
            inactive: get("inactive"),
        })
    }

    /// Attestation progress across all assignments.
    pub async fn attestation_stats(
        &self,
        organization_id: Uuid,
        today: NaiveDate,
    ) -> ComplianceResult<AttestationStats> {
        let counts = self.count_by("assignments", "status", organization_id).await?;
        let get = |key: &str| counts.get(key).copied().unwrap_or(0);

        let (overdue,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM assignments
            WHERE organization_id = ? AND status != 'attested'
              AND due_date IS NOT NULL AND due_date < ?
            "#,
        )
        .bind(organization_id.to_string())
        .bind(today.format("%Y-%m-%d").to_string())
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = counts.values().sum();
        let attested = get("attested");
        Ok(AttestationStats {
            total,
            attested,
            viewed: get("viewed"),
            pending: get("pending"),
            overdue,
            completion_rate: percentage(attested, total),
        })
    }

    /// Incident counts by status and severity.
    pub async fn incident_stats(&self, organization_id: Uuid) -> ComplianceResult<IncidentStats> {
        let by_status = self.count_by("incidents", "status", organization_id).await?;
        let by_severity = self.count_by("incidents", "severity", organization_id).await?;
        let get = |key: &str| by_status.get(key).copied().unwrap_or(0);

        let (phi_involved,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM incidents WHERE organization_id = ? AND phi_involved = 1",
        )
        .bind(organization_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(IncidentStats {
            total: by_status.values().sum(),
            open: get("open"),
            investigating: get("investigating"),
            resolved: get("resolved"),
            closed: get("closed"),
            phi_involved,
            by_severity: Severity::ALL
                .iter()
                .map(|severity| SeverityCount {
                    severity: *severity,
                    count: by_severity
                        .get(&severity.to_string())
                        .copied()
                        .unwrap_or(0),
                })
                .collect(),
        })
    }

    /// Training completion across active employees and all modules.
    pub async fn training_stats(&self, organization_id: Uuid) -> ComplianceResult<TrainingStats> {
        let (modules,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM training_modules WHERE organization_id = ?")
                .bind(organization_id.to_string())
                .fetch_one(&self.pool)
                .await?;

        let (active_employees,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM employees WHERE organization_id = ? AND status = 'active'",
        )
        .bind(organization_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let (completed,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM training_progress p
            JOIN employees e ON p.employee_id = e.id
            WHERE p.organization_id = ? AND p.status = 'completed' AND e.status = 'active'
            "#,
        )
        .bind(organization_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let total_assignments = modules * active_employees;
        Ok(TrainingStats {
            modules,
            total_assignments,
            completed,
            completion_rate: percentage(completed, total_assignments),
        })
    }

    /// Most recently discovered incidents.
    pub async fn recent_incidents(
        &self,
        organization_id: Uuid,
        limit: i64,
    ) -> ComplianceResult<Vec<Incident>> {
        let rows: Vec<IncidentRow> = sqlx::query_as(
            r#"
            SELECT * FROM incidents
            WHERE organization_id = ?
            ORDER BY discovered_at DESC, created_at DESC
            LIMIT ?
            "#,
        )
        .bind(organization_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Organization-wide compliance dashboard.
    pub async fn compliance_dashboard(
        &self,
        organization_id: Uuid,
        today: NaiveDate,
    ) -> ComplianceResult<ComplianceDashboard> {
        let employees = self.employee_stats(organization_id).await?;
        let attestations = self.attestation_stats(organization_id, today).await?;
        let incidents = self.incident_stats(organization_id).await?;
        let training = self.training_stats(organization_id).await?;
        let recent_incidents = self
            .recent_incidents(organization_id, RECENT_INCIDENT_LIMIT)
            .await?;

        Ok(ComplianceDashboard {
            organization_id,
            compliance_score: compliance_score(&attestations, &training),
            employees,
            attestations,
            incidents,
            training,
            recent_incidents,
        })
    }

    /// Personal dashboard for one employee.
    pub async fn employee_dashboard(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
        today: NaiveDate,
    ) -> ComplianceResult<EmployeeDashboard> {
        let (pending, overdue, attested): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN status != 'attested' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status != 'attested' AND due_date IS NOT NULL
                                   AND due_date < ? THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'attested' THEN 1 ELSE 0 END), 0)
            FROM assignments
            WHERE organization_id = ? AND employee_id = ?
            "#,
        )
        .bind(today.format("%Y-%m-%d").to_string())
        .bind(organization_id.to_string())
        .bind(employee_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        let (open_reported_incidents,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM incidents
            WHERE organization_id = ? AND reported_by = ? AND status IN ('open', 'investigating')
            "#,
        )
        .bind(organization_id.to_string())
        .bind(employee_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(EmployeeDashboard {
            employee_id,
            pending_assignments: pending,
            overdue_assignments: overdue,
            attested_assignments: attested,
            training: self.training_summary(organization_id, employee_id).await?,
            open_reported_incidents,
        })
    }
}
