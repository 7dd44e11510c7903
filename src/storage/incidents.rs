//! Incident reports.

use uuid::Uuid;

use crate::domain::{Incident, IncidentFilter};
use crate::error::{ComplianceError, ComplianceResult};
use crate::storage::models::IncidentRow;
use crate::storage::ComplianceRepository;

impl ComplianceRepository {
    /// Save a new incident.
    pub async fn create_incident(&self, incident: &Incident) -> ComplianceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO incidents (id, organization_id, reported_by, title, description,
                                   incident_type, severity, status, phi_involved,
                                   affected_individuals, occurred_at, discovered_at,
                                   resolution_notes, resolved_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(incident.id.to_string())
        .bind(incident.organization_id.to_string())
        .bind(incident.reported_by.to_string())
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.incident_type.to_string())
        .bind(incident.severity.to_string())
        .bind(incident.status.to_string())
        .bind(incident.phi_involved)
        .bind(incident.affected_individuals)
        .bind(incident.occurred_at.map(|t| t.to_rfc3339()))
        .bind(incident.discovered_at.to_rfc3339())
        .bind(&incident.resolution_notes)
        .bind(incident.resolved_at.map(|t| t.to_rfc3339()))
        .bind(incident.created_at.to_rfc3339())
        .bind(incident.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an incident within an organization.
    pub async fn get_incident(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<Incident> {
        let row: IncidentRow =
            sqlx::query_as("SELECT * FROM incidents WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| ComplianceError::NotFound(format!("Incident {} not found", id)))?;

        row.try_into()
    }

    /// List incidents with filtering, newest first.
    pub async fn list_incidents(
        &self,
        organization_id: Uuid,
        filter: &IncidentFilter,
        limit: i64,
        offset: i64,
    ) -> ComplianceResult<(Vec<Incident>, i64)> {
        let mut conditions = vec!["organization_id = ?".to_string()];
        if filter.status.is_some() {
            conditions.push("status = ?".to_string());
        }
        if filter.severity.is_some() {
            conditions.push("severity = ?".to_string());
        }
        if filter.incident_type.is_some() {
            conditions.push("incident_type = ?".to_string());
        }
        if filter.reported_by.is_some() {
            conditions.push("reported_by = ?".to_string());
        }

        let where_clause = conditions.join(" AND ");
        let query = format!(
            "SELECT * FROM incidents WHERE {} ORDER BY discovered_at DESC, created_at DESC LIMIT ? OFFSET ?",
            where_clause
        );
        let count_query = format!("SELECT COUNT(*) FROM incidents WHERE {}", where_clause);

        let mut query_builder = sqlx::query_as::<_, IncidentRow>(&query);
        let mut count_builder = sqlx::query_as::<_, (i64,)>(&count_query);

        query_builder = query_builder.bind(organization_id.to_string());
        count_builder = count_builder.bind(organization_id.to_string());

        if let Some(status) = filter.status {
            query_builder = query_builder.bind(status.to_string());
            count_builder = count_builder.bind(status.to_string());
        }
        if let Some(severity) = filter.severity {
            query_builder = query_builder.bind(severity.to_string());
            count_builder = count_builder.bind(severity.to_string());
        }
        if let Some(incident_type) = filter.incident_type {
            query_builder = query_builder.bind(incident_type.to_string());
            count_builder = count_builder.bind(incident_type.to_string());
        }
        if let Some(reporter) = filter.reported_by {
            query_builder = query_builder.bind(reporter.to_string());
            count_builder = count_builder.bind(reporter.to_string());
        }

        query_builder = query_builder.bind(limit).bind(offset);

        let rows = query_builder.fetch_all(&self.pool).await?;
        let (total,) = count_builder.fetch_one(&self.pool).await?;

        let incidents = rows
            .into_iter()
            .map(|r| r.try_into())
            .collect::<ComplianceResult<Vec<Incident>>>()?;
        Ok((incidents, total))
    }

    /// Persist all mutable incident fields.
    pub async fn update_incident(&self, incident: &Incident) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE incidents
            SET title = ?, description = ?, incident_type = ?, severity = ?, status = ?,
                phi_involved = ?, affected_individuals = ?, occurred_at = ?, discovered_at = ?,
                resolution_notes = ?, resolved_at = ?, updated_at = ?
            WHERE id = ? AND organization_id = ?
            "#,
        )
        .bind(&incident.title)
        .bind(&incident.description)
        .bind(incident.incident_type.to_string())
        .bind(incident.severity.to_string())
        .bind(incident.status.to_string())
        .bind(incident.phi_involved)
        .bind(incident.affected_individuals)
        .bind(incident.occurred_at.map(|t| t.to_rfc3339()))
        .bind(incident.discovered_at.to_rfc3339())
        .bind(&incident.resolution_notes)
        .bind(incident.resolved_at.map(|t| t.to_rfc3339()))
        .bind(incident.updated_at.to_rfc3339())
        .bind(incident.id.to_string())
        .bind(incident.organization_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Incident {} not found",
                incident.id
            )));
        }

        Ok(())
    }

    /// Delete an incident.
    pub async fn delete_incident(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query("DELETE FROM incidents WHERE id = ? AND organization_id = ?")
            .bind(id.to_string())
            .bind(organization_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!("Incident {} not found", id)));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::{IncidentStatus, Severity};
    use crate::storage::repository::tests::{seed_employee, seed_org, setup_test_db};

    use super::*;

    #[tokio::test]
    async fn test_incident_round_trip_and_update() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;

        let mut incident = Incident::new(
            org.id,
            owner.id,
            "Laptop stolen".to_string(),
            "Unencrypted laptop taken from car".to_string(),
        );
        incident.phi_involved = true;
        incident.affected_individuals = Some(120);
        incident.occurred_at = Some(incident.discovered_at - Duration::days(1));
        repo.create_incident(&incident).await.unwrap();

        let stored = repo.get_incident(org.id, incident.id).await.unwrap();
        assert!(stored.phi_involved);
        assert_eq!(stored.affected_individuals, Some(120));
        assert_eq!(stored.severity, Severity::Medium);

        incident.status = IncidentStatus::Resolved;
        incident.resolution_notes = Some("Device wiped remotely".to_string());
        incident.resolved_at = Some(Utc::now());
        repo.update_incident(&incident).await.unwrap();

        let stored = repo.get_incident(org.id, incident.id).await.unwrap();
        assert_eq!(stored.status, IncidentStatus::Resolved);
        assert!(stored.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_list_incidents_by_reporter() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;
        let staff = seed_employee(&repo, org.id, "staff@clinic.org").await;

        for (reporter, title) in [(owner.id, "Misdirected fax"), (staff.id, "Shared password")] {
            let incident = Incident::new(org.id, reporter, title.to_string(), "details".to_string());
            repo.create_incident(&incident).await.unwrap();
        }

        let (all, total) = repo
            .list_incidents(org.id, &IncidentFilter::default(), 50, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(total, 2);

        let filter = IncidentFilter {
            reported_by: Some(staff.id),
            ..Default::default()
        };
        let (mine, total) = repo.list_incidents(org.id, &filter, 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].title, "Shared password");

        repo.delete_incident(org.id, mine[0].id).await.unwrap();
        assert!(matches!(
            repo.get_incident(org.id, mine[0].id).await,
            Err(ComplianceError::NotFound(_))
        ));
    }
}
