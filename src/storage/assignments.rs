//! Attestation assignments.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{Assignment, AssignmentFilter, AssignmentStatus, AssignmentSummary};
use crate::error::{ComplianceError, ComplianceResult};
use crate::storage::models::{AssignmentRow, AssignmentSummaryRow};
use crate::storage::ComplianceRepository;

const OVERDUE_CONDITION: &str =
    "(a.status != 'attested' AND a.due_date IS NOT NULL AND a.due_date < ?)";

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl ComplianceRepository {
    /// Employees holding a non-attested assignment for the bundle.
    pub async fn open_assignment_employee_ids(
        &self,
        organization_id: Uuid,
        bundle_id: Uuid,
    ) -> ComplianceResult<HashSet<Uuid>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT employee_id FROM assignments
            WHERE organization_id = ? AND bundle_id = ? AND status != 'attested'
            "#,
        )
        .bind(organization_id.to_string())
        .bind(bundle_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id,)| Uuid::parse_str(&id).map_err(|e| ComplianceError::Internal(e.to_string())))
            .collect()
    }

    /// Insert a batch of assignments atomically.
    pub async fn create_assignments(&self, assignments: &[Assignment]) -> ComplianceResult<()> {
        let mut tx = self.pool.begin().await?;

        for assignment in assignments {
            sqlx::query(
                r#"
                INSERT INTO assignments (id, organization_id, bundle_id, employee_id, status,
                                         due_date, signature, assigned_by, assigned_at,
                                         viewed_at, attested_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(assignment.id.to_string())
            .bind(assignment.organization_id.to_string())
            .bind(assignment.bundle_id.to_string())
            .bind(assignment.employee_id.to_string())
            .bind(assignment.status.to_string())
            .bind(assignment.due_date.map(date_string))
            .bind(&assignment.signature)
            .bind(assignment.assigned_by.to_string())
            .bind(assignment.assigned_at.to_rfc3339())
            .bind(assignment.viewed_at.map(|t| t.to_rfc3339()))
            .bind(assignment.attested_at.map(|t| t.to_rfc3339()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get an assignment within an organization.
    pub async fn get_assignment(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> ComplianceResult<Assignment> {
        let row: AssignmentRow =
            sqlx::query_as("SELECT * FROM assignments WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| ComplianceError::NotFound(format!("Assignment {} not found", id)))?;

        row.try_into()
    }

    /// List assignment summaries, soonest due first.
    pub async fn list_assignments(
        &self,
        organization_id: Uuid,
        filter: &AssignmentFilter,
        today: NaiveDate,
    ) -> ComplianceResult<Vec<AssignmentSummary>> {
        let mut conditions = vec!["a.organization_id = ?".to_string()];
        if filter.status.is_some() {
            conditions.push("a.status = ?".to_string());
        }
        if filter.employee_id.is_some() {
            conditions.push("a.employee_id = ?".to_string());
        }
        if filter.bundle_id.is_some() {
            conditions.push("a.bundle_id = ?".to_string());
        }
        match filter.overdue {
            Some(true) => conditions.push(OVERDUE_CONDITION.to_string()),
            Some(false) => conditions.push(format!("NOT {}", OVERDUE_CONDITION)),
            None => {}
        }

        let query = format!(
            r#"
            SELECT
                a.id,
                a.bundle_id,
                b.name AS bundle_name,
                a.employee_id,
                e.first_name,
                e.last_name,
                e.email,
                a.status,
                a.due_date,
                a.assigned_at,
                a.attested_at
            FROM assignments a
            JOIN policy_bundles b ON a.bundle_id = b.id
            JOIN employees e ON a.employee_id = e.id
            WHERE {}
            ORDER BY a.due_date IS NULL, a.due_date ASC, a.assigned_at DESC
            "#,
            conditions.join(" AND ")
        );

        let mut query_builder =
            sqlx::query_as::<_, AssignmentSummaryRow>(&query).bind(organization_id.to_string());
        if let Some(status) = filter.status {
            query_builder = query_builder.bind(status.to_string());
        }
        if let Some(employee_id) = filter.employee_id {
            query_builder = query_builder.bind(employee_id.to_string());
        }
        if let Some(bundle_id) = filter.bundle_id {
            query_builder = query_builder.bind(bundle_id.to_string());
        }
        if filter.overdue.is_some() {
            query_builder = query_builder.bind(date_string(today));
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.into_summary(today)).collect()
    }

    /// Move a pending assignment to viewed. Other states are left unchanged.
    pub async fn mark_assignment_viewed(
        &self,
        organization_id: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ComplianceResult<Assignment> {
        sqlx::query(
            r#"
            UPDATE assignments SET status = ?, viewed_at = ?
            WHERE id = ? AND organization_id = ? AND status = 'pending'
            "#,
        )
        .bind(AssignmentStatus::Viewed.to_string())
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .execute(&self.pool)
        .await?;

        self.get_assignment(organization_id, id).await
    }

    /// Record an attestation. Attested assignments cannot be attested again.
    pub async fn attest_assignment(
        &self,
        organization_id: Uuid,
        id: Uuid,
        signature: &str,
        now: DateTime<Utc>,
    ) -> ComplianceResult<Assignment> {
        let result = sqlx::query(
            r#"
            UPDATE assignments
            SET status = ?, signature = ?, attested_at = ?, viewed_at = COALESCE(viewed_at, ?)
            WHERE id = ? AND organization_id = ? AND status != 'attested'
            "#,
        )
        .bind(AssignmentStatus::Attested.to_string())
        .bind(signature)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish a missing assignment from a repeated attestation.
            self.get_assignment(organization_id, id).await?;
            return Err(ComplianceError::BadRequest(
                "Assignment has already been attested".to_string(),
            ));
        }

        self.get_assignment(organization_id, id).await
    }

    /// Revoke an assignment.
    pub async fn delete_assignment(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = ? AND organization_id = ?")
            .bind(id.to_string())
            .bind(organization_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Assignment {} not found",
                id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::domain::PolicyBundle;
    use crate::storage::repository::tests::{seed_employee, seed_org, setup_test_db};

    use super::*;

    #[tokio::test]
    async fn test_assignment_lifecycle() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;
        let employee = seed_employee(&repo, org.id, "rn@clinic.org").await;
        let bundle = PolicyBundle::new(org.id, "Annual".to_string(), None, vec![]);
        repo.create_bundle(&bundle).await.unwrap();

        let today = Utc::now().date_naive();
        let assignment = Assignment::new(
            org.id,
            bundle.id,
            employee.id,
            Some(today + Duration::days(7)),
            owner.id,
        );
        repo.create_assignments(std::slice::from_ref(&assignment))
            .await
            .unwrap();

        let open = repo
            .open_assignment_employee_ids(org.id, bundle.id)
            .await
            .unwrap();
        assert!(open.contains(&employee.id));

        let viewed = repo
            .mark_assignment_viewed(org.id, assignment.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(viewed.status, AssignmentStatus::Viewed);
        let first_view = viewed.viewed_at;

        let attested = repo
            .attest_assignment(org.id, assignment.id, "Erin Employee", Utc::now())
            .await
            .unwrap();
        assert_eq!(attested.status, AssignmentStatus::Attested);
        assert_eq!(attested.viewed_at, first_view);
        assert_eq!(attested.signature.as_deref(), Some("Erin Employee"));

        // Viewing again is a no-op, attesting again is rejected.
        let still = repo
            .mark_assignment_viewed(org.id, assignment.id, Utc::now())
            .await
            .unwrap();
        assert_eq!(still.status, AssignmentStatus::Attested);
        assert!(matches!(
            repo.attest_assignment(org.id, assignment.id, "again", Utc::now())
                .await,
            Err(ComplianceError::BadRequest(_))
        ));
        assert!(repo
            .open_assignment_employee_ids(org.id, bundle.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_overdue_filter_is_derived_from_today() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;
        let employee = seed_employee(&repo, org.id, "late@clinic.org").await;
        let bundle = PolicyBundle::new(org.id, "Security".to_string(), None, vec![]);
        repo.create_bundle(&bundle).await.unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let late = Assignment::new(
            org.id,
            bundle.id,
            employee.id,
            NaiveDate::from_ymd_opt(2026, 3, 1),
            owner.id,
        );
        let on_time = Assignment::new(
            org.id,
            bundle.id,
            owner.id,
            NaiveDate::from_ymd_opt(2026, 4, 1),
            owner.id,
        );
        repo.create_assignments(&[late.clone(), on_time.clone()])
            .await
            .unwrap();

        let all = repo
            .list_assignments(org.id, &AssignmentFilter::default(), today)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, late.id);
        assert!(all[0].is_overdue);
        assert_eq!(all[0].bundle_name, "Security");

        let overdue = AssignmentFilter {
            overdue: Some(true),
            ..Default::default()
        };
        let rows = repo.list_assignments(org.id, &overdue, today).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].employee_email, "late@clinic.org");

        let not_overdue = AssignmentFilter {
            overdue: Some(false),
            ..Default::default()
        };
        let rows = repo
            .list_assignments(org.id, &not_overdue, today)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, on_time.id);
    }
}
