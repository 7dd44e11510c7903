//! Policies and policy bundles.

use std::collections::HashSet;

use uuid::Uuid;

use crate::domain::{BundleSummary, Policy, PolicyBundle, PolicyFilter};
use crate::error::{ComplianceError, ComplianceResult};
use crate::storage::models::{BundleRow, BundleSummaryRow, PolicyRow};
use crate::storage::ComplianceRepository;

impl ComplianceRepository {
    // ==================== Policies ====================

    /// Create a policy.
    pub async fn create_policy(&self, policy: &Policy) -> ComplianceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO policies (id, organization_id, title, category, applies_to, content,
                                  version, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(policy.id.to_string())
        .bind(policy.organization_id.to_string())
        .bind(&policy.title)
        .bind(policy.category.to_string())
        .bind(policy.applies_to.to_string())
        .bind(&policy.content)
        .bind(policy.version)
        .bind(policy.status.to_string())
        .bind(policy.created_at.to_rfc3339())
        .bind(policy.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a policy within an organization.
    pub async fn get_policy(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<Policy> {
        let row: PolicyRow =
            sqlx::query_as("SELECT * FROM policies WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| ComplianceError::NotFound(format!("Policy {} not found", id)))?;

        row.try_into()
    }

    /// List policies matching the filter, ordered by title.
    pub async fn list_policies(
        &self,
        organization_id: Uuid,
        filter: &PolicyFilter,
    ) -> ComplianceResult<Vec<Policy>> {
        let mut conditions = vec!["organization_id = ?".to_string()];
        if filter.category.is_some() {
            conditions.push("category = ?".to_string());
        }
        if filter.status.is_some() {
            conditions.push("status = ?".to_string());
        }
        if filter.applies_to.is_some() {
            conditions.push("applies_to = ?".to_string());
        }

        let query = format!(
            "SELECT * FROM policies WHERE {} ORDER BY title ASC",
            conditions.join(" AND ")
        );

        let mut query_builder =
            sqlx::query_as::<_, PolicyRow>(&query).bind(organization_id.to_string());
        if let Some(category) = filter.category {
            query_builder = query_builder.bind(category.to_string());
        }
        if let Some(status) = filter.status {
            query_builder = query_builder.bind(status.to_string());
        }
        if let Some(applies_to) = filter.applies_to {
            query_builder = query_builder.bind(applies_to.to_string());
        }

        let rows = query_builder.fetch_all(&self.pool).await?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// IDs from `ids` that do not name a policy in the organization.
    pub async fn find_missing_policy_ids(
        &self,
        organization_id: Uuid,
        ids: &[Uuid],
    ) -> ComplianceResult<Vec<Uuid>> {
        let existing: HashSet<String> =
            sqlx::query_as::<_, (String,)>("SELECT id FROM policies WHERE organization_id = ?")
                .bind(organization_id.to_string())
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|(id,)| id)
                .collect();

        Ok(ids
            .iter()
            .filter(|id| !existing.contains(&id.to_string()))
            .copied()
            .collect())
    }

    /// Persist a policy's editable fields, version and status.
    pub async fn update_policy(&self, policy: &Policy) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE policies
            SET title = ?, category = ?, applies_to = ?, content = ?, version = ?,
                status = ?, updated_at = ?
            WHERE id = ? AND organization_id = ?
            "#,
        )
        .bind(&policy.title)
        .bind(policy.category.to_string())
        .bind(policy.applies_to.to_string())
        .bind(&policy.content)
        .bind(policy.version)
        .bind(policy.status.to_string())
        .bind(policy.updated_at.to_rfc3339())
        .bind(policy.id.to_string())
        .bind(policy.organization_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Policy {} not found",
                policy.id
            )));
        }

        Ok(())
    }

    /// Delete a policy; bundle links go with it.
    pub async fn delete_policy(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query("DELETE FROM policies WHERE id = ? AND organization_id = ?")
            .bind(id.to_string())
            .bind(organization_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!("Policy {} not found", id)));
        }

        Ok(())
    }

    // ==================== Policy Bundles ====================

    /// Create a bundle with its ordered policy list.
    pub async fn create_bundle(&self, bundle: &PolicyBundle) -> ComplianceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO policy_bundles (id, organization_id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(bundle.id.to_string())
        .bind(bundle.organization_id.to_string())
        .bind(&bundle.name)
        .bind(&bundle.description)
        .bind(bundle.created_at.to_rfc3339())
        .bind(bundle.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (position, policy_id) in bundle.policy_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO bundle_policies (bundle_id, policy_id, position) VALUES (?, ?, ?)",
            )
            .bind(bundle.id.to_string())
            .bind(policy_id.to_string())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get a bundle within an organization.
    pub async fn get_bundle(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<PolicyBundle> {
        let row: BundleRow =
            sqlx::query_as("SELECT * FROM policy_bundles WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| {
                    ComplianceError::NotFound(format!("Policy bundle {} not found", id))
                })?;

        let policy_ids = sqlx::query_as::<_, (String,)>(
            "SELECT policy_id FROM bundle_policies WHERE bundle_id = ? ORDER BY position ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(policy_id,)| {
            Uuid::parse_str(&policy_id).map_err(|e| ComplianceError::Internal(e.to_string()))
        })
        .collect::<ComplianceResult<Vec<Uuid>>>()?;

        row.into_bundle(policy_ids)
    }

    /// The bundle's policies in bundle order.
    pub async fn get_bundle_policies(&self, bundle_id: Uuid) -> ComplianceResult<Vec<Policy>> {
        let rows: Vec<PolicyRow> = sqlx::query_as(
            r#"
            SELECT p.* FROM policies p
            JOIN bundle_policies bp ON p.id = bp.policy_id
            WHERE bp.bundle_id = ?
            ORDER BY bp.position ASC
            "#,
        )
        .bind(bundle_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// List bundles with policy, assignment and attestation counts.
    pub async fn list_bundles(&self, organization_id: Uuid) -> ComplianceResult<Vec<BundleSummary>> {
        let rows: Vec<BundleSummaryRow> = sqlx::query_as(
            r#"
            SELECT
                b.id,
                b.name,
                b.description,
                (SELECT COUNT(*) FROM bundle_policies bp WHERE bp.bundle_id = b.id) AS policy_count,
                (SELECT COUNT(*) FROM assignments a WHERE a.bundle_id = b.id) AS assignment_count,
                (SELECT COUNT(*) FROM assignments a
                    WHERE a.bundle_id = b.id AND a.status = 'attested') AS attested_count,
                b.created_at
            FROM policy_bundles b
            WHERE b.organization_id = ?
            ORDER BY b.name ASC
            "#,
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Persist a bundle's name, description and policy list.
    pub async fn update_bundle(&self, bundle: &PolicyBundle) -> ComplianceResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE policy_bundles SET name = ?, description = ?, updated_at = ?
            WHERE id = ? AND organization_id = ?
            "#,
        )
        .bind(&bundle.name)
        .bind(&bundle.description)
        .bind(bundle.updated_at.to_rfc3339())
        .bind(bundle.id.to_string())
        .bind(bundle.organization_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Policy bundle {} not found",
                bundle.id
            )));
        }

        sqlx::query("DELETE FROM bundle_policies WHERE bundle_id = ?")
            .bind(bundle.id.to_string())
            .execute(&mut *tx)
            .await?;

        for (position, policy_id) in bundle.policy_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO bundle_policies (bundle_id, policy_id, position) VALUES (?, ?, ?)",
            )
            .bind(bundle.id.to_string())
            .bind(policy_id.to_string())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete a bundle and its assignments.
    pub async fn delete_bundle(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query("DELETE FROM policy_bundles WHERE id = ? AND organization_id = ?")
            .bind(id.to_string())
            .bind(organization_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Policy bundle {} not found",
                id
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{Applicability, PolicyCategory, PolicyStatus};
    use crate::storage::repository::tests::{seed_org, setup_test_db};

    use super::*;

    fn policy(organization_id: Uuid, title: &str) -> Policy {
        Policy::new(
            organization_id,
            title.to_string(),
            PolicyCategory::Privacy,
            Applicability::All,
            format!("# {}", title),
        )
    }

    #[tokio::test]
    async fn test_policy_filters() {
        let repo = setup_test_db().await;
        let (org, _) = seed_org(&repo).await;

        let draft = policy(org.id, "Minimum Necessary");
        let mut published = policy(org.id, "Access Control");
        published.category = PolicyCategory::Security;
        published.status = PolicyStatus::Published;
        repo.create_policy(&draft).await.unwrap();
        repo.create_policy(&published).await.unwrap();

        let all = repo
            .list_policies(org.id, &PolicyFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "Access Control");

        let filter = PolicyFilter {
            status: Some(PolicyStatus::Published),
            ..Default::default()
        };
        let only_published = repo.list_policies(org.id, &filter).await.unwrap();
        assert_eq!(only_published.len(), 1);
        assert_eq!(only_published[0].id, published.id);
    }

    #[tokio::test]
    async fn test_bundle_preserves_policy_order() {
        let repo = setup_test_db().await;
        let (org, _) = seed_org(&repo).await;
        let first = policy(org.id, "Zeta");
        let second = policy(org.id, "Alpha");
        repo.create_policy(&first).await.unwrap();
        repo.create_policy(&second).await.unwrap();

        let mut bundle = PolicyBundle::new(
            org.id,
            "Onboarding".to_string(),
            None,
            vec![first.id, second.id, first.id],
        );
        repo.create_bundle(&bundle).await.unwrap();

        let stored = repo.get_bundle(org.id, bundle.id).await.unwrap();
        assert_eq!(stored.policy_ids, vec![first.id, second.id]);
        let policies = repo.get_bundle_policies(bundle.id).await.unwrap();
        assert_eq!(policies[0].title, "Zeta");

        bundle.policy_ids = vec![second.id];
        repo.update_bundle(&bundle).await.unwrap();
        let summaries = repo.list_bundles(org.id).await.unwrap();
        assert_eq!(summaries[0].policy_count, 1);
        assert_eq!(summaries[0].assignment_count, 0);

        // Deleting a policy drops it from bundles.
        repo.delete_policy(org.id, second.id).await.unwrap();
        let stored = repo.get_bundle(org.id, bundle.id).await.unwrap();
        assert!(stored.policy_ids.is_empty());
    }

    #[tokio::test]
    async fn test_missing_policy_ids_respect_organization() {
        let repo = setup_test_db().await;
        let (org_a, _) = seed_org(&repo).await;
        let (org_b, _) = seed_org(&repo).await;
        let foreign = policy(org_b.id, "Other Org");
        let local = policy(org_a.id, "Ours");
        repo.create_policy(&foreign).await.unwrap();
        repo.create_policy(&local).await.unwrap();

        let missing = repo
            .find_missing_policy_ids(org_a.id, &[local.id, foreign.id])
            .await
            .unwrap();
        assert_eq!(missing, vec![foreign.id]);
    }
}
