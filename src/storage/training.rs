//! Training modules and per-employee progress.

use std::collections::HashMap;

use uuid::Uuid;

use crate::domain::{
    Employee, EmployeeTrainingRow, ModuleProgress, TrainingModule, TrainingProgress,
    TrainingStatus, TrainingSummary,
};
use crate::error::{ComplianceError, ComplianceResult};
use crate::storage::models::{
    EmployeeRow, ModuleProgressRow, TrainingModuleRow, TrainingProgressRow,
};
use crate::storage::ComplianceRepository;

impl ComplianceRepository {
    // ==================== Modules ====================

    /// Create a training module.
    pub async fn create_training_module(&self, module: &TrainingModule) -> ComplianceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO training_modules (id, organization_id, title, description, content,
                                          duration_minutes, required, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(module.id.to_string())
        .bind(module.organization_id.to_string())
        .bind(&module.title)
        .bind(&module.description)
        .bind(&module.content)
        .bind(module.duration_minutes)
        .bind(module.required)
        .bind(module.created_at.to_rfc3339())
        .bind(module.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a training module within an organization.
    pub async fn get_training_module(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> ComplianceResult<TrainingModule> {
        let row: TrainingModuleRow =
            sqlx::query_as("SELECT * FROM training_modules WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| {
                    ComplianceError::NotFound(format!("Training module {} not found", id))
                })?;

        row.try_into()
    }

    /// List an organization's training modules in creation order.
    pub async fn list_training_modules(
        &self,
        organization_id: Uuid,
    ) -> ComplianceResult<Vec<TrainingModule>> {
        let rows: Vec<TrainingModuleRow> = sqlx::query_as(
            "SELECT * FROM training_modules WHERE organization_id = ? ORDER BY created_at ASC, title ASC",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Persist a module's editable fields.
    pub async fn update_training_module(&self, module: &TrainingModule) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE training_modules
            SET title = ?, description = ?, content = ?, duration_minutes = ?, required = ?,
                updated_at = ?
            WHERE id = ? AND organization_id = ?
            "#,
        )
        .bind(&module.title)
        .bind(&module.description)
        .bind(&module.content)
        .bind(module.duration_minutes)
        .bind(module.required)
        .bind(module.updated_at.to_rfc3339())
        .bind(module.id.to_string())
        .bind(module.organization_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Training module {} not found",
                module.id
            )));
        }

        Ok(())
    }

    /// Delete a module and all progress recorded against it.
    pub async fn delete_training_module(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> ComplianceResult<()> {
        let result =
            sqlx::query("DELETE FROM training_modules WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Training module {} not found",
                id
            )));
        }

        Ok(())
    }

    // ==================== Progress ====================

    /// An employee's progress record for one module, if any.
    pub async fn get_training_progress(
        &self,
        employee_id: Uuid,
        module_id: Uuid,
    ) -> ComplianceResult<Option<TrainingProgress>> {
        let row: Option<TrainingProgressRow> = sqlx::query_as(
            "SELECT * FROM training_progress WHERE employee_id = ? AND module_id = ?",
        )
        .bind(employee_id.to_string())
        .bind(module_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Insert or update the progress record for (employee, module) and
    /// return the stored record.
    ///
    /// A completed record is never overwritten, so a stale write arriving
    /// after completion leaves the completion in place.
    pub async fn save_training_progress(
        &self,
        progress: &TrainingProgress,
    ) -> ComplianceResult<TrainingProgress> {
        sqlx::query(
            r#"
            INSERT INTO training_progress (id, organization_id, employee_id, module_id, status,
                                           progress_percent, started_at, completed_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(employee_id, module_id) DO UPDATE SET
                status = excluded.status,
                progress_percent = excluded.progress_percent,
                started_at = excluded.started_at,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at
            WHERE training_progress.status != 'completed'
            "#,
        )
        .bind(progress.id.to_string())
        .bind(progress.organization_id.to_string())
        .bind(progress.employee_id.to_string())
        .bind(progress.module_id.to_string())
        .bind(progress.status.to_string())
        .bind(progress.progress_percent)
        .bind(progress.started_at.map(|t| t.to_rfc3339()))
        .bind(progress.completed_at.map(|t| t.to_rfc3339()))
        .bind(progress.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_training_progress(progress.employee_id, progress.module_id)
            .await?
            .ok_or_else(|| {
                ComplianceError::Internal("Training progress missing after save".to_string())
            })
    }

    /// Every module in the organization with one employee's progress.
    pub async fn list_module_progress(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> ComplianceResult<Vec<ModuleProgress>> {
        let rows: Vec<ModuleProgressRow> = sqlx::query_as(
            r#"
            SELECT
                m.id AS module_id,
                m.title,
                m.required,
                m.duration_minutes,
                p.status,
                p.progress_percent,
                p.completed_at
            FROM training_modules m
            LEFT JOIN training_progress p ON p.module_id = m.id AND p.employee_id = ?
            WHERE m.organization_id = ?
            ORDER BY m.created_at ASC, m.title ASC
            "#,
        )
        .bind(employee_id.to_string())
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Training summary for one employee.
    pub async fn training_summary(
        &self,
        organization_id: Uuid,
        employee_id: Uuid,
    ) -> ComplianceResult<TrainingSummary> {
        let modules = self.list_module_progress(organization_id, employee_id).await?;
        Ok(TrainingSummary::from_modules(&modules))
    }

    /// One summary row per active employee.
    pub async fn training_report(
        &self,
        organization_id: Uuid,
    ) -> ComplianceResult<Vec<EmployeeTrainingRow>> {
        let modules = self.list_training_modules(organization_id).await?;

        let employees = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT * FROM employees
            WHERE organization_id = ? AND status = 'active'
            ORDER BY last_name ASC, first_name ASC
            "#,
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|r| r.try_into())
        .collect::<ComplianceResult<Vec<Employee>>>()?;

        let progress: HashMap<(Uuid, Uuid), TrainingProgress> =
            sqlx::query_as::<_, TrainingProgressRow>(
                "SELECT * FROM training_progress WHERE organization_id = ?",
            )
            .bind(organization_id.to_string())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|r| {
                let p: TrainingProgress = r.try_into()?;
                Ok(((p.employee_id, p.module_id), p))
            })
            .collect::<ComplianceResult<_>>()?;

        Ok(employees
            .into_iter()
            .map(|employee| {
                let per_module: Vec<ModuleProgress> = modules
                    .iter()
                    .map(|module| {
                        let record = progress.get(&(employee.id, module.id));
                        ModuleProgress {
                            module_id: module.id,
                            title: module.title.clone(),
                            required: module.required,
                            duration_minutes: module.duration_minutes,
                            status: record
                                .map(|p| p.status)
                                .unwrap_or(TrainingStatus::NotStarted),
                            progress_percent: record.map(|p| p.progress_percent).unwrap_or(0),
                            completed_at: record.and_then(|p| p.completed_at),
                        }
                    })
                    .collect();

                EmployeeTrainingRow {
                    employee_id: employee.id,
                    employee_name: employee.full_name(),
                    email: employee.email,
                    summary: TrainingSummary::from_modules(&per_module),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::EmployeeStatus;
    use crate::storage::repository::tests::{seed_employee, seed_org, setup_test_db};

    use super::*;

    fn module(organization_id: Uuid, title: &str, required: bool) -> TrainingModule {
        TrainingModule::new(
            organization_id,
            title.to_string(),
            None,
            "## Lesson".to_string(),
            30,
            required,
        )
    }

    #[tokio::test]
    async fn test_progress_upsert_and_summary() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;
        let privacy = module(org.id, "Privacy Basics", true);
        let security = module(org.id, "Security Awareness", false);
        repo.create_training_module(&privacy).await.unwrap();
        repo.create_training_module(&security).await.unwrap();

        let mut progress = TrainingProgress::new(org.id, owner.id, privacy.id);
        progress.apply_progress(40, Utc::now());
        repo.save_training_progress(&progress).await.unwrap();

        // Second save for the same pair updates in place.
        progress.apply_progress(100, Utc::now());
        let mut duplicate = progress.clone();
        duplicate.id = Uuid::new_v4();
        repo.save_training_progress(&duplicate).await.unwrap();

        let stored = repo
            .get_training_progress(owner.id, privacy.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, progress.id);
        assert_eq!(stored.status, TrainingStatus::Completed);
        assert!(stored.started_at.is_some());

        let modules = repo.list_module_progress(org.id, owner.id).await.unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[1].status, TrainingStatus::NotStarted);

        let summary = repo.training_summary(org.id, owner.id).await.unwrap();
        assert_eq!(summary.total_modules, 2);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.not_started, 1);
        assert_eq!(summary.completion_percentage, 50);
        assert_eq!(summary.required_completion_percentage, 100);
    }

    #[tokio::test]
    async fn test_stale_progress_does_not_undo_completion() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;
        let privacy = module(org.id, "Privacy Basics", true);
        repo.create_training_module(&privacy).await.unwrap();

        let mut progress = TrainingProgress::new(org.id, owner.id, privacy.id);
        progress.apply_progress(40, Utc::now());
        repo.save_training_progress(&progress).await.unwrap();

        // Two concurrent updates read the same in-progress record.
        let mut first = repo
            .get_training_progress(owner.id, privacy.id)
            .await
            .unwrap()
            .unwrap();
        let mut second = first.clone();

        first.apply_progress(100, Utc::now());
        let completed = repo.save_training_progress(&first).await.unwrap();
        assert_eq!(completed.status, TrainingStatus::Completed);

        second.apply_progress(50, Utc::now());
        let stored = repo.save_training_progress(&second).await.unwrap();
        assert_eq!(stored.status, TrainingStatus::Completed);
        assert_eq!(stored.progress_percent, 100);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_report_covers_active_employees_only() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;
        repo.create_training_module(&module(org.id, "HIPAA 101", true))
            .await
            .unwrap();
        let invited = seed_employee(&repo, org.id, "pending@clinic.org").await;
        assert_eq!(invited.status, EmployeeStatus::Invited);

        let report = repo.training_report(org.id).await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].employee_id, owner.id);
        assert_eq!(report[0].summary.not_started, 1);
    }
}
