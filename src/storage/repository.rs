//! Repository layer for database operations.
//!
//! Every org-owned query is filtered by `organization_id`; a record that
//! exists in another organization is reported as not found.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use crate::domain::{
    AuditEvent, Department, DepartmentSummary, Employee, EmployeeFilter, EmployeeStatus,
    Organization, OrganizationMembership, User,
};
use crate::error::{ComplianceError, ComplianceResult};
use crate::storage::models::{
    AuditEventRow, DepartmentRow, EmployeeRow, MembershipRow, OrganizationRow, UserRow,
};

/// Repository for all Compliance Core database operations.
#[derive(Clone)]
pub struct ComplianceRepository {
    pub(super) pool: SqlitePool,
}

impl ComplianceRepository {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl ComplianceRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the database schema.
    pub async fn init_schema(&self) -> ComplianceResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                entity_type TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS departments (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
                UNIQUE(organization_id, name)
            );

            CREATE TABLE IF NOT EXISTS employees (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                user_id TEXT,
                email TEXT NOT NULL,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                job_title TEXT,
                department_id TEXT,
                role TEXT NOT NULL DEFAULT 'employee',
                status TEXT NOT NULL DEFAULT 'invited',
                invite_token_hash TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE SET NULL,
                FOREIGN KEY (department_id) REFERENCES departments(id) ON DELETE SET NULL,
                UNIQUE(organization_id, email),
                UNIQUE(organization_id, user_id)
            );

            CREATE INDEX IF NOT EXISTS idx_employees_user_id ON employees(user_id);
            CREATE INDEX IF NOT EXISTS idx_employees_department_id ON employees(department_id);
            CREATE INDEX IF NOT EXISTS idx_employees_invite_token_hash ON employees(invite_token_hash);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS policies (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                applies_to TEXT NOT NULL,
                content TEXT NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL DEFAULT 'draft',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_policies_organization_id ON policies(organization_id);

            CREATE TABLE IF NOT EXISTS policy_bundles (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS bundle_policies (
                bundle_id TEXT NOT NULL,
                policy_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                PRIMARY KEY (bundle_id, policy_id),
                FOREIGN KEY (bundle_id) REFERENCES policy_bundles(id) ON DELETE CASCADE,
                FOREIGN KEY (policy_id) REFERENCES policies(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS assignments (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                bundle_id TEXT NOT NULL,
                employee_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                due_date TEXT,
                signature TEXT,
                assigned_by TEXT NOT NULL,
                assigned_at TEXT NOT NULL,
                viewed_at TEXT,
                attested_at TEXT,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
                FOREIGN KEY (bundle_id) REFERENCES policy_bundles(id) ON DELETE CASCADE,
                FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_assignments_organization_id ON assignments(organization_id);
            CREATE INDEX IF NOT EXISTS idx_assignments_employee_id ON assignments(employee_id);
            CREATE INDEX IF NOT EXISTS idx_assignments_bundle_id ON assignments(bundle_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS incidents (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                reported_by TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                incident_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'open',
                phi_involved INTEGER NOT NULL DEFAULT 0,
                affected_individuals INTEGER,
                occurred_at TEXT,
                discovered_at TEXT NOT NULL,
                resolution_notes TEXT,
                resolved_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_incidents_organization_id ON incidents(organization_id);
            CREATE INDEX IF NOT EXISTS idx_incidents_created_at ON incidents(created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS training_modules (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                content TEXT NOT NULL,
                duration_minutes INTEGER NOT NULL DEFAULT 0,
                required INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS training_progress (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                employee_id TEXT NOT NULL,
                module_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'not_started',
                progress_percent INTEGER NOT NULL DEFAULT 0,
                started_at TEXT,
                completed_at TEXT,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE,
                FOREIGN KEY (employee_id) REFERENCES employees(id) ON DELETE CASCADE,
                FOREIGN KEY (module_id) REFERENCES training_modules(id) ON DELETE CASCADE,
                UNIQUE(employee_id, module_id)
            );

            CREATE TABLE IF NOT EXISTS audit_events (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                actor_employee_id TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                details TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_audit_events_org_created ON audit_events(organization_id, created_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database schema initialized");
        Ok(())
    }

    /// Check database connectivity.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    // ==================== Users ====================

    /// Create a new user.
    pub async fn create_user(&self, user: &User) -> ComplianceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: Uuid) -> ComplianceResult<User> {
        let row: UserRow = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ComplianceError::NotFound(format!("User {} not found", id)))?;

        row.try_into()
    }

    /// Get a user by email (case-insensitive).
    pub async fn get_user_by_email(&self, email: &str) -> ComplianceResult<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Organizations where the user has an active employee record.
    pub async fn get_user_memberships(
        &self,
        user_id: Uuid,
    ) -> ComplianceResult<Vec<OrganizationMembership>> {
        let rows: Vec<MembershipRow> = sqlx::query_as(
            r#"
            SELECT o.id AS organization_id, o.name, o.slug, e.id AS employee_id, e.role
            FROM organizations o
            JOIN employees e ON o.id = e.organization_id
            WHERE e.user_id = ? AND e.status = 'active'
            ORDER BY o.name ASC
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    // ==================== Organizations ====================

    /// Create an organization together with its owner's employee record.
    pub async fn create_organization(
        &self,
        organization: &Organization,
        owner: &Employee,
    ) -> ComplianceResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, slug, entity_type, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(organization.id.to_string())
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(organization.entity_type.to_string())
        .bind(&organization.description)
        .bind(organization.created_at.to_rfc3339())
        .bind(organization.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO employees (id, organization_id, user_id, email, first_name, last_name,
                                   job_title, department_id, role, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(owner.id.to_string())
        .bind(owner.organization_id.to_string())
        .bind(owner.user_id.map(|u| u.to_string()))
        .bind(&owner.email)
        .bind(&owner.first_name)
        .bind(&owner.last_name)
        .bind(&owner.job_title)
        .bind(owner.department_id.map(|d| d.to_string()))
        .bind(owner.role.to_string())
        .bind(owner.status.to_string())
        .bind(owner.created_at.to_rfc3339())
        .bind(owner.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Get an organization by ID.
    pub async fn get_organization(&self, id: Uuid) -> ComplianceResult<Organization> {
        let row: OrganizationRow = sqlx::query_as("SELECT * FROM organizations WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ComplianceError::NotFound(format!("Organization {} not found", id)))?;

        row.try_into()
    }

    /// Find an organization by slug.
    pub async fn get_organization_by_slug(
        &self,
        slug: &str,
    ) -> ComplianceResult<Option<Organization>> {
        let row: Option<OrganizationRow> =
            sqlx::query_as("SELECT * FROM organizations WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Persist changes to an organization's name, slug, entity type and description.
    pub async fn update_organization(&self, organization: &Organization) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET name = ?, slug = ?, entity_type = ?, description = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(organization.entity_type.to_string())
        .bind(&organization.description)
        .bind(organization.updated_at.to_rfc3339())
        .bind(organization.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Organization {} not found",
                organization.id
            )));
        }

        Ok(())
    }

    /// Delete an organization and everything it owns.
    pub async fn delete_organization(&self, id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Organization {} not found",
                id
            )));
        }

        Ok(())
    }

    // ==================== Departments ====================

    /// Create a department.
    pub async fn create_department(&self, department: &Department) -> ComplianceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO departments (id, organization_id, name, description, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(department.id.to_string())
        .bind(department.organization_id.to_string())
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.created_at.to_rfc3339())
        .bind(department.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get a department within an organization.
    pub async fn get_department(
        &self,
        organization_id: Uuid,
        id: Uuid,
    ) -> ComplianceResult<Department> {
        let row: DepartmentRow =
            sqlx::query_as("SELECT * FROM departments WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| ComplianceError::NotFound(format!("Department {} not found", id)))?;

        row.try_into()
    }

    /// Find a department by name (case-insensitive) within an organization.
    pub async fn find_department_by_name(
        &self,
        organization_id: Uuid,
        name: &str,
    ) -> ComplianceResult<Option<Department>> {
        let row: Option<DepartmentRow> = sqlx::query_as(
            "SELECT * FROM departments WHERE organization_id = ? AND lower(name) = lower(?)",
        )
        .bind(organization_id.to_string())
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// List departments with their employee counts.
    pub async fn list_departments(
        &self,
        organization_id: Uuid,
    ) -> ComplianceResult<Vec<DepartmentSummary>> {
        let rows: Vec<DepartmentRow> =
            sqlx::query_as("SELECT * FROM departments WHERE organization_id = ? ORDER BY name ASC")
                .bind(organization_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        let counts: HashMap<String, i64> = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT department_id, COUNT(*)
            FROM employees
            WHERE organization_id = ? AND department_id IS NOT NULL AND status != 'inactive'
            GROUP BY department_id
            "#,
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        rows.into_iter()
            .map(|row| {
                let employee_count = counts.get(&row.id).copied().unwrap_or(0);
                Ok(DepartmentSummary {
                    department: row.try_into()?,
                    employee_count,
                })
            })
            .collect()
    }

    /// Persist a department's name and description.
    pub async fn update_department(&self, department: &Department) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE departments SET name = ?, description = ?, updated_at = ?
            WHERE id = ? AND organization_id = ?
            "#,
        )
        .bind(&department.name)
        .bind(&department.description)
        .bind(department.updated_at.to_rfc3339())
        .bind(department.id.to_string())
        .bind(department.organization_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Department {} not found",
                department.id
            )));
        }

        Ok(())
    }

    /// Delete a department; its employees keep their records without a department.
    pub async fn delete_department(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query("DELETE FROM departments WHERE id = ? AND organization_id = ?")
            .bind(id.to_string())
            .bind(organization_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Department {} not found",
                id
            )));
        }

        Ok(())
    }

    // ==================== Employees ====================

    /// Create an employee, optionally with the hash of a pending invitation token.
    pub async fn create_employee(
        &self,
        employee: &Employee,
        invite_token_hash: Option<&str>,
    ) -> ComplianceResult<()> {
        sqlx::query(
            r#"
            INSERT INTO employees (id, organization_id, user_id, email, first_name, last_name,
                                   job_title, department_id, role, status, invite_token_hash,
                                   created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee.id.to_string())
        .bind(employee.organization_id.to_string())
        .bind(employee.user_id.map(|u| u.to_string()))
        .bind(&employee.email)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.job_title)
        .bind(employee.department_id.map(|d| d.to_string()))
        .bind(employee.role.to_string())
        .bind(employee.status.to_string())
        .bind(invite_token_hash)
        .bind(employee.created_at.to_rfc3339())
        .bind(employee.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an employee within an organization.
    pub async fn get_employee(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<Employee> {
        let row: EmployeeRow =
            sqlx::query_as("SELECT * FROM employees WHERE id = ? AND organization_id = ?")
                .bind(id.to_string())
                .bind(organization_id.to_string())
                .fetch_optional(&self.pool)
                .await?
                .ok_or_else(|| ComplianceError::NotFound(format!("Employee {} not found", id)))?;

        row.try_into()
    }

    /// Find the employee record linking a user to an organization.
    pub async fn find_employee_by_user(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
    ) -> ComplianceResult<Option<Employee>> {
        let row: Option<EmployeeRow> =
            sqlx::query_as("SELECT * FROM employees WHERE organization_id = ? AND user_id = ?")
                .bind(organization_id.to_string())
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Find an employee by email within an organization.
    pub async fn find_employee_by_email(
        &self,
        organization_id: Uuid,
        email: &str,
    ) -> ComplianceResult<Option<Employee>> {
        let row: Option<EmployeeRow> =
            sqlx::query_as("SELECT * FROM employees WHERE organization_id = ? AND email = ?")
                .bind(organization_id.to_string())
                .bind(email.trim().to_lowercase())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// Find the invited employee holding an invitation token hash.
    pub async fn find_employee_by_invite_hash(
        &self,
        token_hash: &str,
    ) -> ComplianceResult<Option<Employee>> {
        let row: Option<EmployeeRow> = sqlx::query_as(
            "SELECT * FROM employees WHERE invite_token_hash = ? AND status = 'invited'",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    /// List employees with filtering and pagination.
    pub async fn list_employees(
        &self,
        organization_id: Uuid,
        filter: &EmployeeFilter,
        limit: i64,
        offset: i64,
    ) -> ComplianceResult<(Vec<Employee>, i64)> {
        let mut conditions = vec!["organization_id = ?".to_string()];

        if filter.department_id.is_some() {
            conditions.push("department_id = ?".to_string());
        }
        if filter.status.is_some() {
            conditions.push("status = ?".to_string());
        }
        if filter.role.is_some() {
            conditions.push("role = ?".to_string());
        }
        if filter.search.is_some() {
            conditions.push(
                "(lower(first_name) LIKE ? OR lower(last_name) LIKE ? OR lower(email) LIKE ?)"
                    .to_string(),
            );
        }

        let where_clause = conditions.join(" AND ");
        let query = format!(
            "SELECT * FROM employees WHERE {} ORDER BY last_name ASC, first_name ASC LIMIT ? OFFSET ?",
            where_clause
        );
        let count_query = format!("SELECT COUNT(*) FROM employees WHERE {}", where_clause);

        let mut query_builder = sqlx::query_as::<_, EmployeeRow>(&query);
        let mut count_builder = sqlx::query_as::<_, (i64,)>(&count_query);

        query_builder = query_builder.bind(organization_id.to_string());
        count_builder = count_builder.bind(organization_id.to_string());

        if let Some(department) = filter.department_id {
            query_builder = query_builder.bind(department.to_string());
            count_builder = count_builder.bind(department.to_string());
        }
        if let Some(status) = filter.status {
            query_builder = query_builder.bind(status.to_string());
            count_builder = count_builder.bind(status.to_string());
        }
        if let Some(role) = filter.role {
            query_builder = query_builder.bind(role.to_string());
            count_builder = count_builder.bind(role.to_string());
        }
        if let Some(ref search) = filter.search {
            let pattern = format!("%{}%", search.trim().to_lowercase());
            query_builder = query_builder
                .bind(pattern.clone())
                .bind(pattern.clone())
                .bind(pattern.clone());
            count_builder = count_builder
                .bind(pattern.clone())
                .bind(pattern.clone())
                .bind(pattern);
        }

        query_builder = query_builder.bind(limit).bind(offset);

        let rows = query_builder.fetch_all(&self.pool).await?;
        let (total,) = count_builder.fetch_one(&self.pool).await?;

        let employees = rows
            .into_iter()
            .map(|r| r.try_into())
            .collect::<ComplianceResult<Vec<Employee>>>()?;
        Ok((employees, total))
    }

    /// Employees who can receive assignments (invited or active).
    pub async fn list_assignable_employees(
        &self,
        organization_id: Uuid,
    ) -> ComplianceResult<Vec<Employee>> {
        let rows: Vec<EmployeeRow> = sqlx::query_as(
            r#"
            SELECT * FROM employees
            WHERE organization_id = ? AND status != 'inactive'
            ORDER BY last_name ASC, first_name ASC
            "#,
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Persist an employee's editable fields.
    pub async fn update_employee(&self, employee: &Employee) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE employees
            SET first_name = ?, last_name = ?, job_title = ?, department_id = ?,
                role = ?, status = ?, updated_at = ?
            WHERE id = ? AND organization_id = ?
            "#,
        )
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.job_title)
        .bind(employee.department_id.map(|d| d.to_string()))
        .bind(employee.role.to_string())
        .bind(employee.status.to_string())
        .bind(employee.updated_at.to_rfc3339())
        .bind(employee.id.to_string())
        .bind(employee.organization_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!(
                "Employee {} not found",
                employee.id
            )));
        }

        Ok(())
    }

    /// Replace the invitation token hash of an invited employee.
    pub async fn set_invite_token_hash(
        &self,
        organization_id: Uuid,
        id: Uuid,
        token_hash: &str,
    ) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE employees SET invite_token_hash = ?, updated_at = ?
            WHERE id = ? AND organization_id = ? AND status = 'invited'
            "#,
        )
        .bind(token_hash)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .bind(organization_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::BadRequest(
                "Only invited employees can be re-invited".to_string(),
            ));
        }

        Ok(())
    }

    /// Link an invited employee to a user and activate the record.
    ///
    /// The invitation token is consumed.
    pub async fn accept_invite(&self, employee_id: Uuid, user_id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE employees
            SET user_id = ?, status = ?, invite_token_hash = NULL, updated_at = ?
            WHERE id = ? AND status = 'invited'
            "#,
        )
        .bind(user_id.to_string())
        .bind(EmployeeStatus::Active.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(employee_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::BadRequest(
                "Invitation is invalid or has already been used".to_string(),
            ));
        }

        Ok(())
    }

    /// Number of active owners in an organization.
    pub async fn count_active_owners(&self, organization_id: Uuid) -> ComplianceResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM employees WHERE organization_id = ? AND role = 'owner' AND status = 'active'",
        )
        .bind(organization_id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Delete an employee record.
    pub async fn delete_employee(&self, organization_id: Uuid, id: Uuid) -> ComplianceResult<()> {
        let result = sqlx::query("DELETE FROM employees WHERE id = ? AND organization_id = ?")
            .bind(id.to_string())
            .bind(organization_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ComplianceError::NotFound(format!("Employee {} not found", id)));
        }

        Ok(())
    }

    // ==================== Audit Log ====================

    /// Record an audit event.
    pub async fn record_audit_event(&self, event: &AuditEvent) -> ComplianceResult<()> {
        let details = event
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO audit_events (id, organization_id, actor_employee_id, action,
                                      entity_type, entity_id, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(event.organization_id.to_string())
        .bind(event.actor_employee_id.to_string())
        .bind(&event.action)
        .bind(&event.entity_type)
        .bind(event.entity_id.to_string())
        .bind(details)
        .bind(event.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List audit events, newest first.
    pub async fn list_audit_events(
        &self,
        organization_id: Uuid,
        entity_type: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> ComplianceResult<(Vec<AuditEvent>, i64)> {
        let (rows, total): (Vec<AuditEventRow>, (i64,)) = match entity_type {
            Some(entity_type) => {
                let rows = sqlx::query_as::<_, AuditEventRow>(
                    r#"
                    SELECT * FROM audit_events
                    WHERE organization_id = ? AND entity_type = ?
                    ORDER BY created_at DESC, rowid DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(organization_id.to_string())
                .bind(entity_type)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total = sqlx::query_as::<_, (i64,)>(
                    "SELECT COUNT(*) FROM audit_events WHERE organization_id = ? AND entity_type = ?",
                )
                .bind(organization_id.to_string())
                .bind(entity_type)
                .fetch_one(&self.pool)
                .await?;
                (rows, total)
            }
            None => {
                let rows = sqlx::query_as::<_, AuditEventRow>(
                    r#"
                    SELECT * FROM audit_events
                    WHERE organization_id = ?
                    ORDER BY created_at DESC, rowid DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(organization_id.to_string())
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                let total = sqlx::query_as::<_, (i64,)>(
                    "SELECT COUNT(*) FROM audit_events WHERE organization_id = ?",
                )
                        .bind(organization_id.to_string())
                        .fetch_one(&self.pool)
                        .await?;
                (rows, total)
            }
        };

        let events = rows
            .into_iter()
            .map(|r| r.try_into())
            .collect::<ComplianceResult<Vec<AuditEvent>>>()?;
        Ok((events, total.0))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{EntityType, OrgRole};
    use sqlx::sqlite::SqlitePoolOptions;

    pub(crate) async fn setup_test_db() -> ComplianceRepository {
        // A single connection keeps every query on the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database");
        let repo = ComplianceRepository::new(pool);
        repo.init_schema().await.expect("Failed to init schema");
        repo
    }

    /// Create a user, an organization and its active owner.
    pub(crate) async fn seed_org(repo: &ComplianceRepository) -> (Organization, Employee) {
        let email = format!("owner-{}@clinic.org", Uuid::new_v4().simple());
        let user = User::new(&email, Some("Olive Owner".to_string()), "x".into());
        repo.create_user(&user).await.unwrap();
        let org = Organization::new(
            format!("Clinic {}", Uuid::new_v4().simple()),
            EntityType::CoveredEntity,
            None,
        );
        let owner = Employee::active_for_user(
            org.id,
            user.id,
            user.email.clone(),
            user.name.as_deref(),
            OrgRole::Owner,
        );
        repo.create_organization(&org, &owner).await.unwrap();
        (org, owner)
    }

    /// Add an invited employee to an organization.
    pub(crate) async fn seed_employee(
        repo: &ComplianceRepository,
        organization_id: Uuid,
        email: &str,
    ) -> Employee {
        let employee = Employee::invited(
            organization_id,
            email.to_string(),
            "Erin".to_string(),
            "Employee".to_string(),
            OrgRole::Employee,
        );
        repo.create_employee(&employee, None).await.unwrap();
        employee
    }

    #[tokio::test]
    async fn test_organization_creation_links_owner() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;

        let fetched = repo.get_organization(org.id).await.unwrap();
        assert_eq!(fetched.slug, org.slug);

        let user_id = owner.user_id.unwrap();
        let memberships = repo.get_user_memberships(user_id).await.unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].role, OrgRole::Owner);
        assert_eq!(memberships[0].employee_id, owner.id);

        let found = repo.find_employee_by_user(org.id, user_id).await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(owner.id));
        assert_eq!(repo.count_active_owners(org.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_constraint_violation() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;

        let mut copy = Organization::new(org.name.clone(), EntityType::HybridEntity, None);
        copy.slug = org.slug.clone();
        let mut second_owner = owner.clone();
        second_owner.id = Uuid::new_v4();
        second_owner.organization_id = copy.id;

        let err = repo
            .create_organization(&copy, &second_owner)
            .await
            .unwrap_err();
        assert_eq!(err.status_and_code().1, "CONSTRAINT_VIOLATION");
        // The transaction rolled back the owner insert as well.
        assert!(repo.get_organization(copy.id).await.is_err());
    }

    #[tokio::test]
    async fn test_queries_are_scoped_to_organization() {
        let repo = setup_test_db().await;
        let (org_a, _) = seed_org(&repo).await;
        let (org_b, _) = seed_org(&repo).await;
        let employee = seed_employee(&repo, org_a.id, "staff@clinic.org").await;

        assert!(repo.get_employee(org_a.id, employee.id).await.is_ok());
        assert!(matches!(
            repo.get_employee(org_b.id, employee.id).await,
            Err(ComplianceError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete_employee(org_b.id, employee.id).await,
            Err(ComplianceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_employees_filters_and_counts() {
        let repo = setup_test_db().await;
        let (org, _) = seed_org(&repo).await;
        for i in 0..3 {
            seed_employee(&repo, org.id, &format!("nurse{}@clinic.org", i)).await;
        }

        let (all, total) = repo
            .list_employees(org.id, &EmployeeFilter::default(), 2, 0)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(total, 4);

        let filter = EmployeeFilter {
            status: Some(EmployeeStatus::Invited),
            search: Some("NURSE1".to_string()),
            ..Default::default()
        };
        let (matched, total) = repo.list_employees(org.id, &filter, 50, 0).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(matched[0].email, "nurse1@clinic.org");
    }

    #[tokio::test]
    async fn test_department_delete_detaches_employees() {
        let repo = setup_test_db().await;
        let (org, _) = seed_org(&repo).await;
        let department = Department::new(org.id, "Nursing".to_string(), None);
        repo.create_department(&department).await.unwrap();

        let mut employee = seed_employee(&repo, org.id, "rn@clinic.org").await;
        employee.department_id = Some(department.id);
        repo.update_employee(&employee).await.unwrap();

        let summaries = repo.list_departments(org.id).await.unwrap();
        assert_eq!(summaries[0].employee_count, 1);
        assert!(repo
            .find_department_by_name(org.id, "nursing")
            .await
            .unwrap()
            .is_some());

        repo.delete_department(org.id, department.id).await.unwrap();
        let reloaded = repo.get_employee(org.id, employee.id).await.unwrap();
        assert_eq!(reloaded.department_id, None);
    }

    #[tokio::test]
    async fn test_invite_acceptance_consumes_token() {
        let repo = setup_test_db().await;
        let (org, _) = seed_org(&repo).await;
        let employee = seed_employee(&repo, org.id, "new@clinic.org").await;
        repo.set_invite_token_hash(org.id, employee.id, "abc123")
            .await
            .unwrap();

        let found = repo.find_employee_by_invite_hash("abc123").await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(employee.id));

        let user = User::new("new@clinic.org", None, "x".into());
        repo.create_user(&user).await.unwrap();
        repo.accept_invite(employee.id, user.id).await.unwrap();

        let active = repo.get_employee(org.id, employee.id).await.unwrap();
        assert_eq!(active.status, EmployeeStatus::Active);
        assert_eq!(active.user_id, Some(user.id));
        assert!(repo
            .find_employee_by_invite_hash("abc123")
            .await
            .unwrap()
            .is_none());
        assert!(repo.accept_invite(employee.id, user.id).await.is_err());
    }

    #[tokio::test]
    async fn test_audit_events_newest_first() {
        let repo = setup_test_db().await;
        let (org, owner) = seed_org(&repo).await;

        for action in ["policy.created", "policy.updated"] {
            let event = AuditEvent::new(
                org.id,
                owner.id,
                action,
                "policy",
                Uuid::new_v4(),
                Some(serde_json::json!({"title": "Privacy"})),
            );
            repo.record_audit_event(&event).await.unwrap();
        }
        let other = AuditEvent::new(org.id, owner.id, "incident.created", "incident", Uuid::new_v4(), None);
        repo.record_audit_event(&other).await.unwrap();

        let (events, total) = repo
            .list_audit_events(org.id, Some("policy"), 10, 0)
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(events[0].action, "policy.updated");
        assert_eq!(events[0].details, Some(serde_json::json!({"title": "Privacy"})));

        let (_, total) = repo.list_audit_events(org.id, None, 10, 0).await.unwrap();
        assert_eq!(total, 3);
    }
}
