//! Route definitions for the API.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers::{
    assignments, audit, auth, bundles, dashboard, departments, employees, health, incidents,
    markdown, organizations, policies, training,
};
use crate::auth::require_jwt;
use crate::logging::http_trace_layer;
use crate::AppState;

/// Security scheme modifier for OpenAPI.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::accept_invite,
        organizations::create_organization,
        organizations::list_organizations,
        organizations::get_organization,
        organizations::update_organization,
        organizations::delete_organization,
        departments::list_departments,
        departments::create_department,
        departments::update_department,
        departments::delete_department,
        employees::list_employees,
        employees::create_employee,
        employees::get_employee,
        employees::update_employee,
        employees::delete_employee,
        employees::reinvite_employee,
        policies::list_policies,
        policies::create_policy,
        policies::get_policy,
        policies::update_policy,
        policies::delete_policy,
        markdown::preview_markdown,
        bundles::list_bundles,
        bundles::create_bundle,
        bundles::get_bundle,
        bundles::update_bundle,
        bundles::delete_bundle,
        bundles::assign_bundle,
        assignments::list_assignments,
        assignments::my_assignments,
        assignments::get_assignment,
        assignments::view_assignment,
        assignments::attest_assignment,
        assignments::delete_assignment,
        incidents::list_incidents,
        incidents::create_incident,
        incidents::get_incident,
        incidents::update_incident,
        incidents::delete_incident,
        training::list_modules,
        training::create_module,
        training::get_module,
        training::update_module,
        training::delete_module,
        training::list_progress,
        training::update_progress,
        training::training_summary,
        training::training_report,
        dashboard::compliance_dashboard,
        dashboard::my_dashboard,
        audit::list_audit_log,
    ),
    components(schemas(
        crate::api::types::HealthResponse,
        crate::api::types::RegisterRequest,
        crate::api::types::LoginRequest,
        crate::api::types::AcceptInviteRequest,
        crate::api::types::AuthResponse,
        crate::api::types::MeResponse,
        crate::api::types::CreateOrganizationRequest,
        crate::api::types::UpdateOrganizationRequest,
        crate::api::types::ListOrganizationsResponse,
        crate::api::types::CreateDepartmentRequest,
        crate::api::types::UpdateDepartmentRequest,
        crate::api::types::ListDepartmentsResponse,
        crate::api::types::ListEmployeesResponse,
        crate::api::types::CreateEmployeeRequest,
        crate::api::types::InviteResponse,
        crate::api::types::UpdateEmployeeRequest,
        crate::api::types::ListPoliciesResponse,
        crate::api::types::CreatePolicyRequest,
        crate::api::types::UpdatePolicyRequest,
        crate::api::types::PolicyResponse,
        crate::api::types::MarkdownPreviewRequest,
        crate::api::types::MarkdownPreviewResponse,
        crate::api::types::CreateBundleRequest,
        crate::api::types::UpdateBundleRequest,
        crate::api::types::ListBundlesResponse,
        crate::api::types::AssignBundleRequest,
        crate::api::types::AssignBundleResponse,
        crate::api::types::ListAssignmentsResponse,
        crate::api::types::AssignmentDetailResponse,
        crate::api::types::AttestRequest,
        crate::api::types::ListIncidentsResponse,
        crate::api::types::CreateIncidentRequest,
        crate::api::types::UpdateIncidentRequest,
        crate::api::types::IncidentResponse,
        crate::api::types::CreateModuleRequest,
        crate::api::types::UpdateModuleRequest,
        crate::api::types::ListModulesResponse,
        crate::api::types::ModuleResponse,
        crate::api::types::ProgressListResponse,
        crate::api::types::UpdateProgressRequest,
        crate::api::types::TrainingSummaryResponse,
        crate::api::types::TrainingReportResponse,
        crate::api::types::AuditLogResponse,
        crate::domain::User,
        crate::domain::Organization,
        crate::domain::OrganizationMembership,
        crate::domain::EntityType,
        crate::domain::Department,
        crate::domain::DepartmentSummary,
        crate::domain::Employee,
        crate::domain::OrgRole,
        crate::domain::EmployeeStatus,
        crate::domain::Policy,
        crate::domain::PolicyCategory,
        crate::domain::Applicability,
        crate::domain::PolicyStatus,
        crate::domain::PolicyBundle,
        crate::domain::BundleSummary,
        crate::domain::BundleDetails,
        crate::domain::Assignment,
        crate::domain::AssignmentStatus,
        crate::domain::AssignmentSummary,
        crate::domain::Incident,
        crate::domain::IncidentType,
        crate::domain::Severity,
        crate::domain::IncidentStatus,
        crate::domain::TrainingModule,
        crate::domain::TrainingStatus,
        crate::domain::TrainingProgress,
        crate::domain::ModuleProgress,
        crate::domain::TrainingSummary,
        crate::domain::EmployeeTrainingRow,
        crate::domain::EmployeeStats,
        crate::domain::AttestationStats,
        crate::domain::SeverityCount,
        crate::domain::IncidentStats,
        crate::domain::TrainingStats,
        crate::domain::ComplianceDashboard,
        crate::domain::EmployeeDashboard,
        crate::domain::AuditEvent,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health and status endpoints"),
        (name = "auth", description = "Accounts, login and invitations"),
        (name = "organizations", description = "Organizations the caller belongs to"),
        (name = "departments", description = "Department management"),
        (name = "employees", description = "Employee directory and invitations"),
        (name = "policies", description = "Policy documents"),
        (name = "markdown", description = "Markdown rendering"),
        (name = "policy-bundles", description = "Policy bundles and assignment"),
        (name = "assignments", description = "Attestation assignments"),
        (name = "incidents", description = "Incident reporting"),
        (name = "training", description = "Training modules and progress"),
        (name = "dashboard", description = "Compliance metrics"),
        (name = "audit", description = "Audit log")
    ),
    info(
        title = "Compliance Core API",
        version = "0.1.0",
        description = "HIPAA compliance backend - policy attestation, incident reporting, training tracking and dashboards",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the API router.
///
/// Everything except health, registration, login and invite acceptance
/// requires a bearer token. Organization-scoped handlers additionally read
/// the `X-Organization-Id` header.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/markdown/preview", post(markdown::preview_markdown))
        // Organizations
        .route(
            "/api/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/api/organizations/{id}",
            get(organizations::get_organization)
                .patch(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        // Departments
        .route(
            "/api/departments",
            get(departments::list_departments).post(departments::create_department),
        )
        .route(
            "/api/departments/{id}",
            axum::routing::patch(departments::update_department)
                .delete(departments::delete_department),
        )
        // Employees
        .route(
            "/api/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route(
            "/api/employees/{id}",
            get(employees::get_employee)
                .patch(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route(
            "/api/employees/{id}/reinvite",
            post(employees::reinvite_employee),
        )
        // Policies
        .route(
            "/api/policies",
            get(policies::list_policies).post(policies::create_policy),
        )
        .route(
            "/api/policies/{id}",
            get(policies::get_policy)
                .patch(policies::update_policy)
                .delete(policies::delete_policy),
        )
        // Policy bundles
        .route(
            "/api/policy-bundles",
            get(bundles::list_bundles).post(bundles::create_bundle),
        )
        .route(
            "/api/policy-bundles/{id}",
            get(bundles::get_bundle)
                .patch(bundles::update_bundle)
                .delete(bundles::delete_bundle),
        )
        .route(
            "/api/policy-bundles/{id}/assign",
            post(bundles::assign_bundle),
        )
        // Assignments
        .route("/api/assignments", get(assignments::list_assignments))
        .route("/api/assignments/mine", get(assignments::my_assignments))
        .route(
            "/api/assignments/{id}",
            get(assignments::get_assignment).delete(assignments::delete_assignment),
        )
        .route(
            "/api/assignments/{id}/view",
            post(assignments::view_assignment),
        )
        .route(
            "/api/assignments/{id}/attest",
            post(assignments::attest_assignment),
        )
        // Incidents
        .route(
            "/api/incidents",
            get(incidents::list_incidents).post(incidents::create_incident),
        )
        .route(
            "/api/incidents/{id}",
            get(incidents::get_incident)
                .patch(incidents::update_incident)
                .delete(incidents::delete_incident),
        )
        // Training
        .route(
            "/api/training/modules",
            get(training::list_modules).post(training::create_module),
        )
        .route(
            "/api/training/modules/{id}",
            get(training::get_module)
                .patch(training::update_module)
                .delete(training::delete_module),
        )
        .route("/api/training/progress", get(training::list_progress))
        .route(
            "/api/training/progress/{module_id}",
            put(training::update_progress),
        )
        .route("/api/training/summary", get(training::training_summary))
        .route("/api/training/report", get(training::training_report))
        // Dashboards and audit
        .route("/api/dashboard", get(dashboard::compliance_dashboard))
        .route("/api/dashboard/me", get(dashboard::my_dashboard))
        .route("/api/audit-log", get(audit::list_audit_log))
        .layer(middleware::from_fn_with_state(
            state.jwt_manager.clone(),
            require_jwt,
        ))
        .with_state(state.clone());

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/accept-invite", post(auth::accept_invite))
        .with_state(state);

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(http_trace_layer())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth::{JwtManager, ORGANIZATION_HEADER};
    use crate::config::ComplianceConfig;
    use crate::storage::ComplianceRepository;

    use super::*;

    const PASSWORD: &str = "correct-horse-battery";

    async fn test_app() -> Router {
        crate::logging::init_test();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let repository = ComplianceRepository::new(pool);
        repository.init_schema().await.unwrap();

        build_router(AppState {
            repository,
            jwt_manager: JwtManager::new("test-secret", "compliance-core".to_string(), 1),
            compliance: ComplianceConfig::default(),
            min_password_length: 10,
        })
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        organization_id: Option<Uuid>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(organization_id) = organization_id {
            builder = builder.header(ORGANIZATION_HEADER, organization_id.to_string());
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            tokio_test::assert_ok!(serde_json::from_slice(&bytes))
        };
        (status, value)
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            None,
            Some(json!({ "email": email, "password": PASSWORD, "name": "Olive Owner" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    /// Register an owner and create their organization.
    async fn owner_with_org(app: &Router) -> (String, Uuid) {
        let token = register(app, "owner@clinic.org").await;
        let (status, org) = send(
            app,
            Method::POST,
            "/api/organizations",
            Some(&token),
            None,
            Some(json!({ "name": "Sunrise Clinic", "entity_type": "covered_entity" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(org["slug"], "sunrise-clinic");
        let id = Uuid::parse_str(org["id"].as_str().unwrap()).unwrap();
        (token, id)
    }

    /// Invite an employee and accept the invitation; returns their token and employee ID.
    async fn onboard_employee(app: &Router, owner: &str, org: Uuid) -> (String, String) {
        onboard(app, owner, org, "nurse@clinic.org", "employee").await
    }

    async fn onboard(
        app: &Router,
        inviter: &str,
        org: Uuid,
        email: &str,
        role: &str,
    ) -> (String, String) {
        let (status, invite) = send(
            app,
            Method::POST,
            "/api/employees",
            Some(inviter),
            Some(org),
            Some(json!({
                "email": email,
                "first_name": "Nora",
                "last_name": "Nurse",
                "role": role
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(invite["employee"]["status"], "invited");
        let employee_id = invite["employee"]["id"].as_str().unwrap().to_string();

        let (status, accepted) = send(
            app,
            Method::POST,
            "/api/auth/accept-invite",
            None,
            None,
            Some(json!({ "token": invite["invite_token"], "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(accepted["user"]["name"], "Nora Nurse");

        (accepted["token"].as_str().unwrap().to_string(), employee_id)
    }

    /// The caller's employee ID in their first organization.
    async fn own_employee_id(app: &Router, token: &str) -> String {
        let (_, me) = send(app, Method::GET, "/api/auth/me", Some(token), None, None).await;
        me["organizations"][0]["employee_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/api/health", None, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let app = test_app().await;
        let (status, body) = send(&app, Method::GET, "/api/policies", None, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_TOKEN");

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/auth/me",
            Some("not-a-jwt"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let app = test_app().await;
        register(&app, "owner@clinic.org").await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            None,
            Some(json!({ "email": "owner@clinic.org", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            None,
            Some(json!({ "email": "OWNER@clinic.org", "password": PASSWORD })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["expires_in"], 3600);
    }

    #[tokio::test]
    async fn test_organization_header_checks() {
        let app = test_app().await;
        let (token, org) = owner_with_org(&app).await;

        let (status, _) = send(&app, Method::GET, "/api/employees", Some(&token), None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/employees",
            Some(&token),
            Some(Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/employees",
            Some(&token),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["employees"][0]["role"], "owner");

        let (status, me) = send(&app, Method::GET, "/api/auth/me", Some(&token), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["organizations"][0]["slug"], "sunrise-clinic");
    }

    #[tokio::test]
    async fn test_employees_cannot_manage_policies() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;
        let (employee, _) = onboard_employee(&app, &owner, org).await;

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/policies",
            Some(&employee),
            Some(org),
            Some(json!({ "title": "Privacy", "content": "# Privacy" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/dashboard",
            Some(&employee),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::DELETE,
            &format!("/api/organizations/{}", org),
            Some(&employee),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_policy_attestation_flow() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;
        let (employee, employee_id) = onboard_employee(&app, &owner, org).await;

        let (status, policy) = send(
            &app,
            Method::POST,
            "/api/policies",
            Some(&owner),
            Some(org),
            Some(json!({
                "title": "Minimum Necessary",
                "category": "privacy",
                "content": "Use the **minimum** PHI needed."
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(policy["version"], 1);
        let policy_id = policy["id"].as_str().unwrap().to_string();

        // Drafts are hidden from employees.
        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/policies/{}", policy_id),
            Some(&employee),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, published) = send(
            &app,
            Method::PATCH,
            &format!("/api/policies/{}", policy_id),
            Some(&owner),
            Some(org),
            Some(json!({ "status": "published" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(published["status"], "published");

        let (status, bundle) = send(
            &app,
            Method::POST,
            "/api/policy-bundles",
            Some(&owner),
            Some(org),
            Some(json!({ "name": "Onboarding", "policy_ids": [policy_id, policy_id] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(bundle["policy_ids"].as_array().unwrap().len(), 1);
        let bundle_id = bundle["id"].as_str().unwrap().to_string();

        let assign_uri = format!("/api/policy-bundles/{}/assign", bundle_id);
        let (status, assigned) = send(
            &app,
            Method::POST,
            &assign_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "employee_ids": [employee_id] })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(assigned["created"], 1);
        assert_eq!(assigned["skipped"], 0);
        let assignment_id = assigned["assignments"][0]["id"].as_str().unwrap().to_string();

        // A second assignment run skips the open assignment.
        let (_, again) = send(
            &app,
            Method::POST,
            &assign_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "employee_ids": [employee_id] })),
        )
        .await;
        assert_eq!(again["created"], 0);
        assert_eq!(again["skipped"], 1);

        let (status, mine) = send(
            &app,
            Method::GET,
            "/api/assignments/mine",
            Some(&employee),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mine["assignments"][0]["bundle_name"], "Onboarding");
        assert_eq!(mine["assignments"][0]["is_overdue"], false);

        let (status, detail) = send(
            &app,
            Method::GET,
            &format!("/api/assignments/{}", assignment_id),
            Some(&employee),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(detail["policies"][0]["content_html"]
            .as_str()
            .unwrap()
            .contains("<strong>minimum</strong>"));

        let attest_uri = format!("/api/assignments/{}/attest", assignment_id);
        let (status, _) = send(
            &app,
            Method::POST,
            &attest_uri,
            Some(&employee),
            Some(org),
            Some(json!({ "signature": "Nora Nurse" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Only the assignee can attest.
        let (status, _) = send(
            &app,
            Method::POST,
            &attest_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "signature": "Olive Owner", "acknowledged": true })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, attested) = send(
            &app,
            Method::POST,
            &attest_uri,
            Some(&employee),
            Some(org),
            Some(json!({ "signature": "Nora Nurse", "acknowledged": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(attested["status"], "attested");
        assert!(attested["viewed_at"].is_string());

        let (status, _) = send(
            &app,
            Method::POST,
            &attest_uri,
            Some(&employee),
            Some(org),
            Some(json!({ "signature": "Nora Nurse", "acknowledged": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, dashboard) = send(
            &app,
            Method::GET,
            "/api/dashboard",
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dashboard["attestations"]["completion_rate"], 100);
        assert_eq!(dashboard["compliance_score"], 100);

        let (status, log) = send(
            &app,
            Method::GET,
            "/api/audit-log?entity_type=assignment",
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(log["events"][0]["action"], "assignment.attested");
    }

    #[tokio::test]
    async fn test_incident_visibility_and_deadline() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;
        let (employee, _) = onboard_employee(&app, &owner, org).await;

        let (status, incident) = send(
            &app,
            Method::POST,
            "/api/incidents",
            Some(&owner),
            Some(org),
            Some(json!({
                "title": "Stolen laptop",
                "description": "Laptop with patient records stolen",
                "severity": "high",
                "phi_involved": true,
                "discovered_at": "2026-03-01T09:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(incident["notification_deadline"], "2026-04-30T09:00:00Z");
        let incident_id = incident["id"].as_str().unwrap().to_string();

        let (_, listed) = send(
            &app,
            Method::GET,
            "/api/incidents",
            Some(&employee),
            Some(org),
            None,
        )
        .await;
        assert_eq!(listed["total"], 0);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/incidents/{}", incident_id),
            Some(&employee),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/incidents/{}", incident_id),
            Some(&owner),
            Some(org),
            Some(json!({ "status": "closed" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let incident_uri = format!("/api/incidents/{}", incident_id);
        let (status, resolved) = send(
            &app,
            Method::PATCH,
            &incident_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "status": "resolved", "resolution_notes": "Device wiped remotely" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(resolved["resolved_at"].is_string());

        let (status, _) = send(
            &app,
            Method::PATCH,
            &incident_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "status": "closed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // Closed incidents are frozen, not just their status.
        let (status, _) = send(
            &app,
            Method::PATCH,
            &incident_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "severity": "low", "phi_involved": false })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, closed) = send(
            &app,
            Method::GET,
            &incident_uri,
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(closed["severity"], "high");
        assert_eq!(closed["notification_deadline"], "2026-04-30T09:00:00Z");
    }

    #[tokio::test]
    async fn test_incident_timestamps_must_be_plausible() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;

        for discovered_at in ["+200000-01-01T00:00:00Z", "1850-06-01T00:00:00Z"] {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/incidents",
                Some(&owner),
                Some(org),
                Some(json!({
                    "title": "Misfiled chart",
                    "description": "Chart stored in the wrong cabinet",
                    "phi_involved": true,
                    "discovered_at": discovered_at
                })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", discovered_at);
        }

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/incidents",
            Some(&owner),
            Some(org),
            Some(json!({
                "title": "Misfiled chart",
                "description": "Chart stored in the wrong cabinet",
                "occurred_at": "0001-01-01T00:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, listed) = send(
            &app,
            Method::GET,
            "/api/incidents",
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["total"], 0);

        let (status, _) = send(
            &app,
            Method::GET,
            "/api/dashboard",
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_owner_role_is_guarded() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;
        let (admin, _) = onboard(&app, &owner, org, "admin@clinic.org", "admin").await;
        let (_, second_owner) = onboard(&app, &owner, org, "partner@clinic.org", "owner").await;
        let (_, nurse) = onboard_employee(&app, &owner, org).await;
        let second_owner_uri = format!("/api/employees/{}", second_owner);

        // Admins cannot create, promote, demote, deactivate or remove owners.
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/employees",
            Some(&admin),
            Some(org),
            Some(json!({
                "email": "another@clinic.org",
                "first_name": "Ann",
                "last_name": "Other",
                "role": "owner"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/employees/{}", nurse),
            Some(&admin),
            Some(org),
            Some(json!({ "role": "owner" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        for change in [json!({ "role": "admin" }), json!({ "status": "inactive" })] {
            let (status, _) = send(
                &app,
                Method::PATCH,
                &second_owner_uri,
                Some(&admin),
                Some(org),
                Some(change),
            )
            .await;
            assert_eq!(status, StatusCode::FORBIDDEN);
        }

        let (status, _) = send(
            &app,
            Method::DELETE,
            &second_owner_uri,
            Some(&admin),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, unchanged) = send(
            &app,
            Method::GET,
            &second_owner_uri,
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(unchanged["role"], "owner");
        assert_eq!(unchanged["status"], "active");

        // Owners may revoke the role from another owner.
        let (status, demoted) = send(
            &app,
            Method::PATCH,
            &second_owner_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(demoted["role"], "admin");
    }

    #[tokio::test]
    async fn test_last_owner_cannot_step_down() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;
        let owner_uri = format!("/api/employees/{}", own_employee_id(&app, &owner).await);

        for change in [json!({ "role": "admin" }), json!({ "status": "inactive" })] {
            let (status, _) = send(
                &app,
                Method::PATCH,
                &owner_uri,
                Some(&owner),
                Some(org),
                Some(change),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        let (status, _) = send(
            &app,
            Method::DELETE,
            &owner_uri,
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // With a second owner in place the first one may step down.
        let (second, second_id) =
            onboard(&app, &owner, org, "partner@clinic.org", "owner").await;
        let (status, stepped_down) = send(
            &app,
            Method::PATCH,
            &owner_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stepped_down["role"], "admin");

        // The remaining owner is now the last one.
        let (status, _) = send(
            &app,
            Method::PATCH,
            &format!("/api/employees/{}", second_id),
            Some(&second),
            Some(org),
            Some(json!({ "status": "inactive" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_published_content_change_bumps_version() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;

        let (_, policy) = send(
            &app,
            Method::POST,
            "/api/policies",
            Some(&owner),
            Some(org),
            Some(json!({ "title": "Workstation Use", "content": "Lock your screen." })),
        )
        .await;
        let policy_uri = format!("/api/policies/{}", policy["id"].as_str().unwrap());

        // Draft edits keep the version.
        let (_, draft) = send(
            &app,
            Method::PATCH,
            &policy_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "content": "Lock your screen when away." })),
        )
        .await;
        assert_eq!(draft["version"], 1);

        send(
            &app,
            Method::PATCH,
            &policy_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "status": "published" })),
        )
        .await;

        let (status, revised) = send(
            &app,
            Method::PATCH,
            &policy_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "content": "Lock your screen **every time** you step away." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revised["version"], 2);
        assert!(revised["content_html"]
            .as_str()
            .unwrap()
            .contains("<strong>every time</strong>"));

        // Resending identical content is not a revision.
        let (_, same) = send(
            &app,
            Method::PATCH,
            &policy_uri,
            Some(&owner),
            Some(org),
            Some(json!({ "content": "Lock your screen **every time** you step away." })),
        )
        .await;
        assert_eq!(same["version"], 2);
    }

    #[tokio::test]
    async fn test_bundle_rejects_unknown_policies() {
        let app = test_app().await;
        let (owner, org) = owner_with_org(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/policy-bundles",
            Some(&owner),
            Some(org),
            Some(json!({ "name": "Onboarding", "policy_ids": [Uuid::new_v4()] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");

        let (_, bundles) = send(
            &app,
            Method::GET,
            "/api/policy-bundles",
            Some(&owner),
            Some(org),
            None,
        )
        .await;
        assert_eq!(bundles["bundles"].as_array().unwrap().len(), 0);
    }
}
