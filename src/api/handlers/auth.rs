//! Account registration, login and invitation acceptance.

use axum::{extract::State, http::StatusCode, Extension, Json};

use crate::api::handlers::{optional_text, validate_email, write_audit};
use crate::api::types::{
    AcceptInviteRequest, AuthResponse, LoginRequest, MeResponse, RegisterRequest,
};
use crate::auth::{
    hash_invite_token, hash_password, validate_password_strength, verify_password, Claims,
    INVITE_TOKEN_PREFIX,
};
use crate::domain::{AuditEvent, User};
use crate::error::{ComplianceError, ComplianceResult};
use crate::AppState;

fn issue_token(state: &AppState, user: User) -> ComplianceResult<AuthResponse> {
    let token = state.jwt_manager.generate_token(user.id, &user.email)?;
    Ok(AuthResponse {
        token,
        user,
        expires_in: state.jwt_manager.token_duration_hours() * 3600,
    })
}

/// Create a user account.
///
/// POST /api/auth/register
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid email, weak password or email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ComplianceResult<(StatusCode, Json<AuthResponse>)> {
    let email = validate_email(&request.email)?;
    validate_password_strength(&request.password, state.min_password_length)?;

    if state.repository.get_user_by_email(&email).await?.is_some() {
        return Err(ComplianceError::BadRequest(
            "An account with this email already exists".to_string(),
        ));
    }

    let user = User::new(
        &email,
        optional_text(request.name),
        hash_password(&request.password)?,
    );
    state.repository.create_user(&user).await?;

    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(issue_token(&state, user)?)))
}

/// Login to obtain a JWT token.
///
/// POST /api/auth/login
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ComplianceResult<Json<AuthResponse>> {
    let user = state.repository.get_user_by_email(&request.email).await?;

    let user = match user {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        _ => {
            tracing::warn!(email = %request.email.trim(), "Failed login attempt");
            return Err(ComplianceError::Unauthorized(
                "Invalid email or password".to_string(),
            ));
        }
    };

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(issue_token(&state, user)?))
}

/// Get the current user and their organizations.
///
/// GET /api/auth/me
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ComplianceResult<Json<MeResponse>> {
    let user_id = claims.user_id()?;
    let user = state.repository.get_user(user_id).await.map_err(|e| match e {
        ComplianceError::NotFound(_) => {
            ComplianceError::Unauthorized("Account no longer exists".to_string())
        }
        other => other,
    })?;
    let organizations = state.repository.get_user_memberships(user_id).await?;

    Ok(Json(MeResponse {
        user,
        organizations,
    }))
}

/// Accept an employee invitation.
///
/// POST /api/auth/accept-invite
#[utoipa::path(
    post,
    path = "/api/auth/accept-invite",
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Invitation accepted", body = AuthResponse),
        (status = 400, description = "Invalid or used token, or weak password"),
        (status = 401, description = "Password does not match the existing account")
    ),
    tag = "auth"
)]
pub async fn accept_invite(
    State(state): State<AppState>,
    Json(request): Json<AcceptInviteRequest>,
) -> ComplianceResult<Json<AuthResponse>> {
    let token = request.token.trim();
    if !token.starts_with(INVITE_TOKEN_PREFIX) {
        return Err(ComplianceError::BadRequest(
            "Invalid invitation token".to_string(),
        ));
    }

    let employee = state
        .repository
        .find_employee_by_invite_hash(&hash_invite_token(token))
        .await?
        .ok_or_else(|| {
            ComplianceError::BadRequest(
                "Invitation is invalid or has already been used".to_string(),
            )
        })?;

    let user = match state.repository.get_user_by_email(&employee.email).await? {
        Some(user) => {
            if !verify_password(&request.password, &user.password_hash) {
                tracing::warn!(
                    employee_id = %employee.id,
                    "Invite acceptance with wrong password for existing account"
                );
                return Err(ComplianceError::Unauthorized(
                    "Password does not match the existing account".to_string(),
                ));
            }
            user
        }
        None => {
            validate_password_strength(&request.password, state.min_password_length)?;
            let name = optional_text(request.name).or_else(|| {
                Some(employee.full_name()).filter(|n| !n.is_empty())
            });
            let user = User::new(&employee.email, name, hash_password(&request.password)?);
            state.repository.create_user(&user).await?;
            user
        }
    };

    state.repository.accept_invite(employee.id, user.id).await?;

    write_audit(
        &state,
        &AuditEvent::new(
            employee.organization_id,
            employee.id,
            "employee.invite_accepted",
            "employee",
            employee.id,
            Some(serde_json::json!({ "user_id": user.id })),
        ),
    )
    .await;

    tracing::info!(
        organization_id = %employee.organization_id,
        employee_id = %employee.id,
        user_id = %user.id,
        "Invitation accepted"
    );

    Ok(Json(issue_token(&state, user)?))
}
