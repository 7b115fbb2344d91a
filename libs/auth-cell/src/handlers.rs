use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{Role, TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::{AppJson, AppQuery};
use shared_utils::validation::validate_request;

use crate::models::{
    ForgotPasswordRequest, InviteQuery, LoginRequest, RegisterAdminRequest, RegisterDoctorRequest,
    RegisterPatientRequest, ResetPasswordRequest, ValidateResetCodeRequest,
};
use crate::services::{AuthService, PasswordResetService};

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    validate_request(&request)?;

    let token = AuthService::new(&state).login(request).await?;
    Ok(Json(token))
}

#[axum::debug_handler]
pub async fn register_patient(
    State(state): State<Arc<AppConfig>>,
    AppQuery(invite): AppQuery<InviteQuery>,
    AppJson(request): AppJson<RegisterPatientRequest>,
) -> Result<Json<Value>, AppError> {
    validate_request(&request)?;

    let user = AuthService::new(&state)
        .register_patient_with_invite(invite.company_id, &invite.token, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "user": user
    })))
}

#[axum::debug_handler]
pub async fn register_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<RegisterDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;
    user.tenant()?;
    validate_request(&request)?;

    let doctor = AuthService::new(&state).register_doctor(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "user": doctor
    })))
}

#[axum::debug_handler]
pub async fn register_admin(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<RegisterAdminRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;
    validate_request(&request)?;

    let (admin, invite_link) = AuthService::new(&state).register_admin(&user, request).await?;

    Ok(Json(json!({
        "success": true,
        "user": admin,
        "inviteLink": invite_link
    })))
}

#[axum::debug_handler]
pub async fn forgot_password(
    State(state): State<Arc<AppConfig>>,
    AppJson(request): AppJson<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    validate_request(&request)?;

    PasswordResetService::new(&state)
        .send_password_reset_code(&request.email)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Reset code sent"
    })))
}

#[axum::debug_handler]
pub async fn validate_reset_code(
    State(state): State<Arc<AppConfig>>,
    AppJson(request): AppJson<ValidateResetCodeRequest>,
) -> Result<Json<Value>, AppError> {
    validate_request(&request)?;

    PasswordResetService::new(&state)
        .validate_reset_code(&request.email, &request.code)
        .await?;

    Ok(Json(json!({ "valid": true })))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<Arc<AppConfig>>,
    AppJson(request): AppJson<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    validate_request(&request)?;

    PasswordResetService::new(&state)
        .reset_password_with_code(&request.email, &request.code, &request.new_password)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Password updated"
    })))
}

/// The middleware already rejected bad tokens; echo the decoded identity.
#[axum::debug_handler]
pub async fn validate_token(Extension(user): Extension<User>) -> Json<Value> {
    debug!("Token validated for {}", user.id);

    Json(json!({
        "valid": true,
        "user_id": user.id,
        "email": user.email,
        "role": user.role,
        "company_id": user.company_id
    }))
}
