use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::{AppJson, AppPath, AppQuery};
use shared_utils::validation::validate_request;

use crate::models::{CompanySearchQuery, CreateCompanyRequest, InviteLink, UpdateCompanyRequest};
use crate::services::CompanyService;

#[axum::debug_handler]
pub async fn create_company(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<CreateCompanyRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;
    validate_request(&request)?;

    let company = CompanyService::new(&state).create_company(request).await?;

    Ok(Json(json!({
        "success": true,
        "company": company
    })))
}

#[axum::debug_handler]
pub async fn list_companies(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;

    let companies = CompanyService::new(&state).list_companies().await?;

    Ok(Json(json!({
        "companies": companies,
        "total": companies.len()
    })))
}

#[axum::debug_handler]
pub async fn search_companies(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<CompanySearchQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;

    let companies = CompanyService::new(&state).search_companies(&query.q).await?;

    Ok(Json(json!(companies)))
}

#[axum::debug_handler]
pub async fn update_company(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(company_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateCompanyRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;
    validate_request(&request)?;

    let company = CompanyService::new(&state)
        .update_company(company_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "company": company
    })))
}

#[axum::debug_handler]
pub async fn deactivate_company(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(company_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;

    let company = CompanyService::new(&state).deactivate_company(company_id).await?;

    Ok(Json(json!({
        "success": true,
        "company": company,
        "message": "Company and related users deactivated"
    })))
}

#[axum::debug_handler]
pub async fn activate_company(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(company_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;

    let company = CompanyService::new(&state).activate_company(company_id).await?;

    Ok(Json(json!({
        "success": true,
        "company": company,
        "message": "Company and related users activated"
    })))
}

#[axum::debug_handler]
pub async fn list_company_admins(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(company_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;

    let admins = CompanyService::new(&state).list_admins(company_id).await?;

    Ok(Json(json!({
        "admins": admins,
        "total": admins.len()
    })))
}

#[axum::debug_handler]
pub async fn deactivate_admin(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(user_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::SuperAdmin])?;

    let admin = CompanyService::new(&state).deactivate_admin(user_id).await?;

    Ok(Json(json!({
        "success": true,
        "admin": admin
    })))
}

/// Invite link for the caller's own company.
#[axum::debug_handler]
pub async fn get_invite_link(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<InviteLink>, AppError> {
    user.require_role(&[Role::Admin])?;
    let company_id = user.tenant()?;

    let invite_link = CompanyService::new(&state).invite_link(company_id).await?;

    Ok(Json(InviteLink { invite_link }))
}
