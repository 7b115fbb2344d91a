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

use crate::models::{PatientError, PatientListQuery, PatientSearchQuery, SetActiveRequest, UpdatePatientRequest};
use crate::services::PatientService;

const STAFF: &[Role] = &[Role::Admin, Role::Doctor];

#[axum::debug_handler]
pub async fn get_my_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Patient])?;
    let company_id = user.tenant()?;

    let patient = PatientService::new(&config)
        .find_by_user(company_id, user.id)
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn list_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<PatientListQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let patients = PatientService::new(&config)
        .list_patients(company_id, query.status)
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(patient_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let patient = PatientService::new(&config)
        .get_patient(company_id, patient_id)
        .await?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient_by_cpf(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(cpf): AppPath<String>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let patient = PatientService::new(&config)
        .find_by_cpf(company_id, &cpf)
        .await?
        .ok_or(PatientError::NotFound)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let patients = PatientService::new(&config)
        .search_by_name(company_id, &query.name)
        .await?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(patient_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;
    let company_id = user.tenant()?;
    validate_request(&request)?;

    let patient = PatientService::new(&config)
        .update_patient(company_id, patient_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}

#[axum::debug_handler]
pub async fn set_patient_active(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(patient_id): AppPath<Uuid>,
    AppJson(request): AppJson<SetActiveRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;
    let company_id = user.tenant()?;

    let patient = PatientService::new(&config)
        .set_active(company_id, patient_id, request.active)
        .await?;

    Ok(Json(json!({
        "success": true,
        "patient": patient
    })))
}
