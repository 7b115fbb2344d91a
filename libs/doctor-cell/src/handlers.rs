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

use crate::models::{DoctorListQuery, SetActiveRequest, UpdateDoctorRequest};
use crate::services::DoctorService;

const READERS: &[Role] = &[Role::Admin, Role::Doctor, Role::Patient];
const STAFF: &[Role] = &[Role::Admin, Role::Doctor];

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(READERS)?;
    let company_id = user.tenant()?;

    let doctors = DoctorService::new(&state)
        .list_doctors(company_id, query.status)
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(doctor_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(READERS)?;
    let company_id = user.tenant()?;

    let doctor = DoctorService::new(&state).get_doctor(company_id, doctor_id).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctor_by_crm(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(crm): AppPath<String>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let doctor = DoctorService::new(&state).find_by_crm(company_id, &crm).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn get_doctors_by_specialty(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(specialty): AppPath<String>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let doctors = DoctorService::new(&state)
        .find_by_specialty(company_id, &specialty)
        .await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn update_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(doctor_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;
    let company_id = user.tenant()?;
    validate_request(&request)?;

    let doctor = DoctorService::new(&state)
        .update_doctor(company_id, doctor_id, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}

#[axum::debug_handler]
pub async fn set_doctor_active(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(doctor_id): AppPath<Uuid>,
    AppJson(request): AppJson<SetActiveRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Admin])?;
    let company_id = user.tenant()?;

    let doctor = DoctorService::new(&state)
        .set_active(company_id, doctor_id, request.active)
        .await?;

    Ok(Json(json!({
        "success": true,
        "doctor": doctor
    })))
}
