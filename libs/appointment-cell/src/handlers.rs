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

use crate::models::{
    BookAppointmentRequest, DateQuery, RescheduleAppointmentRequest, UpdateStatusRequest,
};
use crate::services::time::clinic_now;
use crate::services::{AppointmentBookingService, AppointmentQueryService, AvailabilityService};

const BOOKERS: &[Role] = &[Role::Patient, Role::Admin];
const PARTIES: &[Role] = &[Role::Patient, Role::Doctor, Role::Admin];
const STAFF: &[Role] = &[Role::Admin, Role::Doctor];
const ADMIN: &[Role] = &[Role::Admin];

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppJson(request): AppJson<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(BOOKERS)?;
    let company_id = user.tenant()?;
    validate_request(&request)?;

    let outcome = AppointmentBookingService::new(&state)
        .book_appointment(company_id, &user, request)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": outcome.appointment,
        "notifications": outcome.notifications
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(appointment_id): AppPath<Uuid>,
    AppJson(request): AppJson<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(BOOKERS)?;
    let company_id = user.tenant()?;

    let appointment = AppointmentBookingService::new(&state)
        .reschedule_appointment(company_id, &user, appointment_id, &request.date_time)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(appointment_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(PARTIES)?;
    let company_id = user.tenant()?;

    let appointment = AppointmentBookingService::new(&state)
        .cancel_appointment(company_id, &user, appointment_id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_status(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(appointment_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    user.require_role(ADMIN)?;
    let company_id = user.tenant()?;

    let appointment = AppointmentBookingService::new(&state)
        .update_status(company_id, &user, appointment_id, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(appointment_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(PARTIES)?;
    let company_id = user.tenant()?;

    let appointment = AppointmentBookingService::new(&state)
        .get_appointment(company_id, &user, appointment_id)
        .await?;

    Ok(Json(json!(appointment)))
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_role(ADMIN)?;
    let company_id = user.tenant()?;

    let appointments = AppointmentQueryService::new(&state).list_all(company_id).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn my_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_role(&[Role::Patient, Role::Doctor])?;
    let company_id = user.tenant()?;

    let service = AppointmentQueryService::new(&state);
    let appointments = if user.has_role(Role::Patient) {
        service.list_for_patient_user(company_id, user.id).await?
    } else {
        service.list_for_doctor_user(company_id, user.id).await?
    };

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn appointments_by_date(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppQuery(query): AppQuery<DateQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let service = AppointmentQueryService::new(&state);
    let scope = service.doctor_scope(company_id, &user).await?;
    let appointments = service.list_by_date(company_id, &query.date, scope).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn appointments_by_doctor(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(doctor_id): AppPath<Uuid>,
) -> Result<Json<Value>, AppError> {
    user.require_role(ADMIN)?;
    let company_id = user.tenant()?;

    let appointments = AppointmentQueryService::new(&state)
        .list_by_doctor(company_id, doctor_id)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn appointments_by_cpf(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(cpf): AppPath<String>,
) -> Result<Json<Value>, AppError> {
    user.require_role(STAFF)?;
    let company_id = user.tenant()?;

    let service = AppointmentQueryService::new(&state);
    let scope = service.doctor_scope(company_id, &user).await?;
    let appointments = service.list_by_cpf(company_id, &cpf, scope).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn appointment_stats(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    user.require_role(ADMIN)?;
    let company_id = user.tenant()?;

    let stats = AppointmentQueryService::new(&state)
        .stats(company_id, clinic_now().date())
        .await?;

    Ok(Json(json!(stats)))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn doctor_availability(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    AppPath(doctor_id): AppPath<Uuid>,
    AppQuery(query): AppQuery<DateQuery>,
) -> Result<Json<Value>, AppError> {
    user.require_role(PARTIES)?;
    let company_id = user.tenant()?;

    let availability = AvailabilityService::new(&state)
        .find_available_by_doctor(company_id, doctor_id, &query.date)
        .await?;

    Ok(Json(json!(availability)))
}
