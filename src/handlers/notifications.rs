// src/handlers/notifications.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedEmployee, rbac::RequireAdmin},
    models::notification::{AnnouncePayload, AnnounceResponse, Notification},
};

// GET /api/notifications — as notificações do próprio funcionário
#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    responses((status = 200, description = "Notificações do funcionário", body = Vec<Notification>)),
    security(("api_jwt" = []))
)]
pub async fn list_notifications(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
) -> Result<Json<Vec<Notification>>, AppError> {
    Ok(Json(
        app_state.notification_service.list_mine(&employee).await?,
    ))
}

// POST /api/notifications/announce — fan-out para o hospital inteiro,
// excluindo o autor. Só administradores anunciam.
#[utoipa::path(
    post,
    path = "/api/notifications/announce",
    tag = "Notifications",
    request_body = AnnouncePayload,
    responses(
        (status = 201, description = "Anúncio distribuído", body = AnnounceResponse),
        (status = 403, description = "Requer papel de administrador")
    ),
    security(("api_jwt" = []))
)]
pub async fn announce(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    _guard: RequireAdmin,
    Json(payload): Json<AnnouncePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let recipients = app_state
        .notification_service
        .notify_hospital(
            &employee,
            &payload.notification_type,
            &payload.title,
            &payload.message,
            payload.related_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(AnnounceResponse { recipients })))
}

// POST /api/notifications/{id}/read
#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    tag = "Notifications",
    params(("id" = Uuid, Path, description = "ID da notificação")),
    responses((status = 204, description = "Marcada como lida")),
    security(("api_jwt" = []))
)]
pub async fn mark_notification_read(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state
        .notification_service
        .mark_read(&employee, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/notifications/read-all
#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "Notifications",
    responses((status = 200, description = "Todas marcadas como lidas")),
    security(("api_jwt" = []))
)]
pub async fn mark_all_notifications_read(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
) -> Result<impl IntoResponse, AppError> {
    let updated = app_state
        .notification_service
        .mark_all_read(&employee)
        .await?;
    Ok(Json(json!({ "updated": updated })))
}
