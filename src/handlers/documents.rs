// src/handlers/documents.rs

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedEmployee,
    services::storage_service::StoredFile,
};

// POST /api/files — upload multipart. Nunca devolve erro de storage:
// rejeição vira a URI "file-placeholder://<nome>", que o frontend
// entende como anexo não durável (contrato do modo degradado).
#[utoipa::path(
    post,
    path = "/api/files",
    tag = "Files",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Ficheiro armazenado (ou placeholder)", body = StoredFile),
        (status = 400, description = "Nenhum ficheiro no corpo da requisição")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_file(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| anyhow::anyhow!("Multipart inválido: {e}"))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| anyhow::anyhow!("Falha ao ler o ficheiro: {e}"))?;

        let stored = app_state.storage_service.store(&file_name, &bytes).await;
        tracing::info!(
            "📎 Upload de '{}' por {} ({} bytes, degradado={})",
            stored.name,
            employee.email,
            stored.size,
            stored.degraded
        );
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(AppError::field("file", "Envie um ficheiro no campo multipart"))
}
