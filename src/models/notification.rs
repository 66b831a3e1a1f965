// src/models/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Uma notificação pertence ao destinatário: só ele a marca como lida.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub notification_type: String,
    pub user_id: Uuid,
    pub hospital_id: Uuid,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub related_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

// Payload do anúncio: um evento vira N linhas, uma por destinatário
// ativo do hospital, excluindo o próprio autor.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncePayload {
    #[validate(length(min = 1, message = "O tipo é obrigatório"))]
    #[schema(example = "announcement")]
    pub notification_type: String,

    #[validate(length(min = 1, message = "O título é obrigatório"))]
    pub title: String,

    #[validate(length(min = 1, message = "A mensagem é obrigatória"))]
    pub message: String,

    pub related_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceResponse {
    pub recipients: u64,
}
