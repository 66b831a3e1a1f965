// src/db/message_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::chat::{ChatMessageRow, MessageType},
};

// Colunas da mensagem + identidade do remetente via join com employees.
// O payload cru de um INSERT não vem enriquecido; quem entrega ao
// assinante sempre relê por aqui.
const MESSAGE_WITH_SENDER: &str = r#"
    SELECT m.id, m.room_id, m.sender_id, m.content, m.message_type,
           m.file_url, m.file_name, m.file_size, m.reply_to, m.is_edited,
           m.created_at,
           e.name  AS sender_name,
           e.email AS sender_email,
           e.position AS sender_position
      FROM chat_messages m
      LEFT JOIN employees e ON e.id = m.sender_id
"#;

#[derive(Clone)]
pub struct MessageRepository;

impl MessageRepository {
    pub fn new() -> Self {
        Self
    }

    // Insere a mensagem e devolve o ID persistido. O enriquecimento
    // é uma segunda leitura (fetch_with_sender).
    pub async fn insert_message<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
        sender_id: Option<Uuid>,
        content: &str,
        message_type: MessageType,
        file_url: Option<&str>,
        file_name: Option<&str>,
        file_size: Option<i64>,
        reply_to: Option<Uuid>,
    ) -> Result<Uuid, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO chat_messages
                (room_id, sender_id, content, message_type, file_url, file_name, file_size, reply_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(room_id)
        .bind(sender_id)
        .bind(content)
        .bind(message_type)
        .bind(file_url)
        .bind(file_name)
        .bind(file_size)
        .bind(reply_to)
        .fetch_one(executor)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(id)
    }

    pub async fn fetch_with_sender<'e, E>(
        &self,
        executor: E,
        message_id: Uuid,
    ) -> Result<Option<ChatMessageRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, ChatMessageRow>(&format!("{MESSAGE_WITH_SENDER} WHERE m.id = $1"))
            .bind(message_id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::DatabaseError)
    }

    // Leitura ordenada da sala: created_at crescente, com 'seq' como
    // desempate estável (ordem de inserção).
    pub async fn list_for_room<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
    ) -> Result<Vec<ChatMessageRow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, ChatMessageRow>(&format!(
            "{MESSAGE_WITH_SENDER} WHERE m.room_id = $1 ORDER BY m.created_at ASC, m.seq ASC"
        ))
        .bind(room_id)
        .fetch_all(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Edição: só o conteúdo muda; room_id e sender_id são imutáveis.
    pub async fn edit_message<'e, E>(
        &self,
        executor: E,
        message_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE chat_messages
               SET content = $3, is_edited = TRUE, updated_at = now()
             WHERE id = $1 AND sender_id = $2
            "#,
        )
        .bind(message_id)
        .bind(sender_id)
        .bind(content)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
