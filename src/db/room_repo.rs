// src/db/room_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::chat::{ChatRoom, Participant, ParticipantRole, RoomSummary, RoomType},
};

// Repositório de salas e participantes. Os métodos aceitam um executor
// (pool, conexão RLS ou transação), porque a criação de sala precisa
// ser atômica: sala + participantes entram na mesma transação.
#[derive(Clone)]
pub struct RoomRepository;

impl RoomRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn create_room<'e, E>(
        &self,
        executor: E,
        name: &str,
        description: Option<&str>,
        room_type: RoomType,
        hospital_id: Uuid,
        department_id: Option<Uuid>,
        created_by: Uuid,
    ) -> Result<ChatRoom, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, ChatRoom>(
            r#"
            INSERT INTO chat_rooms (name, description, room_type, hospital_id, department_id, created_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(room_type)
        .bind(hospital_id)
        .bind(department_id)
        .bind(created_by)
        .fetch_one(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Insere (ou reativa) a participação de um funcionário na sala.
    // A remoção é sempre lógica, então o re-ingresso é um UPDATE.
    pub async fn add_participant<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
        employee_id: Uuid,
        role: ParticipantRole,
    ) -> Result<Participant, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Participant>(
            r#"
            INSERT INTO chat_participants (room_id, employee_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (room_id, employee_id)
            DO UPDATE SET is_active = TRUE, role = EXCLUDED.role
            RETURNING *
            "#,
        )
        .bind(room_id)
        .bind(employee_id)
        .bind(role)
        .fetch_one(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn find_room<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
    ) -> Result<Option<ChatRoom>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, ChatRoom>("SELECT * FROM chat_rooms WHERE id = $1 AND is_active")
            .bind(room_id)
            .fetch_optional(executor)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn find_participant<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
        employee_id: Uuid,
    ) -> Result<Option<Participant>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Participant>(
            "SELECT * FROM chat_participants WHERE room_id = $1 AND employee_id = $2 AND is_active",
        )
        .bind(room_id)
        .bind(employee_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Salas do funcionário com a contagem de não lidas:
    // count(mensagens com created_at > last_read_at)
    pub async fn list_rooms_for_employee<'e, E>(
        &self,
        executor: E,
        employee_id: Uuid,
    ) -> Result<Vec<RoomSummary>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, RoomSummary>(
            r#"
            SELECT r.id, r.name, r.description, r.room_type, r.hospital_id,
                   r.is_active, r.created_at,
                   (SELECT COUNT(*)
                      FROM chat_messages m
                     WHERE m.room_id = r.id
                       AND (p.last_read_at IS NULL OR m.created_at > p.last_read_at)
                   ) AS unread_count
              FROM chat_rooms r
              JOIN chat_participants p ON p.room_id = r.id
             WHERE p.employee_id = $1 AND p.is_active AND r.is_active
             ORDER BY r.created_at DESC
            "#,
        )
        .bind(employee_id)
        .fetch_all(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn rename_room<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<ChatRoom>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, ChatRoom>(
            r#"
            UPDATE chat_rooms
               SET name = $2, description = COALESCE($3, description), updated_at = now()
             WHERE id = $1 AND is_active
            RETURNING *
            "#,
        )
        .bind(room_id)
        .bind(name)
        .bind(description)
        .fetch_optional(executor)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn deactivate_room<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result =
            sqlx::query("UPDATE chat_rooms SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(room_id)
                .execute(executor)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    // Remoção lógica: preserva o histórico para atribuição de mensagens
    pub async fn deactivate_participant<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE chat_participants SET is_active = FALSE WHERE room_id = $1 AND employee_id = $2",
        )
        .bind(room_id)
        .bind(employee_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_participant_role<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
        employee_id: Uuid,
        role: ParticipantRole,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE chat_participants SET role = $3 WHERE room_id = $1 AND employee_id = $2 AND is_active",
        )
        .bind(room_id)
        .bind(employee_id)
        .bind(role)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // Read-state tracker: move o ponteiro de leitura do par (sala, funcionário)
    pub async fn mark_read<'e, E>(
        &self,
        executor: E,
        room_id: Uuid,
        employee_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "UPDATE chat_participants SET last_read_at = now() WHERE room_id = $1 AND employee_id = $2 AND is_active",
        )
        .bind(room_id)
        .bind(employee_id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
