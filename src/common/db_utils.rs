// src/common/db_utils.rs

use uuid::Uuid;

use crate::common::error::AppError;

// ---
// Helper RLS: A "Chave" para o Banco de Dados
// ---
// As policies de row-level security do banco leem 'app.hospital_id' e
// 'app.employee_id' para filtrar as linhas visíveis. Estas funções
// giram a chave antes de qualquer query de domínio.

/// Define as variáveis RLS na conexão fornecida (vale para transações
/// via `&mut *tx`).
pub(crate) async fn apply_rls(
    conn: &mut sqlx::PgConnection,
    hospital_id: Uuid,
    employee_id: Uuid,
) -> Result<(), AppError> {
    // 1. Define o Hospital (tenant)
    sqlx::query("SELECT set_config('app.hospital_id', $1, true)")
        .bind(hospital_id.to_string())
        .execute(&mut *conn)
        .await?;

    // 2. Define o Funcionário
    sqlx::query("SELECT set_config('app.employee_id', $1, true)")
        .bind(employee_id.to_string())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Adquire uma conexão da pool já com as variáveis RLS definidas (a "chave").
pub(crate) async fn rls_connection(
    pool: &sqlx::PgPool,
    hospital_id: Uuid,
    employee_id: Uuid,
) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>, AppError> {
    // O operador '?' converte automaticamente sqlx::Error -> AppError::DatabaseError
    let mut conn = pool.acquire().await?;
    apply_rls(&mut *conn, hospital_id, employee_id).await?;
    Ok(conn)
}
