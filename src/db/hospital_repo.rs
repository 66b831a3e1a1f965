// src/db/hospital_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::employee::{Department, Hospital},
};

#[derive(Clone)]
pub struct HospitalRepository {
    pool: PgPool,
}

impl HospitalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cria um novo hospital (tenant) na base de dados.
    pub async fn create_hospital(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Hospital, AppError> {
        sqlx::query_as::<_, Hospital>(
            r#"
            INSERT INTO hospitals (name, description)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(description)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn list_hospitals(&self) -> Result<Vec<Hospital>, AppError> {
        sqlx::query_as::<_, Hospital>("SELECT * FROM hospitals ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    // O primeiro hospital por ordem de criação: é o tenant escolhido
    // pelo auto-provisionamento do Identity Resolver.
    pub async fn first_hospital(&self) -> Result<Option<Hospital>, AppError> {
        sqlx::query_as::<_, Hospital>("SELECT * FROM hospitals ORDER BY created_at LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn create_department(
        &self,
        hospital_id: Uuid,
        name: &str,
    ) -> Result<Department, AppError> {
        sqlx::query_as::<_, Department>(
            r#"
            INSERT INTO departments (hospital_id, name)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(hospital_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn list_departments(&self, hospital_id: Uuid) -> Result<Vec<Department>, AppError> {
        sqlx::query_as::<_, Department>(
            "SELECT * FROM departments WHERE hospital_id = $1 ORDER BY name",
        )
        .bind(hospital_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn find_department(&self, id: Uuid) -> Result<Option<Department>, AppError> {
        sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }
}
