// src/db/employee_repo.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::employee::{Employee, EmployeeRole, EmployeeStatus},
};

// O repositório de funcionários, responsável por todas as interações
// com a tabela 'employees'
#[derive(Clone)]
pub struct EmployeeRepository {
    pool: PgPool,
}

impl EmployeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um funcionário pelo seu e-mail
    pub async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, AppError> {
        sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    // Busca um funcionário pelo seu ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Employee>, AppError> {
        sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    // Cria um novo funcionário no banco de dados
    pub async fn create_employee(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: EmployeeRole,
        hospital_id: Uuid,
    ) -> Result<Employee, AppError> {
        sqlx::query_as::<_, Employee>(
            r#"
            INSERT INTO employees (name, email, password_hash, role, hospital_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(hospital_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_error)
    }

    // Lista os funcionários de um hospital (escopo de tenancy)
    pub async fn list_by_hospital(&self, hospital_id: Uuid) -> Result<Vec<Employee>, AppError> {
        sqlx::query_as::<_, Employee>(
            "SELECT * FROM employees WHERE hospital_id = $1 ORDER BY name",
        )
        .bind(hospital_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Funcionários ativos de um departamento: alimenta a expansão
    // automática das salas do tipo 'department'
    pub async fn list_active_by_department(
        &self,
        department_id: Uuid,
    ) -> Result<Vec<Employee>, AppError> {
        sqlx::query_as::<_, Employee>(
            "SELECT * FROM employees WHERE department_id = $1 AND status = 'active' ORDER BY name",
        )
        .bind(department_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    // Atualização administrativa. Funcionário nunca é apagado:
    // o ciclo de vida é só transição de status.
    pub async fn update_admin_fields(
        &self,
        id: Uuid,
        role: Option<EmployeeRole>,
        status: Option<EmployeeStatus>,
        department_id: Option<Uuid>,
        position: Option<&str>,
    ) -> Result<Option<Employee>, AppError> {
        sqlx::query_as::<_, Employee>(
            r#"
            UPDATE employees SET
                role          = COALESCE($2, role),
                status        = COALESCE($3, status),
                department_id = COALESCE($4, department_id),
                position      = COALESCE($5, position),
                updated_at    = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(role)
        .bind(status)
        .bind(department_id)
        .bind(position)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }
}

// Converte erro de violação de chave única em um erro mais amigável.
// É a âncora da idempotência do provisionamento: duas resoluções
// concorrentes do mesmo e-mail nunca criam duas linhas — a perdedora
// recebe EmailAlreadyExists e relê a vencedora.
fn map_insert_error(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return AppError::EmailAlreadyExists;
        }
    }
    AppError::DatabaseError(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::ErrorKind;

    // Erro de banco sintético, só com o 'kind' que o mapeamento lê
    #[derive(Debug)]
    struct StubDbError {
        unique: bool,
    }

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "erro sintético")
        }
    }

    impl std::error::Error for StubDbError {}

    impl sqlx::error::DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "erro sintético"
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }
    }

    #[test]
    fn unique_violation_becomes_email_already_exists() {
        let err = sqlx::Error::Database(Box::new(StubDbError { unique: true }));
        assert!(matches!(map_insert_error(err), AppError::EmailAlreadyExists));
    }

    #[test]
    fn other_database_errors_pass_through() {
        let err = sqlx::Error::Database(Box::new(StubDbError { unique: false }));
        assert!(matches!(map_insert_error(err), AppError::DatabaseError(_)));
    }
}
