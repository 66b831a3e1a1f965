// src/services/identity_service.rs

use crate::{
    common::error::AppError,
    db::{EmployeeRepository, HospitalRepository},
    models::{
        auth::Principal,
        employee::{Employee, EmployeeRole},
    },
};

// O Identity Resolver: mapeia um principal autenticado para o cadastro
// de funcionário. Se o cadastro não existe, auto-provisiona no primeiro
// hospital por ordem de criação — efeito de escrita num caminho de
// leitura, intencional (auto-correção) e idempotente: a constraint de
// e-mail único garante que nunca nasce uma segunda linha.
#[derive(Clone)]
pub struct IdentityService {
    employee_repo: EmployeeRepository,
    hospital_repo: HospitalRepository,
}

impl IdentityService {
    pub fn new(employee_repo: EmployeeRepository, hospital_repo: HospitalRepository) -> Self {
        Self {
            employee_repo,
            hospital_repo,
        }
    }

    pub async fn resolve_employee(&self, principal: &Principal) -> Result<Employee, AppError> {
        // 1. Caminho comum: o ID do token ainda aponta para um cadastro
        if let Some(employee) = self.employee_repo.find_by_id(principal.id).await? {
            return Ok(employee);
        }

        // 2. Busca pelo e-mail verificado do principal
        if let Some(employee) = self.employee_repo.find_by_email(&principal.email).await? {
            return Ok(employee);
        }

        // 3. Auto-provisionamento
        self.provision(&principal.email).await
    }

    async fn provision(&self, email: &str) -> Result<Employee, AppError> {
        // Sem hospital não há onde alocar: fatal, não retentamos.
        // O chamador precisa criar um hospital manualmente.
        let hospital = self
            .hospital_repo
            .first_hospital()
            .await?
            .ok_or(AppError::NoTenantAvailable)?;

        // Nome provisório derivado do e-mail; senha inutilizável (o
        // acesso veio de um token, não de credenciais locais).
        let name = email.split('@').next().unwrap_or(email);

        match self
            .employee_repo
            .create_employee(name, email, "!", EmployeeRole::Employee, hospital.id)
            .await
        {
            Ok(employee) => {
                tracing::info!(
                    "👤 Funcionário auto-provisionado: {} no hospital {}",
                    employee.email,
                    hospital.name
                );
                Ok(employee)
            }
            // Corrida com outra resolução do mesmo principal: a
            // constraint de e-mail único venceu por nós. Relê o vencedor.
            Err(AppError::EmailAlreadyExists) => self
                .employee_repo
                .find_by_email(email)
                .await?
                .ok_or(AppError::NotFound("Funcionário")),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use uuid::Uuid;

    // Requer um Postgres provisionado; rode com:
    //   DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn resolution_is_idempotent_and_never_duplicates() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let pool = PgPoolOptions::new().connect(&url).await.unwrap();
        sqlx::migrate!().run(&pool).await.ok();

        let employee_repo = EmployeeRepository::new(pool.clone());
        let hospital_repo = HospitalRepository::new(pool.clone());
        if hospital_repo.first_hospital().await.unwrap().is_none() {
            hospital_repo
                .create_hospital("Hospital Teste", None)
                .await
                .unwrap();
        }
        let service = IdentityService::new(employee_repo.clone(), hospital_repo);

        // Principal cujo ID não existe no banco: força o caminho de
        // auto-provisionamento na primeira resolução
        let email = format!("idem-{}@hospital.org", Uuid::new_v4().simple());
        let principal = Principal {
            id: Uuid::new_v4(),
            email: email.clone(),
        };

        let first = service.resolve_employee(&principal).await.unwrap();
        let second = service.resolve_employee(&principal).await.unwrap();
        assert_eq!(first.id, second.id);

        // Uma única linha para o e-mail
        let found = employee_repo.find_by_email(&email).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(found.role, EmployeeRole::Employee);
    }
}
