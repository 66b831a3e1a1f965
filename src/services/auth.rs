// src/services/auth.rs

use bcrypt::{hash, verify};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::{
    common::error::AppError,
    db::{EmployeeRepository, HospitalRepository},
    models::{
        auth::{Claims, Principal},
        employee::{Employee, EmployeeRole, EmployeeStatus},
    },
};

// Tempo de vida do token: um plantão
const TOKEN_TTL_SECS: i64 = 60 * 60 * 8;

#[derive(Clone)]
pub struct AuthService {
    employee_repo: EmployeeRepository,
    hospital_repo: HospitalRepository,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(
        employee_repo: EmployeeRepository,
        hospital_repo: HospitalRepository,
        jwt_secret: String,
    ) -> Self {
        Self {
            employee_repo,
            hospital_repo,
            jwt_secret,
        }
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, AppError> {
        // 1. Hashing fora do executor async (bcrypt é caro de CPU)
        let password_clone = password.to_owned();
        let hashed_password =
            tokio::task::spawn_blocking(move || hash(&password_clone, bcrypt::DEFAULT_COST))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;

        // 2. Mesma regra de alocação do Identity Resolver: o registro
        // entra no primeiro hospital por ordem de criação.
        let hospital = self
            .hospital_repo
            .first_hospital()
            .await?
            .ok_or(AppError::NoTenantAvailable)?;

        let employee = self
            .employee_repo
            .create_employee(name, email, &hashed_password, EmployeeRole::Employee, hospital.id)
            .await?;

        tracing::info!("🆕 Funcionário registrado: {}", employee.email);

        self.create_token(&employee)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let employee = self
            .employee_repo
            .find_by_email(email)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        // Status faz parte do ciclo de vida: desligado não entra
        if employee.status != EmployeeStatus::Active {
            return Err(AppError::Forbidden(
                "Cadastro inativo. Procure a administração.".to_string(),
            ));
        }

        let password_clone = password.to_owned();
        let password_hash_clone = employee.password_hash.clone();
        let valid =
            tokio::task::spawn_blocking(move || verify(&password_clone, &password_hash_clone))
                .await
                .map_err(|e| anyhow::anyhow!("Falha na task de verificação: {}", e))??;

        if !valid {
            return Err(AppError::InvalidCredentials);
        }

        self.create_token(&employee)
    }

    // Valida o token e devolve o principal (entrada do Identity Resolver)
    pub fn validate_token(&self, token: &str) -> Result<Principal, AppError> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::InvalidToken)?;

        Ok(Principal {
            id: decoded.claims.sub,
            email: decoded.claims.email,
        })
    }

    fn create_token(&self, employee: &Employee) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: employee.id,
            email: employee.email.clone(),
            iat: now as usize,
            exp: (now + TOKEN_TTL_SECS) as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(AppError::JwtError)
    }
}
