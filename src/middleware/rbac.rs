// src/middleware/rbac.rs

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use crate::{
    common::error::ApiError,
    models::employee::Employee,
    services::permission::{PermissionSet, derive_permissions},
};

// O guardião de papel: exige que o funcionário autenticado seja admin
// (admin ou super_admin). As flags vêm do Permission Evaluator, uma
// função pura do cadastro — nenhuma ida ao banco aqui.
pub struct RequireAdmin(pub PermissionSet);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // A. Extrai o funcionário injetado pelo auth_guard
        let employee = parts.extensions.get::<Employee>();

        // B. Deriva as flags
        let permissions = derive_permissions(employee);

        // C. Verifica
        if !permissions.is_admin {
            return Err(ApiError {
                status: StatusCode::FORBIDDEN,
                error: "Você precisa ser administrador para realizar esta ação.".to_string(),
                details: None,
            });
        }

        Ok(RequireAdmin(permissions))
    }
}
