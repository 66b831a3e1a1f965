// src/handlers/employees.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedEmployee, rbac::RequireAdmin},
    models::employee::{
        CreateDepartmentPayload, CreateHospitalPayload, Department, Employee, Hospital,
        UpdateEmployeePayload,
    },
    services::permission::derive_permissions,
};

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListEmployeesQuery {
    pub department_id: Option<Uuid>,
}

// GET /api/employees — sempre escopado ao hospital do solicitante
#[utoipa::path(
    get,
    path = "/api/employees",
    tag = "Employees",
    params(ListEmployeesQuery),
    responses((status = 200, description = "Funcionários do hospital", body = Vec<Employee>)),
    security(("api_jwt" = []))
)]
pub async fn list_employees(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Query(query): Query<ListEmployeesQuery>,
) -> Result<Json<Vec<Employee>>, AppError> {
    let employees = match query.department_id {
        Some(department_id) => {
            app_state
                .employee_repo
                .list_active_by_department(department_id)
                .await?
        }
        None => {
            app_state
                .employee_repo
                .list_by_hospital(employee.hospital_id)
                .await?
        }
    };

    // Nunca vazar outro tenant, mesmo com um department_id alheio
    let employees = employees
        .into_iter()
        .filter(|e| e.hospital_id == employee.hospital_id)
        .collect();

    Ok(Json(employees))
}

// PATCH /api/employees/{id} — papel/status/lotação, só admin
#[utoipa::path(
    patch,
    path = "/api/employees/{id}",
    tag = "Employees",
    params(("id" = Uuid, Path, description = "ID do funcionário")),
    request_body = UpdateEmployeePayload,
    responses(
        (status = 200, description = "Funcionário atualizado", body = Employee),
        (status = 403, description = "Requer papel de administrador")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_employee(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(admin): AuthenticatedEmployee,
    _guard: RequireAdmin,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmployeePayload>,
) -> Result<Json<Employee>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    // O alvo precisa ser do mesmo hospital do administrador
    let target = app_state
        .employee_repo
        .find_by_id(id)
        .await?
        .ok_or(AppError::NotFound("Funcionário"))?;
    if target.hospital_id != admin.hospital_id {
        return Err(AppError::Forbidden(
            "Funcionário de outro hospital.".to_string(),
        ));
    }

    let updated = app_state
        .employee_repo
        .update_admin_fields(
            id,
            payload.role,
            payload.status,
            payload.department_id,
            payload.position.as_deref(),
        )
        .await?
        .ok_or(AppError::NotFound("Funcionário"))?;

    Ok(Json(updated))
}

// POST /api/hospitals — rota SEM auth_guard por causa do bootstrap:
// com zero hospitais ninguém consegue se registrar (NoTenantAvailable),
// então o primeiro hospital pode ser criado livremente. A partir do
// segundo, exige um token de administrador.
#[utoipa::path(
    post,
    path = "/api/hospitals",
    tag = "Hospitals",
    request_body = CreateHospitalPayload,
    responses(
        (status = 201, description = "Hospital criado", body = Hospital),
        (status = 403, description = "Requer administrador (após o bootstrap)")
    )
)]
pub async fn create_hospital(
    State(app_state): State<AppState>,
    headers: axum::http::HeaderMap,
    Json(payload): Json<CreateHospitalPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let bootstrap = app_state.hospital_repo.first_hospital().await?.is_none();
    if !bootstrap {
        // Valida o token manualmente (a rota não passa pelo guard)
        let token = headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::InvalidToken)?;
        let principal = app_state.auth_service.validate_token(token)?;
        let employee = app_state.identity_service.resolve_employee(&principal).await?;

        if !derive_permissions(Some(&employee)).is_admin {
            return Err(AppError::Forbidden(
                "Apenas administradores criam novos hospitais.".to_string(),
            ));
        }
    }

    let hospital = app_state
        .hospital_repo
        .create_hospital(&payload.name, payload.description.as_deref())
        .await?;

    tracing::info!("🏥 Hospital criado: {}", hospital.name);
    Ok((StatusCode::CREATED, Json(hospital)))
}

// GET /api/hospitals
#[utoipa::path(
    get,
    path = "/api/hospitals",
    tag = "Hospitals",
    responses((status = 200, description = "Hospitais cadastrados", body = Vec<Hospital>)),
    security(("api_jwt" = []))
)]
pub async fn list_hospitals(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(_employee): AuthenticatedEmployee,
) -> Result<Json<Vec<Hospital>>, AppError> {
    Ok(Json(app_state.hospital_repo.list_hospitals().await?))
}

// POST /api/departments — no hospital do administrador
#[utoipa::path(
    post,
    path = "/api/departments",
    tag = "Hospitals",
    request_body = CreateDepartmentPayload,
    responses((status = 201, description = "Departamento criado", body = Department)),
    security(("api_jwt" = []))
)]
pub async fn create_department(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(admin): AuthenticatedEmployee,
    _guard: RequireAdmin,
    Json(payload): Json<CreateDepartmentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let department = app_state
        .hospital_repo
        .create_department(admin.hospital_id, &payload.name)
        .await?;

    Ok((StatusCode::CREATED, Json(department)))
}

// GET /api/departments
#[utoipa::path(
    get,
    path = "/api/departments",
    tag = "Hospitals",
    responses((status = 200, description = "Departamentos do hospital", body = Vec<Department>)),
    security(("api_jwt" = []))
)]
pub async fn list_departments(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
) -> Result<Json<Vec<Department>>, AppError> {
    Ok(Json(
        app_state
            .hospital_repo
            .list_departments(employee.hospital_id)
            .await?,
    ))
}
