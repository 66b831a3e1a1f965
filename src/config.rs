// src/config.rs

use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{env, path::PathBuf, sync::Arc, time::Duration};

use crate::{
    db::{
        EmployeeRepository, HospitalRepository, MessageRepository, NotificationRepository,
        RoomRepository,
    },
    services::{
        auth::AuthService, chat_fallback::FallbackChatStore, chat_service::ChatService,
        fanout::ChatFanout, identity_service::IdentityService,
        notification_service::NotificationService, storage_service::StorageService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub upload_dir: PathBuf,

    // Repositórios usados diretamente pelos handlers
    pub employee_repo: EmployeeRepository,
    pub hospital_repo: HospitalRepository,

    // Serviços de domínio
    pub auth_service: AuthService,
    pub identity_service: IdentityService,
    pub chat_service: ChatService,
    pub notification_service: NotificationService,
    pub storage_service: StorageService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL deve ser definida");
        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET deve ser definido");
        let upload_dir =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "./uploads".to_string()));

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let employee_repo = EmployeeRepository::new(db_pool.clone());
        let hospital_repo = HospitalRepository::new(db_pool.clone());
        let room_repo = RoomRepository::new();
        let message_repo = MessageRepository::new();
        let notification_repo = NotificationRepository::new(db_pool.clone());

        // O arena do modo degradado é injetado aqui (instância única
        // por AppState; nos testes cada instância tem o seu)
        let fallback = Arc::new(FallbackChatStore::new());
        let fanout = ChatFanout::new();

        let auth_service = AuthService::new(
            employee_repo.clone(),
            hospital_repo.clone(),
            jwt_secret.clone(),
        );
        let identity_service = IdentityService::new(employee_repo.clone(), hospital_repo.clone());
        let chat_service = ChatService::new(
            db_pool.clone(),
            room_repo,
            message_repo,
            employee_repo.clone(),
            hospital_repo.clone(),
            fallback,
            fanout,
        );
        let notification_service =
            NotificationService::new(notification_repo, employee_repo.clone());
        let storage_service = StorageService::new(upload_dir.clone());

        // Retorna Ok com o estado montado
        Ok(Self {
            db_pool,
            upload_dir,
            employee_repo,
            hospital_repo,
            auth_service,
            identity_service,
            chat_service,
            notification_service,
            storage_service,
        })
    }
}
