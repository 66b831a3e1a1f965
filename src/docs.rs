// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::get_me,

        // --- Hospitals ---
        handlers::employees::create_hospital,
        handlers::employees::list_hospitals,
        handlers::employees::create_department,
        handlers::employees::list_departments,

        // --- Employees ---
        handlers::employees::list_employees,
        handlers::employees::update_employee,

        // --- Chat ---
        handlers::chat::create_room,
        handlers::chat::list_rooms,
        handlers::chat::list_messages,
        handlers::chat::send_message,
        handlers::chat::edit_message,
        handlers::chat::mark_read,
        handlers::chat::rename_room,
        handlers::chat::deactivate_room,
        handlers::chat::add_participant,
        handlers::chat::remove_participant,
        handlers::chat::change_participant_role,

        // --- Notifications ---
        handlers::notifications::list_notifications,
        handlers::notifications::announce,
        handlers::notifications::mark_notification_read,
        handlers::notifications::mark_all_notifications_read,

        // --- Files ---
        handlers::documents::upload_file,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::RegisterPayload,
            models::auth::LoginPayload,
            models::auth::AuthResponse,

            // --- Employees ---
            models::employee::Employee,
            models::employee::EmployeeRole,
            models::employee::EmployeeStatus,
            models::employee::Hospital,
            models::employee::Department,
            models::employee::CreateHospitalPayload,
            models::employee::CreateDepartmentPayload,
            models::employee::UpdateEmployeePayload,

            // --- Chat ---
            models::chat::RoomType,
            models::chat::ParticipantRole,
            models::chat::MessageType,
            models::chat::ChatRoom,
            models::chat::Participant,
            models::chat::RoomSummary,
            models::chat::RoomListing,
            models::chat::MessageSender,
            models::chat::ChatMessageView,
            models::chat::ChatEvent,
            models::chat::CreateRoomPayload,
            models::chat::CreatedRoom,
            models::chat::SendMessagePayload,
            models::chat::EditMessagePayload,
            models::chat::RenameRoomPayload,
            models::chat::AddParticipantPayload,
            models::chat::ChangeParticipantRolePayload,

            // --- Notifications ---
            models::notification::Notification,
            models::notification::AnnouncePayload,
            models::notification::AnnounceResponse,

            // --- Files ---
            crate::services::storage_service::StoredFile,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registro e login"),
        (name = "Chat", description = "Salas, mensagens e entrega em tempo real"),
        (name = "Notifications", description = "Notificações por destinatário"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_jwt",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
