// src/handlers/chat.rs

use axum::{
    Json,
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedEmployee,
    models::chat::{
        AddParticipantPayload, ChangeParticipantRolePayload, ChatEvent, ChatMessageView,
        CreateRoomPayload, CreatedRoom, EditMessagePayload, MessageId, RenameRoomPayload,
        RoomId, RoomListing, SendMessagePayload,
    },
    services::fanout::DeliveryLog,
};

// Os IDs de sala/mensagem viajam como string, porque podem ser
// persistidos (UUID) ou temporários (prefixo "temp-")
fn parse_room_id(raw: &str) -> Result<RoomId, AppError> {
    raw.parse()
        .map_err(|_| AppError::field("roomId", "ID de sala inválido"))
}

fn parse_message_id(raw: &str) -> Result<MessageId, AppError> {
    raw.parse()
        .map_err(|_| AppError::field("messageId", "ID de mensagem inválido"))
}

// POST /api/chat/rooms
#[utoipa::path(
    post,
    path = "/api/chat/rooms",
    tag = "Chat",
    request_body = CreateRoomPayload,
    responses(
        (status = 201, description = "Sala criada (persistida ou temporária)", body = CreatedRoom),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_room(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Json(payload): Json<CreateRoomPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let created = app_state.chat_service.create_room(&employee, &payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/chat/rooms
#[utoipa::path(
    get,
    path = "/api/chat/rooms",
    tag = "Chat",
    responses((status = 200, description = "Salas do funcionário, com não lidas", body = Vec<RoomListing>)),
    security(("api_jwt" = []))
)]
pub async fn list_rooms(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
) -> Result<Json<Vec<RoomListing>>, AppError> {
    let rooms = app_state.chat_service.list_rooms(&employee).await?;
    Ok(Json(rooms))
}

// GET /api/chat/rooms/{room_id}/messages
#[utoipa::path(
    get,
    path = "/api/chat/rooms/{room_id}/messages",
    tag = "Chat",
    params(("room_id" = String, Path, description = "ID da sala (UUID ou temp-...)")),
    responses((status = 200, description = "Mensagens em ordem de criação", body = Vec<ChatMessageView>)),
    security(("api_jwt" = []))
)]
pub async fn list_messages(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(room_id): Path<String>,
) -> Result<Json<Vec<ChatMessageView>>, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let messages = app_state
        .chat_service
        .list_messages(&employee, &room_id)
        .await?;
    Ok(Json(messages))
}

// POST /api/chat/rooms/{room_id}/messages
#[utoipa::path(
    post,
    path = "/api/chat/rooms/{room_id}/messages",
    tag = "Chat",
    params(("room_id" = String, Path, description = "ID da sala")),
    request_body = SendMessagePayload,
    responses(
        (status = 201, description = "Mensagem enviada, enriquecida com o remetente", body = ChatMessageView),
        (status = 403, description = "Remetente não participa da sala")
    ),
    security(("api_jwt" = []))
)]
pub async fn send_message(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(room_id): Path<String>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let message = app_state
        .chat_service
        .send_message(&employee, &room_id, &payload)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// PATCH /api/chat/rooms/{room_id}/messages/{message_id}
#[utoipa::path(
    patch,
    path = "/api/chat/rooms/{room_id}/messages/{message_id}",
    tag = "Chat",
    params(
        ("room_id" = String, Path, description = "ID da sala"),
        ("message_id" = String, Path, description = "ID da mensagem")
    ),
    request_body = EditMessagePayload,
    responses((status = 200, description = "Mensagem editada", body = ChatMessageView)),
    security(("api_jwt" = []))
)]
pub async fn edit_message(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path((room_id, message_id)): Path<(String, String)>,
    Json(payload): Json<EditMessagePayload>,
) -> Result<Json<ChatMessageView>, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let room_id = parse_room_id(&room_id)?;
    let message_id = parse_message_id(&message_id)?;
    let message = app_state
        .chat_service
        .edit_message(&employee, &room_id, &message_id, payload.content.trim())
        .await?;
    Ok(Json(message))
}

// POST /api/chat/rooms/{room_id}/read
// Melhor esforço: 'updated: false' significa ponteiro não movido
#[utoipa::path(
    post,
    path = "/api/chat/rooms/{room_id}/read",
    tag = "Chat",
    params(("room_id" = String, Path, description = "ID da sala")),
    responses((status = 200, description = "Ponteiro de leitura atualizado (ou não)")),
    security(("api_jwt" = []))
)]
pub async fn mark_read(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let updated = app_state.chat_service.mark_read(&employee, &room_id).await;
    Ok(Json(json!({ "updated": updated })))
}

// PATCH /api/chat/rooms/{room_id}
#[utoipa::path(
    patch,
    path = "/api/chat/rooms/{room_id}",
    tag = "Chat",
    params(("room_id" = String, Path, description = "ID da sala")),
    request_body = RenameRoomPayload,
    responses((status = 204, description = "Sala renomeada")),
    security(("api_jwt" = []))
)]
pub async fn rename_room(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(room_id): Path<String>,
    Json(payload): Json<RenameRoomPayload>,
) -> Result<StatusCode, AppError> {
    payload.validate().map_err(AppError::ValidationError)?;

    let room_id = parse_room_id(&room_id)?;
    app_state
        .chat_service
        .rename_room(&employee, &room_id, payload.name.trim(), payload.description.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/chat/rooms/{room_id} — desativação lógica
#[utoipa::path(
    delete,
    path = "/api/chat/rooms/{room_id}",
    tag = "Chat",
    params(("room_id" = String, Path, description = "ID da sala")),
    responses((status = 204, description = "Sala desativada")),
    security(("api_jwt" = []))
)]
pub async fn deactivate_room(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(room_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let room_id = parse_room_id(&room_id)?;
    app_state
        .chat_service
        .deactivate_room(&employee, &room_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// POST /api/chat/rooms/{room_id}/participants
#[utoipa::path(
    post,
    path = "/api/chat/rooms/{room_id}/participants",
    tag = "Chat",
    params(("room_id" = String, Path, description = "ID da sala")),
    request_body = AddParticipantPayload,
    responses((status = 204, description = "Participante adicionado (ou reativado)")),
    security(("api_jwt" = []))
)]
pub async fn add_participant(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(room_id): Path<String>,
    Json(payload): Json<AddParticipantPayload>,
) -> Result<StatusCode, AppError> {
    let room_id = parse_room_id(&room_id)?;
    app_state
        .chat_service
        .add_participant(&employee, &room_id, payload.employee_id, payload.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// DELETE /api/chat/rooms/{room_id}/participants/{employee_id}
#[utoipa::path(
    delete,
    path = "/api/chat/rooms/{room_id}/participants/{employee_id}",
    tag = "Chat",
    params(
        ("room_id" = String, Path, description = "ID da sala"),
        ("employee_id" = Uuid, Path, description = "Funcionário a remover")
    ),
    responses((status = 204, description = "Participação desativada")),
    security(("api_jwt" = []))
)]
pub async fn remove_participant(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path((room_id, target)): Path<(String, Uuid)>,
) -> Result<StatusCode, AppError> {
    let room_id = parse_room_id(&room_id)?;
    app_state
        .chat_service
        .remove_participant(&employee, &room_id, target)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// PATCH /api/chat/rooms/{room_id}/participants/{employee_id}
#[utoipa::path(
    patch,
    path = "/api/chat/rooms/{room_id}/participants/{employee_id}",
    tag = "Chat",
    params(
        ("room_id" = String, Path, description = "ID da sala"),
        ("employee_id" = Uuid, Path, description = "Funcionário alvo")
    ),
    request_body = ChangeParticipantRolePayload,
    responses((status = 204, description = "Papel alterado")),
    security(("api_jwt" = []))
)]
pub async fn change_participant_role(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path((room_id, target)): Path<(String, Uuid)>,
    Json(payload): Json<ChangeParticipantRolePayload>,
) -> Result<StatusCode, AppError> {
    let room_id = parse_room_id(&room_id)?;
    app_state
        .chat_service
        .set_participant_role(&employee, &room_id, target, payload.role)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /api/chat/rooms/{room_id}/subscribe — WebSocket de eventos da sala.
// A assinatura confere a participação ANTES do upgrade; cancelar é
// fechar o socket (o receiver é solto e o hub limpa o canal órfão).
pub async fn subscribe_room(
    State(app_state): State<AppState>,
    AuthenticatedEmployee(employee): AuthenticatedEmployee,
    Path(room_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let room_id = parse_room_id(&room_id)?;
    let receiver = app_state.chat_service.subscribe(&employee, &room_id).await?;

    Ok(ws.on_upgrade(move |socket| stream_room_events(socket, receiver)))
}

async fn stream_room_events(
    mut socket: WebSocket,
    mut receiver: broadcast::Receiver<ChatEvent>,
) {
    // Merge idempotente por ID de mensagem: os dois caminhos de storage
    // publicam no mesmo hub, e o assinante não pode ver duplicata
    let mut delivery_log = DeliveryLog::new();

    loop {
        tokio::select! {
            event = receiver.recv() => match event {
                Ok(event) => {
                    if !delivery_log.should_deliver(&event) {
                        continue;
                    }
                    let Ok(payload) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Consumidor lento: perdeu eventos, mas só os dele
                    tracing::warn!("Assinante atrasado: {skipped} evento(s) descartado(s)");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                // A assinatura é só leitura: payloads do cliente são ignorados
                Some(Ok(_)) => {}
                // Cliente fechou (ou erro): encerrar solta o receiver
                _ => break,
            },
        }
    }
}
