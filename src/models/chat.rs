// src/models/chat.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// --- ENUMS ---

// Mapeia o CREATE TYPE chat_room_type do banco
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "chat_room_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    Direct,
    Group,
    Department,
    Project,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "chat_participant_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "chat_message_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    File,
    Image,
    System,
}

// --- ESPAÇOS DE ID ---

// Prefixo dos IDs temporários do modo degradado. Um UUID nunca começa
// com "temp-", então os dois espaços de ID não podem colidir.
pub const TEMP_ID_PREFIX: &str = "temp-";

#[derive(Debug, Error)]
#[error("ID inválido: {0}")]
pub struct IdParseError(String);

macro_rules! chat_id {
    ($name:ident) => {
        // ID de sala/mensagem: ou um UUID persistido, ou um ID temporário
        // sintetizado pelo modo degradado. Os dois espaços nunca se misturam.
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            Persisted(Uuid),
            Temp(String),
        }

        impl $name {
            // Sintetiza um ID temporário: tempo + sufixo aleatório, prefixado.
            pub fn new_temp() -> Self {
                Self::Temp(format!(
                    "{}{}-{}",
                    TEMP_ID_PREFIX,
                    Utc::now().timestamp_millis(),
                    Uuid::new_v4().simple()
                ))
            }

            pub fn is_temp(&self) -> bool {
                matches!(self, Self::Temp(_))
            }

            pub fn as_persisted(&self) -> Option<Uuid> {
                match self {
                    Self::Persisted(id) => Some(*id),
                    Self::Temp(_) => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    Self::Persisted(id) => write!(f, "{id}"),
                    Self::Temp(id) => write!(f, "{id}"),
                }
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if let Some(suffix) = s.strip_prefix(TEMP_ID_PREFIX) {
                    if suffix.is_empty() {
                        return Err(IdParseError(s.to_string()));
                    }
                    return Ok(Self::Temp(s.to_string()));
                }
                Uuid::parse_str(s)
                    .map(Self::Persisted)
                    .map_err(|_| IdParseError(s.to_string()))
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self::Persisted(id)
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(d)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

chat_id!(RoomId);
chat_id!(MessageId);

// --- SALAS E PARTICIPANTES ---

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomType,
    pub hospital_id: Uuid,
    pub department_id: Option<Uuid>,
    pub created_by: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub room_id: Uuid,
    pub employee_id: Uuid,
    pub role: ParticipantRole,
    pub is_active: bool,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
}

// Resumo de sala para a listagem do usuário, com contagem de não lidas
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomType,
    pub hospital_id: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub unread_count: i64,
}

// Entrada unificada da listagem de salas: cobre salas persistidas e
// salas temporárias do modo degradado (por isso o ID viaja como string).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    #[schema(value_type = String)]
    pub id: RoomId,
    pub name: String,
    pub description: Option<String>,
    pub room_type: RoomType,
    pub unread_count: i64,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<RoomSummary> for RoomListing {
    fn from(s: RoomSummary) -> Self {
        Self {
            id: RoomId::Persisted(s.id),
            name: s.name,
            description: s.description,
            room_type: s.room_type,
            unread_count: s.unread_count,
            degraded: false,
            created_at: s.created_at,
        }
    }
}

// --- MENSAGENS ---

// Identidade do remetente anexada na leitura (join com employees)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub position: Option<String>,
}

// A linha crua do banco: mensagem + colunas do join de remetente.
// Validada na borda do storage e convertida em ChatMessageView.
#[derive(Debug, Clone, FromRow)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Option<Uuid>,
    pub content: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub reply_to: Option<Uuid>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub sender_name: Option<String>,
    pub sender_email: Option<String>,
    pub sender_position: Option<String>,
}

// A mensagem enriquecida que os dois caminhos de storage devolvem
// e que o fanout entrega aos assinantes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageView {
    #[schema(value_type = String)]
    pub id: MessageId,
    #[schema(value_type = String)]
    pub room_id: RoomId,
    pub sender: Option<MessageSender>,
    pub content: String,
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    #[schema(value_type = Option<String>)]
    pub reply_to: Option<MessageId>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessageView {
    fn from(row: ChatMessageRow) -> Self {
        // Remetente nulo = mensagem de sistema; o join não traz nada.
        let sender = match (row.sender_id, row.sender_name, row.sender_email) {
            (Some(id), Some(name), Some(email)) => Some(MessageSender {
                id,
                name,
                email,
                position: row.sender_position,
            }),
            _ => None,
        };

        Self {
            id: MessageId::Persisted(row.id),
            room_id: RoomId::Persisted(row.room_id),
            sender,
            content: row.content,
            message_type: row.message_type,
            file_url: row.file_url,
            file_name: row.file_name,
            file_size: row.file_size,
            reply_to: row.reply_to.map(MessageId::Persisted),
            is_edited: row.is_edited,
            created_at: row.created_at,
        }
    }
}

// --- EVENTOS DE ENTREGA (fanout) ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(tag = "event", content = "message", rename_all = "lowercase")]
pub enum ChatEvent {
    Insert(ChatMessageView),
    Update(ChatMessageView),
}

impl ChatEvent {
    pub fn message(&self) -> &ChatMessageView {
        match self {
            ChatEvent::Insert(m) | ChatEvent::Update(m) => m,
        }
    }
}

// --- PAYLOADS ---

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomPayload {
    // Opcional: salas diretas herdam o nome do interlocutor
    #[schema(example = "Plantão UTI")]
    pub name: Option<String>,
    pub description: Option<String>,
    pub room_type: RoomType,
    // Participantes além do criador (o criador entra sempre, como admin)
    #[serde(default)]
    pub participants: Vec<Uuid>,
    // Obrigatório para salas do tipo 'department'
    pub department_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_message_type")]
    pub message_type: MessageType,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    #[schema(value_type = Option<String>)]
    pub reply_to: Option<MessageId>,
}

fn default_message_type() -> MessageType {
    MessageType::Text
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditMessagePayload {
    #[validate(length(min = 1, message = "O conteúdo não pode ser vazio"))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenameRoomPayload {
    #[validate(length(min = 1, message = "O nome não pode ser vazio"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddParticipantPayload {
    pub employee_id: Uuid,
    #[serde(default = "default_participant_role")]
    pub role: ParticipantRole,
}

fn default_participant_role() -> ParticipantRole {
    ParticipantRole::Member
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangeParticipantRolePayload {
    pub role: ParticipantRole,
}

// Resposta de criação de sala: o ID pode ser persistido ou temporário,
// por isso viaja como string.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRoom {
    #[schema(value_type = String)]
    pub id: RoomId,
    pub name: String,
    pub room_type: RoomType,
    // true quando a sala vive apenas no modo degradado em memória
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_id_round_trip_persisted() {
        let id = Uuid::new_v4();
        let parsed: RoomId = id.to_string().parse().unwrap();
        assert_eq!(parsed, RoomId::Persisted(id));
        assert_eq!(parsed.to_string(), id.to_string());
        assert!(!parsed.is_temp());
    }

    #[test]
    fn temp_ids_carry_prefix_and_never_parse_as_uuid() {
        let id = RoomId::new_temp();
        let text = id.to_string();
        assert!(text.starts_with(TEMP_ID_PREFIX));
        assert!(Uuid::parse_str(&text).is_err());

        let parsed: RoomId = text.parse().unwrap();
        assert_eq!(parsed, id);
        assert!(parsed.is_temp());
        assert_eq!(parsed.as_persisted(), None);
    }

    #[test]
    fn temp_ids_are_unique() {
        let a = MessageId::new_temp();
        let b = MessageId::new_temp();
        assert_ne!(a, b);
    }

    #[test]
    fn bare_prefix_is_rejected() {
        assert!("temp-".parse::<RoomId>().is_err());
        assert!("nem-uuid-nem-temp".parse::<RoomId>().is_err());
    }

    #[test]
    fn message_row_without_sender_is_a_system_view() {
        let row = ChatMessageRow {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            sender_id: None,
            content: "Bem-vindos!".into(),
            message_type: MessageType::System,
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to: None,
            is_edited: false,
            created_at: Utc::now(),
            sender_name: None,
            sender_email: None,
            sender_position: None,
        };
        let view = ChatMessageView::from(row);
        assert!(view.sender.is_none());
        assert_eq!(view.message_type, MessageType::System);
    }
}
