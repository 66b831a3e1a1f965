// src/services/chat_fallback.rs

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::chat::{
    ChatMessageView, MessageId, MessageSender, MessageType, ParticipantRole, RoomId, RoomListing,
    RoomType,
};

// Limites do arena: o modo degradado é um cache, não um banco.
// Estourou, descarta o mais antigo.
const MAX_ROOMS: usize = 64;
const MAX_MESSAGES_PER_ROOM: usize = 500;

#[derive(Debug, Clone)]
pub struct TempParticipant {
    pub employee_id: Uuid,
    pub role: ParticipantRole,
    pub is_active: bool,
    pub last_read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct TempRoom {
    name: String,
    description: Option<String>,
    room_type: RoomType,
    #[allow(dead_code)]
    hospital_id: Uuid,
    is_active: bool,
    created_at: DateTime<Utc>,
    participants: Vec<TempParticipant>,
    // Ordem do Vec = ordem de inserção: é o desempate de created_at
    messages: Vec<ChatMessageView>,
}

#[derive(Default)]
struct Inner {
    rooms: HashMap<RoomId, TempRoom>,
    // Fila de chegada, para a evicção do mais antigo
    order: VecDeque<RoomId>,
}

// O arena do modo degradado: substituto em memória, local ao processo,
// usado quando a persistência sinaliza capacidade ausente. É injetado
// por construtor (nada de estado global) e guardado por Mutex, porque
// o servidor atende requisições concorrentes.
//
// Nada daqui sobrevive a restart nem cruza instâncias; é experiência
// de uso, não garantia de durabilidade.
pub struct FallbackChatStore {
    inner: Mutex<Inner>,
    max_rooms: usize,
    max_messages_per_room: usize,
}

impl Default for FallbackChatStore {
    fn default() -> Self {
        Self::with_limits(MAX_ROOMS, MAX_MESSAGES_PER_ROOM)
    }
}

impl FallbackChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_rooms: usize, max_messages_per_room: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_rooms,
            max_messages_per_room,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("lock do modo degradado envenenado")
    }

    // Cria uma sala temporária e enfileira a mensagem de boas-vindas
    // sintética. Devolve o ID temporário e a mensagem, já no formato
    // que o fanout entrega.
    pub fn create_room(
        &self,
        name: &str,
        description: Option<&str>,
        room_type: RoomType,
        hospital_id: Uuid,
        participants: Vec<(Uuid, ParticipantRole)>,
    ) -> (RoomId, ChatMessageView) {
        let room_id = RoomId::new_temp();
        let now = Utc::now();

        let welcome = ChatMessageView {
            id: MessageId::new_temp(),
            room_id: room_id.clone(),
            sender: None,
            content: format!("Sala \"{name}\" criada. Bem-vindos!"),
            message_type: MessageType::System,
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to: None,
            is_edited: false,
            created_at: now,
        };

        let room = TempRoom {
            name: name.to_string(),
            description: description.map(str::to_string),
            room_type,
            hospital_id,
            is_active: true,
            created_at: now,
            participants: participants
                .into_iter()
                .map(|(employee_id, role)| TempParticipant {
                    employee_id,
                    role,
                    is_active: true,
                    last_read_at: None,
                })
                .collect(),
            messages: vec![welcome.clone()],
        };

        let mut inner = self.inner();
        while inner.rooms.len() >= self.max_rooms {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.rooms.remove(&oldest);
                    tracing::warn!("Arena degradado cheio: descartando a sala {oldest}");
                }
                None => break,
            }
        }
        inner.order.push_back(room_id.clone());
        inner.rooms.insert(room_id.clone(), room);

        (room_id, welcome)
    }

    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.inner()
            .rooms
            .get(room_id)
            .is_some_and(|r| r.is_active)
    }

    // Sala desativada não tem participantes visíveis: envio, leitura e
    // assinatura passam todos por aqui.
    pub fn participant(&self, room_id: &RoomId, employee_id: Uuid) -> Option<TempParticipant> {
        self.inner()
            .rooms
            .get(room_id)
            .filter(|r| r.is_active)
            .and_then(|r| {
                r.participants
                    .iter()
                    .find(|p| p.employee_id == employee_id && p.is_active)
                    .cloned()
            })
    }

    // Acrescenta uma mensagem à sala temporária. O remetente já chega
    // resolvido (nome/e-mail), porque aqui não há join para enriquecer.
    #[allow(clippy::too_many_arguments)]
    pub fn append_message(
        &self,
        room_id: &RoomId,
        sender: Option<MessageSender>,
        content: &str,
        message_type: MessageType,
        file_url: Option<String>,
        file_name: Option<String>,
        file_size: Option<i64>,
        reply_to: Option<MessageId>,
    ) -> Option<ChatMessageView> {
        let mut inner = self.inner();
        let max = self.max_messages_per_room;
        let room = inner.rooms.get_mut(room_id).filter(|r| r.is_active)?;

        let message = ChatMessageView {
            id: MessageId::new_temp(),
            room_id: room_id.clone(),
            sender,
            content: content.to_string(),
            message_type,
            file_url,
            file_name,
            file_size,
            reply_to,
            is_edited: false,
            created_at: Utc::now(),
        };

        if room.messages.len() >= max {
            room.messages.remove(0);
        }
        room.messages.push(message.clone());

        Some(message)
    }

    // Leitura ordenada: created_at crescente, desempate pela ordem de
    // inserção (sort estável sobre o Vec já em ordem de chegada).
    pub fn list_messages(&self, room_id: &RoomId) -> Option<Vec<ChatMessageView>> {
        let inner = self.inner();
        let room = inner.rooms.get(room_id)?;
        let mut messages = room.messages.clone();
        messages.sort_by_key(|m| m.created_at);
        Some(messages)
    }

    pub fn edit_message(
        &self,
        room_id: &RoomId,
        message_id: &MessageId,
        editor: Uuid,
        content: &str,
    ) -> Option<ChatMessageView> {
        let mut inner = self.inner();
        let room = inner.rooms.get_mut(room_id)?;
        let message = room.messages.iter_mut().find(|m| {
            &m.id == message_id && m.sender.as_ref().is_some_and(|s| s.id == editor)
        })?;
        message.content = content.to_string();
        message.is_edited = true;
        Some(message.clone())
    }

    // Read-state com a MESMA semântica do caminho primário: o modo
    // degradado também rastreia o ponteiro de leitura.
    pub fn mark_read(&self, room_id: &RoomId, employee_id: Uuid) -> bool {
        let mut inner = self.inner();
        let Some(room) = inner.rooms.get_mut(room_id) else {
            return false;
        };
        match room
            .participants
            .iter_mut()
            .find(|p| p.employee_id == employee_id && p.is_active)
        {
            Some(p) => {
                p.last_read_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    // Salas temporárias do funcionário, com contagem de não lidas
    pub fn list_rooms_for(&self, employee_id: Uuid) -> Vec<RoomListing> {
        let inner = self.inner();
        let mut listings: Vec<RoomListing> = inner
            .rooms
            .iter()
            .filter(|(_, room)| room.is_active)
            .filter_map(|(id, room)| {
                let me = room
                    .participants
                    .iter()
                    .find(|p| p.employee_id == employee_id && p.is_active)?;
                let unread = room
                    .messages
                    .iter()
                    .filter(|m| match me.last_read_at {
                        Some(t0) => m.created_at > t0,
                        None => true,
                    })
                    .count() as i64;
                Some(RoomListing {
                    id: id.clone(),
                    name: room.name.clone(),
                    description: room.description.clone(),
                    room_type: room.room_type,
                    unread_count: unread,
                    degraded: true,
                    created_at: room.created_at,
                })
            })
            .collect();
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listings
    }

    pub fn rename_room(&self, room_id: &RoomId, name: &str, description: Option<&str>) -> bool {
        let mut inner = self.inner();
        match inner.rooms.get_mut(room_id).filter(|r| r.is_active) {
            Some(room) => {
                room.name = name.to_string();
                if description.is_some() {
                    room.description = description.map(str::to_string);
                }
                true
            }
            None => false,
        }
    }

    pub fn deactivate_room(&self, room_id: &RoomId) -> bool {
        let mut inner = self.inner();
        match inner.rooms.get_mut(room_id) {
            Some(room) => {
                room.is_active = false;
                true
            }
            None => false,
        }
    }

    pub fn add_participant(&self, room_id: &RoomId, employee_id: Uuid, role: ParticipantRole) -> bool {
        let mut inner = self.inner();
        let Some(room) = inner.rooms.get_mut(room_id).filter(|r| r.is_active) else {
            return false;
        };
        match room
            .participants
            .iter_mut()
            .find(|p| p.employee_id == employee_id)
        {
            // Reingresso: reativa, nunca duplica
            Some(p) => {
                p.is_active = true;
                p.role = role;
            }
            None => room.participants.push(TempParticipant {
                employee_id,
                role,
                is_active: true,
                last_read_at: None,
            }),
        }
        true
    }

    // Remoção lógica, preservando a atribuição do histórico
    pub fn deactivate_participant(&self, room_id: &RoomId, employee_id: Uuid) -> bool {
        let mut inner = self.inner();
        let Some(room) = inner.rooms.get_mut(room_id) else {
            return false;
        };
        match room
            .participants
            .iter_mut()
            .find(|p| p.employee_id == employee_id && p.is_active)
        {
            Some(p) => {
                p.is_active = false;
                true
            }
            None => false,
        }
    }

    pub fn set_participant_role(
        &self,
        room_id: &RoomId,
        employee_id: Uuid,
        role: ParticipantRole,
    ) -> bool {
        let mut inner = self.inner();
        let Some(room) = inner.rooms.get_mut(room_id) else {
            return false;
        };
        match room
            .participants
            .iter_mut()
            .find(|p| p.employee_id == employee_id && p.is_active)
        {
            Some(p) => {
                p.role = role;
                true
            }
            None => false,
        }
    }

    pub fn active_participants(&self, room_id: &RoomId) -> Vec<TempParticipant> {
        self.inner()
            .rooms
            .get(room_id)
            .map(|room| {
                room.participants
                    .iter()
                    .filter(|p| p.is_active)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> FallbackChatStore {
        FallbackChatStore::new()
    }

    fn direct_room(store: &FallbackChatStore, a: Uuid, b: Uuid) -> RoomId {
        let (room_id, _) = store.create_room(
            "Dra. Beatriz",
            None,
            RoomType::Direct,
            Uuid::new_v4(),
            vec![(a, ParticipantRole::Admin), (b, ParticipantRole::Member)],
        );
        room_id
    }

    #[test]
    fn direct_room_has_two_participants_and_creator_admin() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room_id = direct_room(&store, a, b);

        let participants = store.active_participants(&room_id);
        assert_eq!(participants.len(), 2);
        assert_eq!(store.participant(&room_id, a).unwrap().role, ParticipantRole::Admin);
        assert_eq!(store.participant(&room_id, b).unwrap().role, ParticipantRole::Member);
    }

    #[test]
    fn created_room_enqueues_a_system_welcome_message() {
        let store = store();
        let room_id = direct_room(&store, Uuid::new_v4(), Uuid::new_v4());

        let messages = store.list_messages(&room_id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_type, MessageType::System);
        assert!(messages[0].sender.is_none());
        assert!(messages[0].id.is_temp());
    }

    #[test]
    fn messages_read_back_in_insertion_order() {
        let store = store();
        let a = Uuid::new_v4();
        let room_id = direct_room(&store, a, Uuid::new_v4());

        for i in 0..5 {
            store
                .append_message(
                    &room_id,
                    None,
                    &format!("mensagem {i}"),
                    MessageType::Text,
                    None,
                    None,
                    None,
                    None,
                )
                .unwrap();
        }

        let messages = store.list_messages(&room_id).unwrap();
        let contents: Vec<_> = messages.iter().skip(1).map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            ["mensagem 0", "mensagem 1", "mensagem 2", "mensagem 3", "mensagem 4"]
        );
        // created_at nunca regride
        for pair in messages.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[test]
    fn append_to_unknown_or_inactive_room_returns_none() {
        let store = store();
        assert!(
            store
                .append_message(
                    &RoomId::new_temp(),
                    None,
                    "oi",
                    MessageType::Text,
                    None,
                    None,
                    None,
                    None
                )
                .is_none()
        );

        let room_id = direct_room(&store, Uuid::new_v4(), Uuid::new_v4());
        store.deactivate_room(&room_id);
        assert!(
            store
                .append_message(&room_id, None, "oi", MessageType::Text, None, None, None, None)
                .is_none()
        );
    }

    #[test]
    fn unread_count_only_counts_messages_after_last_read() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room_id = direct_room(&store, a, b);

        // 2 mensagens antes do mark_read (a de boas-vindas + 1)
        store
            .append_message(&room_id, None, "antes", MessageType::Text, None, None, None, None)
            .unwrap();
        assert!(store.mark_read(&room_id, b));

        // 3 mensagens depois
        for _ in 0..3 {
            store
                .append_message(&room_id, None, "depois", MessageType::Text, None, None, None, None)
                .unwrap();
        }

        let listing = store
            .list_rooms_for(b)
            .into_iter()
            .find(|l| l.id == room_id)
            .unwrap();
        assert_eq!(listing.unread_count, 3);
        assert!(listing.degraded);
    }

    #[test]
    fn mark_read_requires_active_membership() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room_id = direct_room(&store, a, b);

        assert!(!store.mark_read(&room_id, Uuid::new_v4()));
        store.deactivate_participant(&room_id, b);
        assert!(!store.mark_read(&room_id, b));
    }

    #[test]
    fn deactivated_room_has_no_visible_participants() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room_id = direct_room(&store, a, b);
        assert!(store.participant(&room_id, a).is_some());

        store.deactivate_room(&room_id);

        // Envio, leitura e assinatura são barrados pela mesma checagem
        assert!(store.participant(&room_id, a).is_none());
        assert!(store.participant(&room_id, b).is_none());
        assert!(!store.contains_room(&room_id));
    }

    #[test]
    fn soft_removed_participant_can_rejoin_without_duplicating() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room_id = direct_room(&store, a, b);

        assert!(store.deactivate_participant(&room_id, b));
        assert_eq!(store.active_participants(&room_id).len(), 1);

        assert!(store.add_participant(&room_id, b, ParticipantRole::Member));
        assert_eq!(store.active_participants(&room_id).len(), 2);
    }

    #[test]
    fn edit_is_sender_only_and_sets_the_flag() {
        let store = store();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let room_id = direct_room(&store, a, b);

        let sender = MessageSender {
            id: a,
            name: "Ana".into(),
            email: "ana@hospital.org".into(),
            position: None,
        };
        let message = store
            .append_message(
                &room_id,
                Some(sender),
                "rascunho",
                MessageType::Text,
                None,
                None,
                None,
                None,
            )
            .unwrap();

        // Outro participante não edita
        assert!(store.edit_message(&room_id, &message.id, b, "hack").is_none());

        let edited = store.edit_message(&room_id, &message.id, a, "final").unwrap();
        assert!(edited.is_edited);
        assert_eq!(edited.content, "final");
    }

    #[test]
    fn oldest_room_is_evicted_at_the_cap() {
        let store = FallbackChatStore::with_limits(2, 10);
        let a = Uuid::new_v4();
        let first = direct_room(&store, a, Uuid::new_v4());
        let second = direct_room(&store, a, Uuid::new_v4());
        let third = direct_room(&store, a, Uuid::new_v4());

        assert!(!store.contains_room(&first));
        assert!(store.contains_room(&second));
        assert!(store.contains_room(&third));
    }

    #[test]
    fn message_cap_drops_the_oldest() {
        let store = FallbackChatStore::with_limits(8, 3);
        let room_id = direct_room(&store, Uuid::new_v4(), Uuid::new_v4());

        for i in 0..5 {
            store
                .append_message(
                    &room_id,
                    None,
                    &format!("m{i}"),
                    MessageType::Text,
                    None,
                    None,
                    None,
                    None,
                )
                .unwrap();
        }

        let messages = store.list_messages(&room_id).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages.last().unwrap().content, "m4");
    }
}
