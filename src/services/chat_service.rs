// src/services/chat_service.rs

use sqlx::PgPool;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    common::{db_utils, error::AppError},
    db::{EmployeeRepository, HospitalRepository, MessageRepository, RoomRepository},
    models::{
        chat::{
            ChatEvent, ChatMessageView, CreateRoomPayload, CreatedRoom, MessageId, MessageSender,
            MessageType, ParticipantRole, RoomId, RoomListing, RoomType, SendMessagePayload,
        },
        employee::Employee,
    },
    services::{chat_fallback::FallbackChatStore, fanout::ChatFanout},
};

// =========================================================================
//  ROTEADOR DE STORAGE
// =========================================================================

// Decide UMA vez entre o caminho primário (Postgres) e o degradado
// (arena em memória). O primeiro erro com assinatura de capacidade
// ausente vira uma decisão pegajosa: nada de re-sondar a cada chamada,
// nada de estado híbrido oscilante.
#[derive(Default)]
pub struct StorageRouter {
    degraded: AtomicBool,
}

impl StorageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    pub fn note_capability_absent(&self) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "⚠️ Persistência de chat indisponível (relação/policy ausente): \
                 mudando para o modo degradado em memória"
            );
        }
    }
}

// A assinatura de "capacidade ausente": relação inexistente (42P01) ou
// rejeição de policy (42501). Qualquer outro erro NÃO é recuperável
// localmente e sobe para o chamador.
pub(crate) fn code_signals_missing_capability(code: &str) -> bool {
    matches!(code, "42P01" | "42501")
}

fn capability_absent(err: &AppError) -> bool {
    let (AppError::DatabaseError(e)
    | AppError::RoomCreationFailed(e)
    | AppError::MessageSendFailed(e)) = err
    else {
        return false;
    };
    e.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code_signals_missing_capability(&code))
}

fn field_error(field: &'static str, message: &'static str) -> AppError {
    AppError::field(field, message)
}

// =========================================================================
//  HELPERS PUROS (validação e montagem de participantes)
// =========================================================================

// Monta o conjunto final de participantes: criador primeiro (sempre
// admin), depois os explícitos e os membros do departamento, cada
// funcionário uma única vez mesmo que apareça em mais de uma fonte.
fn assemble_participants(
    creator_id: Uuid,
    explicit: &[Uuid],
    department_members: &[Uuid],
) -> Vec<(Uuid, ParticipantRole)> {
    let mut result = vec![(creator_id, ParticipantRole::Admin)];
    for &id in explicit.iter().chain(department_members) {
        if result.iter().all(|(existing, _)| *existing != id) {
            result.push((id, ParticipantRole::Member));
        }
    }
    result
}

// Conteúdo vazio só é aceitável como legenda ausente de anexo
fn validate_message_content(payload: &SendMessagePayload) -> Result<(), AppError> {
    if !payload.content.trim().is_empty() {
        return Ok(());
    }
    let has_attachment = matches!(payload.message_type, MessageType::File | MessageType::Image)
        && payload.file_url.is_some();
    if has_attachment {
        return Ok(());
    }
    Err(field_error("content", "O conteúdo da mensagem não pode ser vazio"))
}

// Para salas diretas: exatamente um interlocutor além do criador
fn direct_counterpart(creator_id: Uuid, explicit: &[Uuid]) -> Result<Uuid, AppError> {
    let mut others = explicit.iter().filter(|&&id| id != creator_id);
    match (others.next(), others.next()) {
        (Some(&other), None) => Ok(other),
        _ => Err(field_error(
            "participants",
            "Uma conversa direta exige exatamente um interlocutor",
        )),
    }
}

// A tenancy limita tudo: ninguém entra numa sala de outro hospital,
// nem por ID explícito, nem por expansão de departamento.
fn ensure_same_hospital(creator: &Employee, target: &Employee) -> Result<(), AppError> {
    if target.hospital_id == creator.hospital_id {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Funcionário de outro hospital.".to_string(),
        ))
    }
}

fn sender_info(employee: &Employee) -> MessageSender {
    MessageSender {
        id: employee.id,
        name: employee.name.clone(),
        email: employee.email.clone(),
        position: employee.position.clone(),
    }
}

// Caminho degradado do envio: acrescenta no arena e entrega aos
// assinantes locais de forma síncrona, na mesma chamada.
fn append_local(
    fallback: &FallbackChatStore,
    fanout: &ChatFanout,
    room_id: &RoomId,
    sender: Option<MessageSender>,
    payload: &SendMessagePayload,
) -> Option<ChatMessageView> {
    let message = fallback.append_message(
        room_id,
        sender,
        payload.content.trim(),
        payload.message_type,
        payload.file_url.clone(),
        payload.file_name.clone(),
        payload.file_size,
        payload.reply_to.clone(),
    )?;
    fanout.publish(ChatEvent::Insert(message.clone()));
    Some(message)
}

// =========================================================================
//  O SERVIÇO
// =========================================================================

#[derive(Clone)]
pub struct ChatService {
    pool: PgPool,
    room_repo: RoomRepository,
    message_repo: MessageRepository,
    employee_repo: EmployeeRepository,
    hospital_repo: HospitalRepository,
    fallback: Arc<FallbackChatStore>,
    fanout: ChatFanout,
    router: Arc<StorageRouter>,
}

impl ChatService {
    pub fn new(
        pool: PgPool,
        room_repo: RoomRepository,
        message_repo: MessageRepository,
        employee_repo: EmployeeRepository,
        hospital_repo: HospitalRepository,
        fallback: Arc<FallbackChatStore>,
        fanout: ChatFanout,
    ) -> Self {
        Self {
            pool,
            room_repo,
            message_repo,
            employee_repo,
            hospital_repo,
            fallback,
            fanout,
            router: Arc::new(StorageRouter::new()),
        }
    }

    // ---------------------------------------------------------------------
    //  Criação de sala
    // ---------------------------------------------------------------------

    pub async fn create_room(
        &self,
        creator: &Employee,
        payload: &CreateRoomPayload,
    ) -> Result<CreatedRoom, AppError> {
        // 1. Resolve os participantes explícitos. Cada ID precisa existir
        // E pertencer ao hospital do criador; um UUID de outro tenant é
        // rejeitado antes de qualquer escrita.
        let mut explicit: Vec<Employee> = Vec::with_capacity(payload.participants.len());
        for &id in &payload.participants {
            if id == creator.id {
                continue;
            }
            let participant = self
                .employee_repo
                .find_by_id(id)
                .await?
                .ok_or(AppError::NotFound("Funcionário"))?;
            ensure_same_hospital(creator, &participant)?;
            explicit.push(participant);
        }
        let explicit_ids: Vec<Uuid> = explicit.iter().map(|e| e.id).collect();

        // 2. Valida e monta o conjunto de participantes por tipo de sala
        let mut department_members: Vec<Uuid> = Vec::new();
        let name: String = match payload.room_type {
            RoomType::Direct => {
                let other = direct_counterpart(creator.id, &explicit_ids)?;
                match payload.name.as_deref().map(str::trim) {
                    Some(name) if !name.is_empty() => name.to_string(),
                    // Sem nome: a sala direta herda o nome do interlocutor
                    _ => explicit
                        .iter()
                        .find(|e| e.id == other)
                        .map(|e| e.name.clone())
                        .ok_or(AppError::NotFound("Funcionário"))?,
                }
            }
            RoomType::Department => {
                let department_id = payload
                    .department_id
                    .ok_or_else(|| field_error("departmentId", "Informe o departamento da sala"))?;
                // O departamento precisa ser do hospital do criador
                let department = self
                    .hospital_repo
                    .find_department(department_id)
                    .await?
                    .ok_or(AppError::NotFound("Departamento"))?;
                if department.hospital_id != creator.hospital_id {
                    return Err(AppError::Forbidden(
                        "Departamento de outro hospital.".to_string(),
                    ));
                }
                // Expansão automática: todos os funcionários ativos do
                // departamento entram, mesmo que o criador não seja dele
                department_members = self
                    .employee_repo
                    .list_active_by_department(department_id)
                    .await?
                    .into_iter()
                    .filter(|e| e.hospital_id == creator.hospital_id)
                    .map(|e| e.id)
                    .collect();
                required_name(payload)?
            }
            RoomType::Group | RoomType::Project => required_name(payload)?,
        };

        let participants =
            assemble_participants(creator.id, &explicit_ids, &department_members);
        if participants.len() < 2 {
            return Err(field_error(
                "participants",
                "Uma sala precisa de pelo menos um participante além do criador",
            ));
        }

        // 3. Caminho primário, a menos que o roteador já tenha decidido
        if !self.router.is_degraded() {
            match self
                .create_room_remote(creator, payload, &name, &participants)
                .await
            {
                Ok(room_id) => {
                    return Ok(CreatedRoom {
                        id: RoomId::Persisted(room_id),
                        name,
                        room_type: payload.room_type,
                        degraded: false,
                    });
                }
                Err(e) if capability_absent(&e) => self.router.note_capability_absent(),
                // Qualquer outro erro de persistência sobe sem retry
                Err(AppError::DatabaseError(cause)) => {
                    return Err(AppError::RoomCreationFailed(cause));
                }
                Err(e) => return Err(e),
            }
        }

        // 4. Caminho degradado: sala temporária + boas-vindas sintéticas
        let (room_id, welcome) = self.fallback.create_room(
            &name,
            payload.description.as_deref(),
            payload.room_type,
            creator.hospital_id,
            participants,
        );
        self.fanout.publish(ChatEvent::Insert(welcome));

        Ok(CreatedRoom {
            id: room_id,
            name,
            room_type: payload.room_type,
            degraded: true,
        })
    }

    async fn create_room_remote(
        &self,
        creator: &Employee,
        payload: &CreateRoomPayload,
        name: &str,
        participants: &[(Uuid, ParticipantRole)],
    ) -> Result<Uuid, AppError> {
        // Sala + participantes são atômicos: ou entra tudo, ou nada
        let mut tx = self.pool.begin().await?;
        db_utils::apply_rls(&mut *tx, creator.hospital_id, creator.id).await?;

        let room = self
            .room_repo
            .create_room(
                &mut *tx,
                name,
                payload.description.as_deref(),
                payload.room_type,
                creator.hospital_id,
                payload.department_id,
                creator.id,
            )
            .await?;

        for (employee_id, role) in participants {
            self.room_repo
                .add_participant(&mut *tx, room.id, *employee_id, *role)
                .await?;
        }

        tx.commit().await?;
        Ok(room.id)
    }

    // ---------------------------------------------------------------------
    //  Envio e leitura de mensagens
    // ---------------------------------------------------------------------

    pub async fn send_message(
        &self,
        sender: &Employee,
        room_id: &RoomId,
        payload: &SendMessagePayload,
    ) -> Result<ChatMessageView, AppError> {
        validate_message_content(payload)?;

        // Sala temporária: o envio resolve inteiro no arena
        if room_id.is_temp() {
            if !self.fallback.contains_room(room_id) {
                return Err(AppError::NotFound("Sala"));
            }
            if self.fallback.participant(room_id, sender.id).is_none() {
                return Err(AppError::Forbidden(
                    "Você não participa desta sala.".to_string(),
                ));
            }
            return append_local(
                &self.fallback,
                &self.fanout,
                room_id,
                Some(sender_info(sender)),
                payload,
            )
            .ok_or(AppError::NotFound("Sala"));
        }

        // Sala persistida: caminho primário. IDs persistidos nunca são
        // servidos pelo arena (os espaços de ID não se misturam), então
        // um erro aqui sobe, marcado com a causa.
        let room_uuid = room_id
            .as_persisted()
            .ok_or(AppError::NotFound("Sala"))?;

        match self.send_message_remote(sender, room_uuid, payload).await {
            Ok(view) => {
                self.fanout.publish(ChatEvent::Insert(view.clone()));
                Ok(view)
            }
            Err(e) if capability_absent(&e) => {
                self.router.note_capability_absent();
                match e {
                    AppError::DatabaseError(cause) => Err(AppError::MessageSendFailed(cause)),
                    other => Err(other),
                }
            }
            Err(AppError::DatabaseError(cause)) => Err(AppError::MessageSendFailed(cause)),
            Err(e) => Err(e),
        }
    }

    async fn send_message_remote(
        &self,
        sender: &Employee,
        room_uuid: Uuid,
        payload: &SendMessagePayload,
    ) -> Result<ChatMessageView, AppError> {
        let mut conn =
            db_utils::rls_connection(&self.pool, sender.hospital_id, sender.id).await?;

        // Sala desativada não recebe mensagens (find_room filtra is_active,
        // o mesmo contrato do arena)
        self.room_repo
            .find_room(&mut *conn, room_uuid)
            .await?
            .ok_or(AppError::NotFound("Sala"))?;

        // Remetente precisa ser participante ativo no momento do envio
        self.room_repo
            .find_participant(&mut *conn, room_uuid, sender.id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Você não participa desta sala.".to_string()))?;

        let reply_to = match &payload.reply_to {
            Some(id) => Some(id.as_persisted().ok_or(AppError::NotFound("Mensagem"))?),
            None => None,
        };

        let message_id = self
            .message_repo
            .insert_message(
                &mut *conn,
                room_uuid,
                Some(sender.id),
                payload.content.trim(),
                payload.message_type,
                payload.file_url.as_deref(),
                payload.file_name.as_deref(),
                payload.file_size,
                reply_to,
            )
            .await?;

        // O INSERT não devolve o remetente enriquecido: relemos com join
        let row = self
            .message_repo
            .fetch_with_sender(&mut *conn, message_id)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))?;

        Ok(ChatMessageView::from(row))
    }

    pub async fn list_messages(
        &self,
        employee: &Employee,
        room_id: &RoomId,
    ) -> Result<Vec<ChatMessageView>, AppError> {
        if room_id.is_temp() {
            if self.fallback.participant(room_id, employee.id).is_none() {
                return Err(AppError::Forbidden(
                    "Você não participa desta sala.".to_string(),
                ));
            }
            return self
                .fallback
                .list_messages(room_id)
                .ok_or(AppError::NotFound("Sala"));
        }

        let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
        let mut conn =
            db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;

        self.room_repo
            .find_room(&mut *conn, room_uuid)
            .await?
            .ok_or(AppError::NotFound("Sala"))?;

        self.room_repo
            .find_participant(&mut *conn, room_uuid, employee.id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Você não participa desta sala.".to_string()))?;

        let rows = self.message_repo.list_for_room(&mut *conn, room_uuid).await?;
        Ok(rows.into_iter().map(ChatMessageView::from).collect())
    }

    pub async fn edit_message(
        &self,
        editor: &Employee,
        room_id: &RoomId,
        message_id: &MessageId,
        content: &str,
    ) -> Result<ChatMessageView, AppError> {
        if room_id.is_temp() {
            let view = self
                .fallback
                .edit_message(room_id, message_id, editor.id, content)
                .ok_or(AppError::NotFound("Mensagem"))?;
            self.fanout.publish(ChatEvent::Update(view.clone()));
            return Ok(view);
        }

        let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
        let message_uuid = message_id
            .as_persisted()
            .ok_or(AppError::NotFound("Mensagem"))?;

        let mut conn =
            db_utils::rls_connection(&self.pool, editor.hospital_id, editor.id).await?;

        // Só o autor edita; o UPDATE filtra por sender_id
        let edited = self
            .message_repo
            .edit_message(&mut *conn, message_uuid, editor.id, content)
            .await?;
        if !edited {
            return Err(AppError::NotFound("Mensagem"));
        }

        let row = self
            .message_repo
            .fetch_with_sender(&mut *conn, message_uuid)
            .await?
            .ok_or(AppError::NotFound("Mensagem"))?;
        let view = ChatMessageView::from(row);
        debug_assert_eq!(view.room_id, RoomId::Persisted(room_uuid));

        self.fanout.publish(ChatEvent::Update(view.clone()));
        Ok(view)
    }

    // ---------------------------------------------------------------------
    //  Listagem de salas (persistidas + temporárias)
    // ---------------------------------------------------------------------

    pub async fn list_rooms(&self, employee: &Employee) -> Result<Vec<RoomListing>, AppError> {
        let mut listings: Vec<RoomListing> = Vec::new();

        if !self.router.is_degraded() {
            let mut conn =
                db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
            match self
                .room_repo
                .list_rooms_for_employee(&mut *conn, employee.id)
                .await
            {
                Ok(summaries) => listings.extend(summaries.into_iter().map(RoomListing::from)),
                Err(e) if capability_absent(&e) => self.router.note_capability_absent(),
                Err(e) => return Err(e),
            }
        }

        listings.extend(self.fallback.list_rooms_for(employee.id));
        listings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listings)
    }

    // ---------------------------------------------------------------------
    //  Read-state tracker
    // ---------------------------------------------------------------------

    // Melhor esforço: falha de persistência é logada e engolida (retorna
    // false); a contagem de não lidas fica defasada até a próxima leitura.
    // Salas temporárias têm a MESMA semântica no arena.
    pub async fn mark_read(&self, employee: &Employee, room_id: &RoomId) -> bool {
        if room_id.is_temp() {
            return self.fallback.mark_read(room_id, employee.id);
        }

        let Some(room_uuid) = room_id.as_persisted() else {
            return false;
        };

        let result: Result<bool, AppError> = async {
            let mut conn =
                db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
            self.room_repo.mark_read(&mut *conn, room_uuid, employee.id).await
        }
        .await;

        match result {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!("Falha ao atualizar o ponteiro de leitura: {e}");
                false
            }
        }
    }

    // ---------------------------------------------------------------------
    //  Administração da sala (papel admin de participante)
    // ---------------------------------------------------------------------

    async fn ensure_room_admin(
        &self,
        employee: &Employee,
        room_id: &RoomId,
    ) -> Result<(), AppError> {
        let role = if room_id.is_temp() {
            self.fallback
                .participant(room_id, employee.id)
                .map(|p| p.role)
        } else {
            let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
            let mut conn =
                db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
            self.room_repo
                .find_participant(&mut *conn, room_uuid, employee.id)
                .await?
                .map(|p| p.role)
        };

        match role {
            Some(ParticipantRole::Admin) => Ok(()),
            Some(_) => Err(AppError::Forbidden(
                "Apenas administradores da sala podem fazer isso.".to_string(),
            )),
            None => Err(AppError::Forbidden(
                "Você não participa desta sala.".to_string(),
            )),
        }
    }

    pub async fn rename_room(
        &self,
        employee: &Employee,
        room_id: &RoomId,
        name: &str,
        description: Option<&str>,
    ) -> Result<(), AppError> {
        self.ensure_room_admin(employee, room_id).await?;

        if room_id.is_temp() {
            if self.fallback.rename_room(room_id, name, description) {
                return Ok(());
            }
            return Err(AppError::NotFound("Sala"));
        }

        let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
        let mut conn =
            db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
        self.room_repo
            .rename_room(&mut *conn, room_uuid, name, description)
            .await?
            .ok_or(AppError::NotFound("Sala"))?;
        Ok(())
    }

    pub async fn deactivate_room(
        &self,
        employee: &Employee,
        room_id: &RoomId,
    ) -> Result<(), AppError> {
        self.ensure_room_admin(employee, room_id).await?;

        let ok = if room_id.is_temp() {
            self.fallback.deactivate_room(room_id)
        } else {
            let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
            let mut conn =
                db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
            self.room_repo.deactivate_room(&mut *conn, room_uuid).await?
        };

        if ok { Ok(()) } else { Err(AppError::NotFound("Sala")) }
    }

    pub async fn add_participant(
        &self,
        employee: &Employee,
        room_id: &RoomId,
        target: Uuid,
        role: ParticipantRole,
    ) -> Result<(), AppError> {
        self.ensure_room_admin(employee, room_id).await?;

        // Mesmo escopo da criação: o alvo precisa ser do mesmo hospital
        let target_employee = self
            .employee_repo
            .find_by_id(target)
            .await?
            .ok_or(AppError::NotFound("Funcionário"))?;
        ensure_same_hospital(employee, &target_employee)?;

        if room_id.is_temp() {
            if self.fallback.add_participant(room_id, target, role) {
                return Ok(());
            }
            return Err(AppError::NotFound("Sala"));
        }

        let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
        let mut conn =
            db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
        self.room_repo
            .add_participant(&mut *conn, room_uuid, target, role)
            .await?;
        Ok(())
    }

    pub async fn remove_participant(
        &self,
        employee: &Employee,
        room_id: &RoomId,
        target: Uuid,
    ) -> Result<(), AppError> {
        // Sair da sala é permitido; remover terceiros exige admin
        if target != employee.id {
            self.ensure_room_admin(employee, room_id).await?;
        }

        let ok = if room_id.is_temp() {
            self.fallback.deactivate_participant(room_id, target)
        } else {
            let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
            let mut conn =
                db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
            self.room_repo
                .deactivate_participant(&mut *conn, room_uuid, target)
                .await?
        };

        if ok { Ok(()) } else { Err(AppError::NotFound("Participante")) }
    }

    pub async fn set_participant_role(
        &self,
        employee: &Employee,
        room_id: &RoomId,
        target: Uuid,
        role: ParticipantRole,
    ) -> Result<(), AppError> {
        // Ninguém altera o próprio papel, nem sendo admin
        if target == employee.id {
            return Err(AppError::Forbidden(
                "Você não pode alterar o próprio papel na sala.".to_string(),
            ));
        }
        self.ensure_room_admin(employee, room_id).await?;

        let ok = if room_id.is_temp() {
            self.fallback.set_participant_role(room_id, target, role)
        } else {
            let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
            let mut conn =
                db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
            self.room_repo
                .set_participant_role(&mut *conn, room_uuid, target, role)
                .await?
        };

        if ok { Ok(()) } else { Err(AppError::NotFound("Participante")) }
    }

    // ---------------------------------------------------------------------
    //  Assinatura (usada pelo handler de WebSocket)
    // ---------------------------------------------------------------------

    pub async fn subscribe(
        &self,
        employee: &Employee,
        room_id: &RoomId,
    ) -> Result<broadcast::Receiver<ChatEvent>, AppError> {
        // Só participante ativo de sala ativa assina
        let is_member = if room_id.is_temp() {
            self.fallback.participant(room_id, employee.id).is_some()
        } else {
            let room_uuid = room_id.as_persisted().ok_or(AppError::NotFound("Sala"))?;
            let mut conn =
                db_utils::rls_connection(&self.pool, employee.hospital_id, employee.id).await?;
            self.room_repo
                .find_room(&mut *conn, room_uuid)
                .await?
                .ok_or(AppError::NotFound("Sala"))?;
            self.room_repo
                .find_participant(&mut *conn, room_uuid, employee.id)
                .await?
                .is_some()
        };

        if !is_member {
            return Err(AppError::Forbidden(
                "Você não participa desta sala.".to_string(),
            ));
        }

        Ok(self.fanout.subscribe(room_id))
    }
}

fn required_name(payload: &CreateRoomPayload) -> Result<String, AppError> {
    match payload.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(field_error("name", "O nome da sala é obrigatório")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::employee::{EmployeeRole, EmployeeStatus};
    use chrono::Utc;

    fn employee_in(hospital_id: Uuid) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@hospital.org".into(),
            password_hash: "!".into(),
            role: EmployeeRole::Employee,
            status: EmployeeStatus::Active,
            hospital_id,
            department_id: None,
            position: Some("Enfermeira".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn capability_signature_matches_only_missing_relation_and_policy() {
        assert!(code_signals_missing_capability("42P01"));
        assert!(code_signals_missing_capability("42501"));
        // Violação de unicidade, deadlock etc. NÃO disparam fallback
        assert!(!code_signals_missing_capability("23505"));
        assert!(!code_signals_missing_capability("40P01"));
    }

    #[test]
    fn router_decision_is_sticky() {
        let router = StorageRouter::new();
        assert!(!router.is_degraded());
        router.note_capability_absent();
        assert!(router.is_degraded());
        // Idempotente
        router.note_capability_absent();
        assert!(router.is_degraded());
    }

    #[test]
    fn participants_are_deduplicated_with_creator_first_as_admin() {
        let creator = Uuid::new_v4();
        let (e1, e2, e3) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        // Criador repetido na lista explícita e e2 repetido no departamento
        let result = assemble_participants(creator, &[e1, creator, e2], &[e2, e3]);

        assert_eq!(result.len(), 4);
        assert_eq!(result[0], (creator, ParticipantRole::Admin));
        let members: Vec<Uuid> = result[1..].iter().map(|(id, _)| *id).collect();
        assert_eq!(members, vec![e1, e2, e3]);
        assert!(result[1..].iter().all(|(_, r)| *r == ParticipantRole::Member));
    }

    #[test]
    fn department_expansion_includes_outside_creator() {
        // Cenário: criador fora do departamento {E1, E2, E3}
        let creator = Uuid::new_v4();
        let dept: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

        let result = assemble_participants(creator, &[], &dept);
        assert_eq!(result.len(), 4);
        assert_eq!(result[0].0, creator);
    }

    #[test]
    fn participants_from_another_hospital_are_rejected() {
        let hospital_a = Uuid::new_v4();
        let creator = employee_in(hospital_a);
        let colleague = employee_in(hospital_a);
        let outsider = employee_in(Uuid::new_v4());

        assert!(ensure_same_hospital(&creator, &colleague).is_ok());
        assert!(matches!(
            ensure_same_hospital(&creator, &outsider),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn direct_room_requires_exactly_one_counterpart() {
        let creator = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert_eq!(direct_counterpart(creator, &[other]).unwrap(), other);
        // O criador presente na lista não conta como interlocutor
        assert_eq!(direct_counterpart(creator, &[creator, other]).unwrap(), other);

        assert!(direct_counterpart(creator, &[]).is_err());
        assert!(direct_counterpart(creator, &[other, Uuid::new_v4()]).is_err());
    }

    #[test]
    fn empty_content_is_rejected_unless_it_captions_an_attachment() {
        let mut payload = SendMessagePayload {
            content: "  ".into(),
            message_type: MessageType::Text,
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to: None,
        };
        assert!(validate_message_content(&payload).is_err());

        payload.message_type = MessageType::File;
        // Anexo sem URL continua inválido
        assert!(validate_message_content(&payload).is_err());

        payload.file_url = Some("/uploads/escala.pdf".into());
        assert!(validate_message_content(&payload).is_ok());

        payload.message_type = MessageType::Text;
        payload.content = "olá".into();
        assert!(validate_message_content(&payload).is_ok());
    }

    #[tokio::test]
    async fn local_append_delivers_exactly_once_to_a_subscriber() {
        let fallback = FallbackChatStore::new();
        let fanout = ChatFanout::new();

        let sender = employee_in(Uuid::new_v4());
        let receiver_id = Uuid::new_v4();

        let (room_id, _) = fallback.create_room(
            "Plantão",
            None,
            RoomType::Group,
            sender.hospital_id,
            vec![
                (sender.id, ParticipantRole::Admin),
                (receiver_id, ParticipantRole::Member),
            ],
        );

        // B já está assinado quando A envia
        let mut rx = fanout.subscribe(&room_id);

        let payload = SendMessagePayload {
            content: "hello".into(),
            message_type: MessageType::Text,
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to: None,
        };
        let sent = append_local(
            &fallback,
            &fanout,
            &room_id,
            Some(sender_info(&sender)),
            &payload,
        )
        .unwrap();

        let event = rx.try_recv().unwrap();
        let ChatEvent::Insert(received) = event else {
            panic!("esperava um Insert");
        };
        assert_eq!(received.content, "hello");
        assert_eq!(received.sender.as_ref().unwrap().id, sender.id);
        assert_eq!(received.id, sent.id);

        // Exatamente uma entrega: nem duplicata, nem perda
        assert!(rx.try_recv().is_err());
    }
}
