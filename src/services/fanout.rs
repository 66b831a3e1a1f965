// src/services/fanout.rs

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::models::chat::{ChatEvent, MessageId, RoomId};

// Capacidade do canal por sala. Um assinante lento acumula atraso no
// próprio receiver (e eventualmente perde mensagens por lag) em vez de
// atrasar os demais assinantes da sala.
const CHANNEL_CAPACITY: usize = 256;

// O hub de entrega em tempo real: um canal broadcast por sala.
// Os dois caminhos de storage (primário e degradado) publicam aqui,
// então o consumidor ainda precisa do DeliveryLog para deduplicar.
#[derive(Clone, Default)]
pub struct ChatFanout {
    rooms: Arc<Mutex<HashMap<RoomId, broadcast::Sender<ChatEvent>>>>,
}

impl ChatFanout {
    pub fn new() -> Self {
        Self::default()
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<RoomId, broadcast::Sender<ChatEvent>>> {
        self.rooms.lock().expect("lock do fanout envenenado")
    }

    // Assina os eventos de uma sala. Cancelar = soltar o receiver;
    // é idempotente e não falha se o canal nunca foi criado.
    pub fn subscribe(&self, room_id: &RoomId) -> broadcast::Receiver<ChatEvent> {
        let mut rooms = self.rooms();
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    // Publica um evento para os assinantes da sala. Retorna quantos
    // receivers o receberam; sala sem assinantes não é erro.
    pub fn publish(&self, event: ChatEvent) -> usize {
        let room_id = event.message().room_id.clone();
        let mut rooms = self.rooms();

        let Some(tx) = rooms.get(&room_id) else {
            return 0;
        };

        let delivered = tx.send(event).unwrap_or(0);

        // Canal órfão (todo mundo cancelou): remove para não crescer sem limite
        if tx.receiver_count() == 0 {
            rooms.remove(&room_id);
        }

        delivered
    }

    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.rooms()
            .get(room_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

// Merge idempotente por ID de mensagem, do lado do consumidor.
// Entregas duplicadas ou fora de ordem (um Update chegando antes do
// Insert correspondente) são coalescidas: cada mensagem aparece uma vez.
#[derive(Default)]
pub struct DeliveryLog {
    seen: HashSet<MessageId>,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retorna true se o evento deve ser entregue ao assinante.
    pub fn should_deliver(&mut self, event: &ChatEvent) -> bool {
        match event {
            // Insert duplicado do mesmo ID é descartado
            ChatEvent::Insert(m) => self.seen.insert(m.id.clone()),
            // Update sempre passa (edição); também registra o ID, para
            // que um Insert atrasado do mesmo ID seja descartado depois
            ChatEvent::Update(m) => {
                self.seen.insert(m.id.clone());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ChatMessageView, MessageType};
    use chrono::Utc;

    fn sample_message(room_id: &RoomId) -> ChatMessageView {
        ChatMessageView {
            id: MessageId::new_temp(),
            room_id: room_id.clone(),
            sender: None,
            content: "olá".into(),
            message_type: MessageType::Text,
            file_url: None,
            file_name: None,
            file_size: None,
            reply_to: None,
            is_edited: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_event_once() {
        let fanout = ChatFanout::new();
        let room_id = RoomId::new_temp();
        let mut rx = fanout.subscribe(&room_id);

        let event = ChatEvent::Insert(sample_message(&room_id));
        assert_eq!(fanout.publish(event.clone()), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
        // Nada além do único evento publicado
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let fanout = ChatFanout::new();
        let room_id = RoomId::new_temp();
        assert_eq!(fanout.publish(ChatEvent::Insert(sample_message(&room_id))), 0);
    }

    #[tokio::test]
    async fn events_do_not_cross_rooms() {
        let fanout = ChatFanout::new();
        let room_a = RoomId::new_temp();
        let room_b = RoomId::new_temp();
        let mut rx_b = fanout.subscribe(&room_b);

        fanout.publish(ChatEvent::Insert(sample_message(&room_a)));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropping_the_receiver_unsubscribes() {
        let fanout = ChatFanout::new();
        let room_id = RoomId::new_temp();
        let rx = fanout.subscribe(&room_id);
        assert_eq!(fanout.subscriber_count(&room_id), 1);

        drop(rx);
        // A publicação seguinte não entrega a ninguém e limpa o canal órfão
        assert_eq!(fanout.publish(ChatEvent::Insert(sample_message(&room_id))), 0);
        assert_eq!(fanout.subscriber_count(&room_id), 0);
    }

    #[test]
    fn delivery_log_drops_duplicate_inserts() {
        let room_id = RoomId::new_temp();
        let message = sample_message(&room_id);
        let mut log = DeliveryLog::new();

        assert!(log.should_deliver(&ChatEvent::Insert(message.clone())));
        assert!(!log.should_deliver(&ChatEvent::Insert(message)));
    }

    #[test]
    fn delivery_log_coalesces_update_before_insert() {
        let room_id = RoomId::new_temp();
        let message = sample_message(&room_id);
        let mut log = DeliveryLog::new();

        // Corrida desfavorável: o Update chega antes do Insert
        assert!(log.should_deliver(&ChatEvent::Update(message.clone())));
        assert!(!log.should_deliver(&ChatEvent::Insert(message)));
    }
}
