//! Room-keyed routing table.
//!
//! All structural mutation flows through a single owner task consuming an
//! intake queue, so the client map and the room index always change together.
//! Reads that need no ordering (room sizes, health counts) take the read
//! lock over a short critical section.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use common::wire::WireMessage;
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique id of one socket connection.
pub type ClientId = Uuid;

/// Capacity of each client's outbound queue.
pub const OUTBOUND_QUEUE_SIZE: usize = 256;

/// What the hub keeps per registered client. The hub holds the only sender
/// for the outbound queue; dropping it is what closes the queue, so closure
/// happens at most once and only here.
struct RegisteredClient {
    username: String,
    room: String,
    outbound: mpsc::Sender<WireMessage>,
}

#[derive(Default)]
struct HubState {
    clients: HashMap<ClientId, RegisteredClient>,
    rooms: HashMap<String, HashSet<ClientId>>,
}

enum HubEvent {
    Register {
        id: ClientId,
        username: String,
        room: String,
        outbound: mpsc::Sender<WireMessage>,
    },
    Unregister(ClientId),
    SwitchRoom {
        id: ClientId,
        room: String,
    },
    Broadcast(WireMessage),
}

/// Cloneable handle to the hub. Operations enqueue events and return
/// immediately; the owner task applies them in intake order.
#[derive(Clone)]
pub struct Hub {
    events: mpsc::UnboundedSender<HubEvent>,
    state: Arc<RwLock<HubState>>,
}

impl Hub {
    /// Create the hub and spawn its owner task.
    pub fn spawn() -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        let state = Arc::new(RwLock::new(HubState::default()));
        tokio::spawn(run(state.clone(), rx));
        Self { events, state }
    }

    pub fn register(
        &self,
        id: ClientId,
        username: &str,
        room: &str,
        outbound: mpsc::Sender<WireMessage>,
    ) {
        let _ = self.events.send(HubEvent::Register {
            id,
            username: username.to_string(),
            room: room.to_string(),
            outbound,
        });
    }

    pub fn unregister(&self, id: ClientId) {
        let _ = self.events.send(HubEvent::Unregister(id));
    }

    /// Move a client to another room in one serialized step, leaving its
    /// outbound queue untouched.
    pub fn switch_room(&self, id: ClientId, room: &str) {
        let _ = self.events.send(HubEvent::SwitchRoom {
            id,
            room: room.to_string(),
        });
    }

    pub fn broadcast(&self, message: WireMessage) {
        let _ = self.events.send(HubEvent::Broadcast(message));
    }

    /// Number of clients currently joined to `room`.
    pub fn room_size(&self, room: &str) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.rooms.get(room).map(HashSet::len).unwrap_or(0)
    }

    pub fn client_count(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.clients.len()
    }

    pub fn room_count(&self) -> usize {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.rooms.len()
    }
}

async fn run(state: Arc<RwLock<HubState>>, mut events: mpsc::UnboundedReceiver<HubEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            HubEvent::Register {
                id,
                username,
                room,
                outbound,
            } => {
                {
                    let mut state = state.write().unwrap_or_else(PoisonError::into_inner);
                    state.clients.insert(
                        id,
                        RegisteredClient {
                            username: username.clone(),
                            room: room.clone(),
                            outbound,
                        },
                    );
                    state.rooms.entry(room.clone()).or_default().insert(id);
                    gauge!("gateway_active_clients").set(state.clients.len() as f64);
                }
                info!("User {} joined room {}", username, room);
                broadcast_to_room(
                    &state,
                    WireMessage::notice(&room, format!("{} joined the room", username)),
                );
            }
            HubEvent::Unregister(id) => {
                // Idempotent: a second unregister finds nothing to remove.
                if let Some((username, room)) = remove_client(&state, id) {
                    info!("User {} left room {}", username, room);
                    broadcast_to_room(
                        &state,
                        WireMessage::notice(&room, format!("{} left the room", username)),
                    );
                }
            }
            HubEvent::SwitchRoom { id, room } => {
                let moved = {
                    let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
                    let inner = &mut *guard;
                    match inner.clients.get_mut(&id) {
                        Some(client) if client.room != room => {
                            let old = std::mem::replace(&mut client.room, room.clone());
                            let username = client.username.clone();
                            if let Some(members) = inner.rooms.get_mut(&old) {
                                members.remove(&id);
                                if members.is_empty() {
                                    inner.rooms.remove(&old);
                                }
                            }
                            inner.rooms.entry(room.clone()).or_default().insert(id);
                            Some((username, old))
                        }
                        _ => None,
                    }
                };
                if let Some((username, old)) = moved {
                    info!("User {} moved from room {} to {}", username, old, room);
                    broadcast_to_room(
                        &state,
                        WireMessage::notice(&old, format!("{} left the room", username)),
                    );
                    broadcast_to_room(
                        &state,
                        WireMessage::notice(&room, format!("{} joined the room", username)),
                    );
                }
            }
            HubEvent::Broadcast(message) => broadcast_to_room(&state, message),
        }
    }
}

/// Remove a client from both maps, returning its identity when it was
/// present. Dropping the map entry drops the outbound sender, which closes
/// the client's queue.
fn remove_client(state: &Arc<RwLock<HubState>>, id: ClientId) -> Option<(String, String)> {
    let mut guard = state.write().unwrap_or_else(PoisonError::into_inner);
    let inner = &mut *guard;
    let client = inner.clients.remove(&id)?;
    if let Some(members) = inner.rooms.get_mut(&client.room) {
        members.remove(&id);
        if members.is_empty() {
            inner.rooms.remove(&client.room);
        }
    }
    gauge!("gateway_active_clients").set(inner.clients.len() as f64);
    Some((client.username, client.room))
}

/// Deliver a message to every member of its room. Delivery is a non-blocking
/// enqueue; a client whose queue cannot accept the message is evicted from
/// both maps, and observers in its room are told it left.
fn broadcast_to_room(state: &Arc<RwLock<HubState>>, message: WireMessage) {
    let mut pending = vec![message];
    while let Some(message) = pending.pop() {
        let targets: Vec<(ClientId, mpsc::Sender<WireMessage>)> = {
            let state = state.read().unwrap_or_else(PoisonError::into_inner);
            match state.rooms.get(&message.room) {
                Some(members) => members
                    .iter()
                    .filter_map(|id| {
                        state
                            .clients
                            .get(id)
                            .map(|client| (*id, client.outbound.clone()))
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        let mut evicted = Vec::new();
        for (id, outbound) in targets {
            match outbound.try_send(message.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Outbound queue full for client {}, evicting", id);
                    evicted.push(id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Outbound queue closed for client {}, evicting", id);
                    evicted.push(id);
                }
            }
        }
        counter!("gateway_broadcasts_total").increment(1);

        for id in evicted {
            counter!("gateway_evictions_total").increment(1);
            if let Some((username, room)) = remove_client(state, id) {
                info!("User {} evicted from room {}", username, room);
                pending.push(WireMessage::notice(
                    &room,
                    format!("{} left the room", username),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::wire::SYSTEM_AUTHOR;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    async fn wait_until(mut check: impl FnMut() -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while !check() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not reached in time"
            );
            sleep(Duration::from_millis(10)).await;
        }
    }

    async fn recv(rx: &mut mpsc::Receiver<WireMessage>) -> WireMessage {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("queue closed unexpectedly")
    }

    fn outbound() -> (mpsc::Sender<WireMessage>, mpsc::Receiver<WireMessage>) {
        mpsc::channel(OUTBOUND_QUEUE_SIZE)
    }

    #[tokio::test]
    async fn register_indexes_client_and_notifies_the_room() {
        let hub = Hub::spawn();
        let alice = Uuid::new_v4();
        let (tx, mut rx) = outbound();

        hub.register(alice, "alice", "general", tx);
        wait_until(|| hub.room_size("general") == 1).await;
        assert_eq!(hub.client_count(), 1);

        let notice = recv(&mut rx).await;
        assert_eq!(notice.author, SYSTEM_AUTHOR);
        assert_eq!(notice.room, "general");
        assert_eq!(notice.body, "alice joined the room");
    }

    #[tokio::test]
    async fn join_notice_reaches_existing_members() {
        let hub = Hub::spawn();
        let (bob_tx, mut bob_rx) = outbound();
        hub.register(Uuid::new_v4(), "bob", "general", bob_tx);
        recv(&mut bob_rx).await; // bob's own join notice

        let (alice_tx, _alice_rx) = outbound();
        hub.register(Uuid::new_v4(), "alice", "general", alice_tx);

        let notice = recv(&mut bob_rx).await;
        assert_eq!(notice.author, SYSTEM_AUTHOR);
        assert_eq!(notice.body, "alice joined the room");
    }

    #[tokio::test]
    async fn unregister_removes_the_client_and_closes_its_queue() {
        let hub = Hub::spawn();
        let alice = Uuid::new_v4();
        let (tx, mut rx) = outbound();

        hub.register(alice, "alice", "general", tx);
        recv(&mut rx).await;

        hub.unregister(alice);
        wait_until(|| hub.client_count() == 0).await;
        // Empty room is gone, not left behind with zero members.
        assert_eq!(hub.room_count(), 0);

        // The hub held the only sender; removal closes the queue.
        let closed = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(closed.is_none());

        // A second unregister is a no-op.
        hub.unregister(alice);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(hub.client_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_only_the_target_room() {
        let hub = Hub::spawn();
        let (alice_tx, mut alice_rx) = outbound();
        let (bob_tx, mut bob_rx) = outbound();
        hub.register(Uuid::new_v4(), "alice", "general", alice_tx);
        hub.register(Uuid::new_v4(), "bob", "random", bob_tx);
        recv(&mut alice_rx).await;
        recv(&mut bob_rx).await;

        hub.broadcast(WireMessage::new("general", "alice", "hi"));

        let msg = recv(&mut alice_rx).await;
        assert_eq!(msg.body, "hi");
        assert_eq!(msg.author, "alice");

        sleep(Duration::from_millis(50)).await;
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_outbound_queue_evicts_the_client() {
        let hub = Hub::spawn();
        // The observer gets extra capacity so only the stuck client overflows.
        let (alice_tx, mut alice_rx) = mpsc::channel(OUTBOUND_QUEUE_SIZE * 2);
        let (stuck_tx, _stuck_rx) = outbound();
        hub.register(Uuid::new_v4(), "alice", "general", alice_tx);
        let stuck = Uuid::new_v4();
        hub.register(stuck, "bob", "general", stuck_tx);
        recv(&mut alice_rx).await;
        recv(&mut alice_rx).await; // bob's join notice

        // bob never drains: his queue already holds his own join notice, so
        // one more broadcast than it has free slots overflows it.
        for i in 0..OUTBOUND_QUEUE_SIZE {
            hub.broadcast(WireMessage::new("general", "alice", format!("m{}", i)));
        }

        wait_until(|| hub.room_size("general") == 1).await;
        assert_eq!(hub.client_count(), 1);

        // Observers see the eviction as a leave.
        let mut saw_leave = false;
        while let Ok(Some(msg)) = timeout(Duration::from_secs(1), alice_rx.recv()).await {
            if msg.author == SYSTEM_AUTHOR && msg.body == "bob left the room" {
                saw_leave = true;
                break;
            }
        }
        assert!(saw_leave);
    }

    #[tokio::test]
    async fn switch_room_moves_membership_and_keeps_the_queue_open() {
        let hub = Hub::spawn();
        let alice = Uuid::new_v4();
        let (alice_tx, mut alice_rx) = outbound();
        let (bob_tx, mut bob_rx) = outbound();
        hub.register(alice, "alice", "general", alice_tx);
        hub.register(Uuid::new_v4(), "bob", "random", bob_tx);
        recv(&mut alice_rx).await;
        recv(&mut bob_rx).await;

        hub.switch_room(alice, "random");
        wait_until(|| hub.room_size("random") == 2).await;
        assert_eq!(hub.room_size("general"), 0);

        let notice = recv(&mut bob_rx).await;
        assert_eq!(notice.body, "alice joined the room");
        let notice = recv(&mut alice_rx).await;
        assert_eq!(notice.body, "alice joined the room");

        // The queue survived the move: alice still receives broadcasts.
        hub.broadcast(WireMessage::new("random", "bob", "hello"));
        let msg = recv(&mut alice_rx).await;
        assert_eq!(msg.body, "hello");
    }

    #[tokio::test]
    async fn switch_to_the_same_room_is_a_no_op() {
        let hub = Hub::spawn();
        let alice = Uuid::new_v4();
        let (tx, mut rx) = outbound();
        hub.register(alice, "alice", "general", tx);
        recv(&mut rx).await;

        hub.switch_room(alice, "general");
        sleep(Duration::from_millis(50)).await;
        assert_eq!(hub.room_size("general"), 1);
        assert!(rx.try_recv().is_err());
    }
}
