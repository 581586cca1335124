use std::collections::HashMap;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::dto::events::RoomEvent;

/// Channel feeding one realtime connection.
pub type EventSender = mpsc::UnboundedSender<RoomEvent>;

/// Room-addressed publish side used by the lifecycle services.
pub trait Broadcaster: Send + Sync {
    /// Deliver `event` to every connection currently joined to `room_id`, except `origin`.
    ///
    /// Delivery is best-effort: disconnected recipients are skipped and nothing is reported
    /// back to the caller.
    fn publish(&self, room_id: Uuid, event: RoomEvent, origin: Option<Uuid>);
}

/// Room a connection is subscribed to, and the user who opened it.
#[derive(Debug, Clone, Copy)]
struct Subscription {
    room_id: Uuid,
    user_id: Uuid,
}

/// Room-keyed multicast of [`RoomEvent`]s over per-connection channels.
///
/// A connection sits in at most one room at a time; joining another room leaves the first.
#[derive(Default)]
pub struct RoomHub {
    rooms: DashMap<Uuid, HashMap<Uuid, EventSender>>,
    connections: DashMap<Uuid, Subscription>,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `connection_id`, opened by `user_id`, to `room_id`, leaving its previous
    /// room if any.
    pub fn join(&self, connection_id: Uuid, room_id: Uuid, user_id: Uuid, tx: EventSender) {
        self.leave(connection_id);
        self.rooms
            .entry(room_id)
            .or_default()
            .insert(connection_id, tx);
        self.connections
            .insert(connection_id, Subscription { room_id, user_id });
        info!(connection = %connection_id, room = %room_id, user = %user_id, "realtime connection joined room");
    }

    /// Drop the subscription of `connection_id`, returning the room it was in.
    pub fn leave(&self, connection_id: Uuid) -> Option<Uuid> {
        let (_, Subscription { room_id, .. }) = self.connections.remove(&connection_id)?;
        if let Some(mut members) = self.rooms.get_mut(&room_id) {
            members.remove(&connection_id);
        }
        self.rooms.remove_if(&room_id, |_, members| members.is_empty());
        debug!(connection = %connection_id, room = %room_id, "realtime connection left room");
        Some(room_id)
    }

    /// Room `connection_id` is currently joined to.
    pub fn room_of(&self, connection_id: Uuid) -> Option<Uuid> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.room_id)
    }

    /// Whether `connection_id` is a live subscription opened by `user_id`.
    pub fn is_owned_by(&self, connection_id: Uuid, user_id: Uuid) -> bool {
        self.connections
            .get(&connection_id)
            .is_some_and(|entry| entry.user_id == user_id)
    }

    /// Number of connections subscribed to any room.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Broadcaster for RoomHub {
    fn publish(&self, room_id: Uuid, event: RoomEvent, origin: Option<Uuid>) {
        // Senders are cloned out so no map guard is held while sending or pruning.
        let targets: Vec<(Uuid, EventSender)> = match self.rooms.get(&room_id) {
            Some(members) => members
                .iter()
                .filter(|(id, _)| Some(**id) != origin)
                .map(|(id, tx)| (*id, tx.clone()))
                .collect(),
            None => return,
        };

        let mut closed = Vec::new();
        for (connection_id, tx) in &targets {
            if tx.send(event.clone()).is_err() {
                closed.push(*connection_id);
            }
        }
        for connection_id in closed {
            debug!(connection = %connection_id, "pruning closed realtime connection");
            self.leave(connection_id);
        }

        debug!(
            room = %room_id,
            event = event.name(),
            recipients = targets.len(),
            "room event published"
        );
    }
}
