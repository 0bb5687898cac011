use std::collections::HashMap;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Role a session resolved at join time; cached for the room's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Driver,
    Rider,
}

/// Cheap handle to one live connection. Events go through the session's
/// bounded channel; the connection task serializes them onto the socket.
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    tx: mpsc::Sender<ServerEvent>,
}

impl SessionHandle {
    pub fn new(session_id: Uuid, user_id: Uuid, role: Role, tx: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            session_id,
            user_id,
            role,
            tx,
        }
    }

    /// Never blocks: a full channel means the peer is too slow and the
    /// event is dropped for that session only.
    pub fn send(&self, event: ServerEvent) {
        if self.tx.try_send(event).is_err() {
            warn!(session_id = %self.session_id, "dropping event for slow or closed session");
        }
    }
}

/// Room-per-trip publish/subscribe registry.
///
/// Membership mutation goes through the concurrent map; broadcasts copy
/// the member handles out first so no registry lock is held during fan-out.
pub struct RealtimeHub {
    rooms: DashMap<Uuid, HashMap<Uuid, SessionHandle>>,
    membership: DashMap<Uuid, Uuid>,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            membership: DashMap::new(),
        }
    }

    pub fn ensure_room(&self, trip_id: Uuid) {
        self.rooms.entry(trip_id).or_default();
    }

    /// Registers the session in the trip's room, leaving any prior room
    /// first; a session belongs to at most one room. The handle's role
    /// must already be resolved and authorized by the caller.
    pub fn join(&self, handle: SessionHandle, trip_id: Uuid) {
        let session_id = handle.session_id;
        if let Some(prev) = self.membership.insert(session_id, trip_id) {
            if prev != trip_id {
                self.remove_member(prev, session_id);
            }
        }
        self.rooms.entry(trip_id).or_default().insert(session_id, handle);
    }

    pub fn leave(&self, session_id: Uuid) {
        if let Some((_, trip_id)) = self.membership.remove(&session_id) {
            self.remove_member(trip_id, session_id);
        }
    }

    fn remove_member(&self, trip_id: Uuid, session_id: Uuid) {
        let emptied = match self.rooms.get_mut(&trip_id) {
            Some(mut room) => {
                room.remove(&session_id);
                room.is_empty()
            }
            None => false,
        };
        if emptied {
            self.rooms.remove_if(&trip_id, |_, members| members.is_empty());
        }
    }

    /// Evicts every member and deletes the room (trip completion).
    pub fn close_room(&self, trip_id: Uuid) {
        if let Some((_, room)) = self.rooms.remove(&trip_id) {
            for session_id in room.keys() {
                self.membership
                    .remove_if(session_id, |_, joined| *joined == trip_id);
            }
        }
    }

    pub fn room_of(&self, session_id: &Uuid) -> Option<Uuid> {
        self.membership.get(session_id).map(|entry| *entry)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn members(&self, trip_id: Uuid) -> Vec<SessionHandle> {
        self.rooms
            .get(&trip_id)
            .map(|room| room.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn broadcast(&self, trip_id: Uuid, event: &ServerEvent) -> usize {
        let handles = self.members(trip_id);
        for handle in &handles {
            handle.send(event.clone());
        }
        handles.len()
    }

    pub fn broadcast_to_role(&self, trip_id: Uuid, role: Role, event: &ServerEvent) -> usize {
        let handles: Vec<SessionHandle> = self
            .members(trip_id)
            .into_iter()
            .filter(|handle| handle.role == role)
            .collect();
        for handle in &handles {
            handle.send(event.clone());
        }
        handles.len()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::{RealtimeHub, Role, SessionHandle};
    use crate::models::trip::TripStatus;
    use crate::protocol::ServerEvent;

    fn handle(role: Role, buffer: usize) -> (SessionHandle, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        (
            SessionHandle::new(Uuid::new_v4(), Uuid::new_v4(), role, tx),
            rx,
        )
    }

    fn started(trip_id: Uuid) -> ServerEvent {
        ServerEvent::TripStarted {
            trip_id,
            status: TripStatus::Ongoing,
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_all_members() {
        let hub = RealtimeHub::new();
        let trip_id = Uuid::new_v4();
        let (driver, mut driver_rx) = handle(Role::Driver, 8);
        let (rider, mut rider_rx) = handle(Role::Rider, 8);

        hub.join(driver, trip_id);
        hub.join(rider, trip_id);

        assert_eq!(hub.broadcast(trip_id, &started(trip_id)), 2);
        assert!(driver_rx.try_recv().is_ok());
        assert!(rider_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn role_scoped_broadcast_skips_other_roles() {
        let hub = RealtimeHub::new();
        let trip_id = Uuid::new_v4();
        let (driver, mut driver_rx) = handle(Role::Driver, 8);
        let (rider, mut rider_rx) = handle(Role::Rider, 8);

        hub.join(driver, trip_id);
        hub.join(rider, trip_id);

        assert_eq!(hub.broadcast_to_role(trip_id, Role::Driver, &started(trip_id)), 1);
        assert!(driver_rx.try_recv().is_ok());
        assert!(rider_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn join_moves_session_between_rooms() {
        let hub = RealtimeHub::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let (rider, _rx) = handle(Role::Rider, 8);
        let session_id = rider.session_id;

        hub.join(rider.clone(), first);
        hub.join(rider, second);

        assert_eq!(hub.room_of(&session_id), Some(second));
        assert_eq!(hub.broadcast(first, &started(first)), 0);
        assert_eq!(hub.broadcast(second, &started(second)), 1);
    }

    #[tokio::test]
    async fn last_leave_drops_the_room() {
        let hub = RealtimeHub::new();
        let trip_id = Uuid::new_v4();
        let (rider, _rx) = handle(Role::Rider, 8);
        let session_id = rider.session_id;

        hub.join(rider, trip_id);
        assert_eq!(hub.room_count(), 1);
        hub.leave(session_id);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn close_room_evicts_members() {
        let hub = RealtimeHub::new();
        let trip_id = Uuid::new_v4();
        let (driver, _rx) = handle(Role::Driver, 8);
        let session_id = driver.session_id;

        hub.join(driver, trip_id);
        hub.close_room(trip_id);

        assert_eq!(hub.room_of(&session_id), None);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn slow_session_drops_events_without_blocking() {
        let hub = RealtimeHub::new();
        let trip_id = Uuid::new_v4();
        let (rider, mut rx) = handle(Role::Rider, 1);

        hub.join(rider, trip_id);
        hub.broadcast(trip_id, &started(trip_id));
        // channel full: the next broadcast must return, not block
        hub.broadcast(trip_id, &started(trip_id));

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
