use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::auth::AuthedUser;
use crate::hub::{Role, SessionHandle};
use crate::lifecycle::publish;
use crate::models::live::PresenceStatus;
use crate::models::trip::GeoPoint;
use crate::protocol::{
    ClientEvent, JoinTripPayload, LocationUpdatePayload, RiderActionPayload, ServerEvent,
    TripActionPayload,
};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    AuthedUser(user_id): AuthedUser,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

/// One live connection. Outbound events funnel through the session's
/// bounded channel; the writer task below is the only place that touches
/// the socket sink, so concurrent broadcasts cannot interleave frames.
struct Session {
    session_id: Uuid,
    user_id: Uuid,
    tx: mpsc::Sender<ServerEvent>,
}

impl Session {
    fn send(&self, event: ServerEvent) {
        if self.tx.try_send(event).is_err() {
            warn!(session_id = %self.session_id, "dropping reply for slow or closed session");
        }
    }

    fn send_error(&self, message: &str) {
        self.send(ServerEvent::Error {
            message: message.to_string(),
        });
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let session_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<ServerEvent>(state.session_buffer_size);

    state.metrics.connected_sessions.inc();
    state.store.set_presence(user_id, PresenceStatus::Online);
    info!(user_id = %user_id, session_id = %session_id, "session connected");

    let send_task = tokio::spawn(async move {
        let mut events = ReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize server event");
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let session = Session {
        session_id,
        user_id,
        tx,
    };

    while let Some(Ok(message)) = receiver.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        match serde_json::from_str::<ClientEvent>(&text) {
            Ok(event) => dispatch(&state, &session, event).await,
            Err(_) => session.send_error("invalid message"),
        }
    }

    // disconnect cleanup is best-effort and must not affect other sessions
    state.store.set_presence(user_id, PresenceStatus::Offline);
    state.hub.leave(session_id);
    state.metrics.connected_sessions.dec();
    send_task.abort();
    info!(user_id = %user_id, session_id = %session_id, "session disconnected");
}

async fn dispatch(state: &AppState, session: &Session, event: ClientEvent) {
    match event {
        ClientEvent::JoinTrip(payload) => handle_join_trip(state, session, payload).await,
        ClientEvent::LocationUpdate(payload) => {
            handle_location_update(state, session, payload).await
        }
        ClientEvent::RiderAction(payload) => handle_rider_action(state, session, payload).await,
        ClientEvent::TripAction(payload) => handle_trip_action(state, session, payload).await,
    }
}

async fn handle_join_trip(state: &AppState, session: &Session, payload: JoinTripPayload) {
    let deadline = state.deadline();

    let role = if state
        .store
        .is_driver_for_trip(payload.trip_id, session.user_id, &deadline)
        .await
    {
        Some(Role::Driver)
    } else if state
        .store
        .is_rider_for_trip(payload.trip_id, session.user_id, &deadline)
        .await
    {
        Some(Role::Rider)
    } else {
        None
    };

    let Some(role) = role else {
        session.send_error("forbidden trip join");
        return;
    };

    let handle = SessionHandle::new(session.session_id, session.user_id, role, session.tx.clone());
    state.hub.join(handle, payload.trip_id);
    info!(trip_id = %payload.trip_id, user_id = %session.user_id, role = ?role, "joined trip room");

    session.send(ServerEvent::JoinedTrip {
        trip_id: payload.trip_id,
        role,
    });
}

async fn handle_location_update(
    state: &AppState,
    session: &Session,
    payload: LocationUpdatePayload,
) {
    if state.hub.room_of(&session.session_id) != Some(payload.trip_id) {
        session.send_error("join trip first");
        return;
    }

    let deadline = state.deadline();
    let position = GeoPoint {
        lat: payload.lat,
        lng: payload.lng,
    };

    if state
        .store
        .is_driver_for_trip(payload.trip_id, session.user_id, &deadline)
        .await
    {
        let updated_at = match state
            .store
            .upsert_driver_location(
                payload.trip_id,
                session.user_id,
                position,
                payload.heading,
                payload.speed_kmph,
                &deadline,
            )
            .await
        {
            Ok(updated_at) => updated_at,
            Err(_) => {
                session.send_error("driver location update failed");
                return;
            }
        };

        state
            .metrics
            .location_updates_total
            .with_label_values(&["driver"])
            .inc();
        publish(
            &state.hub,
            &state.metrics,
            payload.trip_id,
            ServerEvent::DriverLocationUpdated {
                trip_id: payload.trip_id,
                lat: payload.lat,
                lng: payload.lng,
                heading: payload.heading,
                speed_kmph: payload.speed_kmph,
                updated_at,
                source_role: Role::Driver,
            },
        );
        return;
    }

    if state
        .store
        .is_rider_for_trip(payload.trip_id, session.user_id, &deadline)
        .await
    {
        let updated_at = state
            .store
            .upsert_rider_location(session.user_id, position);

        let Some(request_id) = state
            .store
            .active_request_for_rider(payload.trip_id, session.user_id, &deadline)
            .await
        else {
            session.send_error("active ride request not found");
            return;
        };

        state
            .metrics
            .location_updates_total
            .with_label_values(&["rider"])
            .inc();
        let event = ServerEvent::RiderLocationUpdated {
            trip_id: payload.trip_id,
            request_id,
            rider_name: state.store.user_name(&session.user_id),
            lat: payload.lat,
            lng: payload.lng,
            status: PresenceStatus::TripActive,
            updated_at,
            source_role: Role::Rider,
        };
        state
            .metrics
            .broadcasts_total
            .with_label_values(&[event.name()])
            .inc();
        state
            .hub
            .broadcast_to_role(payload.trip_id, Role::Driver, &event);
        return;
    }

    session.send_error("forbidden location update");
}

async fn handle_rider_action(state: &AppState, session: &Session, payload: RiderActionPayload) {
    let deadline = state.deadline();

    if !state
        .store
        .is_rider_for_trip(payload.trip_id, session.user_id, &deadline)
        .await
    {
        session.send(ServerEvent::RiderActionValidation {
            trip_id: payload.trip_id,
            request_id: payload.request_id,
            action: payload.action,
            allowed: false,
            reason: "rider only".to_string(),
        });
        return;
    }

    let (allowed, reason) = state
        .requests
        .check_self_action(
            payload.trip_id,
            payload.request_id,
            session.user_id,
            payload.action,
            deadline,
        )
        .await;

    session.send(ServerEvent::RiderActionValidation {
        trip_id: payload.trip_id,
        request_id: payload.request_id,
        action: payload.action,
        allowed,
        reason,
    });
}

async fn handle_trip_action(state: &AppState, session: &Session, payload: TripActionPayload) {
    let (allowed, reason) = state
        .trips
        .check_trip_action(payload.trip_id, session.user_id, state.deadline())
        .await;

    session.send(ServerEvent::TripActionValidation {
        trip_id: payload.trip_id,
        action: payload.action,
        allowed,
        reason,
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::{handle_location_update, Session};
    use crate::config::Config;
    use crate::models::trip::{GeoPoint, Route, Trip, TripStatus};
    use crate::models::user::User;
    use crate::protocol::{LocationUpdatePayload, ServerEvent};
    use crate::state::AppState;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState::new(&Config {
            http_port: 0,
            log_level: "info".to_string(),
            store_deadline_ms: 2_000,
            session_buffer_size: 16,
        }))
    }

    fn ongoing_trip(driver_id: Uuid) -> Trip {
        let now = Utc::now();
        Trip {
            id: Uuid::new_v4(),
            driver_id,
            route: Some(Route {
                id: Uuid::new_v4(),
                geometry: vec![GeoPoint { lat: 27.7, lng: 85.3 }],
            }),
            status: TripStatus::Ongoing,
            total_seats: 4,
            available_seats: 4,
            origin: GeoPoint { lat: 27.7, lng: 85.3 },
            destination: GeoPoint { lat: 27.8, lng: 85.4 },
            from_address: "origin".to_string(),
            to_address: "destination".to_string(),
            stops: Vec::new(),
            travel_date: now,
            fare_per_seat: 100.0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn location_update_without_join_is_rejected() {
        let state = test_state();
        let driver_id = Uuid::new_v4();
        state.store.insert_user(User {
            id: driver_id,
            name: "Asha".to_string(),
        });
        let trip = ongoing_trip(driver_id);
        let trip_id = trip.id;
        state.store.insert_trip(trip);

        let (tx, mut rx) = mpsc::channel(16);
        let session = Session {
            session_id: Uuid::new_v4(),
            user_id: driver_id,
            tx,
        };

        handle_location_update(
            &state,
            &session,
            LocationUpdatePayload {
                trip_id,
                lat: 27.7,
                lng: 85.3,
                heading: None,
                speed_kmph: None,
            },
        )
        .await;

        match rx.try_recv().unwrap() {
            ServerEvent::Error { message } => assert_eq!(message, "join trip first"),
            other => panic!("expected error event, got {other:?}"),
        }
        assert!(state.store.live_trip(&trip_id).is_none());
    }
}
