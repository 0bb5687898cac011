//! Event envelopes for the realtime protocol. Both directions use a
//! `{"event": ..., "payload": ...}` shape; unknown event names fail to
//! decode at the boundary instead of reaching any handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hub::Role;
use crate::lifecycle::request::SelfAction;
use crate::models::live::PresenceStatus;
use crate::models::request::RideStatus;
use crate::models::trip::TripStatus;

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinTrip(JoinTripPayload),
    LocationUpdate(LocationUpdatePayload),
    RiderAction(RiderActionPayload),
    TripAction(TripActionPayload),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTripPayload {
    pub trip_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdatePayload {
    pub trip_id: Uuid,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed_kmph: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderActionPayload {
    pub trip_id: Uuid,
    pub request_id: Uuid,
    pub action: SelfAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripActionKind {
    Start,
    Complete,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripActionPayload {
    pub trip_id: Uuid,
    pub action: TripActionKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    JoinedTrip { trip_id: Uuid, role: Role },
    Error {
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    DriverLocationUpdated {
        trip_id: Uuid,
        lat: f64,
        lng: f64,
        heading: Option<f64>,
        speed_kmph: Option<f64>,
        updated_at: DateTime<Utc>,
        source_role: Role,
    },
    #[serde(rename_all = "camelCase")]
    RiderLocationUpdated {
        trip_id: Uuid,
        request_id: Uuid,
        rider_name: String,
        lat: f64,
        lng: f64,
        status: PresenceStatus,
        updated_at: DateTime<Utc>,
        source_role: Role,
    },
    #[serde(rename_all = "camelCase")]
    RiderActionValidation {
        trip_id: Uuid,
        request_id: Uuid,
        action: SelfAction,
        allowed: bool,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    TripActionValidation {
        trip_id: Uuid,
        action: TripActionKind,
        allowed: bool,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    TripStarted { trip_id: Uuid, status: TripStatus },
    #[serde(rename_all = "camelCase")]
    TripCompleted { trip_id: Uuid, status: TripStatus },
    #[serde(rename_all = "camelCase")]
    RiderOnboard {
        trip_id: Uuid,
        request_id: Uuid,
        status: RideStatus,
    },
    #[serde(rename_all = "camelCase")]
    RiderDroppedOff {
        trip_id: Uuid,
        request_id: Uuid,
        status: RideStatus,
    },
}

impl ServerEvent {
    /// Wire name of the event, also used as a metrics label.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::JoinedTrip { .. } => "joined_trip",
            ServerEvent::Error { .. } => "error",
            ServerEvent::DriverLocationUpdated { .. } => "driver_location_updated",
            ServerEvent::RiderLocationUpdated { .. } => "rider_location_updated",
            ServerEvent::RiderActionValidation { .. } => "rider_action_validation",
            ServerEvent::TripActionValidation { .. } => "trip_action_validation",
            ServerEvent::TripStarted { .. } => "trip_started",
            ServerEvent::TripCompleted { .. } => "trip_completed",
            ServerEvent::RiderOnboard { .. } => "rider_onboard",
            ServerEvent::RiderDroppedOff { .. } => "rider_dropped_off",
        }
    }
}
