use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::trip::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    TripWaiting,
    TripActive,
    Online,
    Offline,
}

/// One row per ongoing trip; overwritten on every driver location update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveTripLocation {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub position: GeoPoint,
    pub heading: Option<f64>,
    pub speed_kmph: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

/// One row per actively tracked user; last writer wins, no history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveUserLocation {
    pub user_id: Uuid,
    pub position: GeoPoint,
    pub status: PresenceStatus,
    pub updated_at: DateTime<Utc>,
}
