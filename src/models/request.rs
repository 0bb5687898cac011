use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::trip::GeoPoint;

/// `dropedoff` keeps the spelling used on the wire and in the durable rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Waiting,
    Onboard,
    #[serde(rename = "dropedoff")]
    DroppedOff,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub rider_id: Uuid,
    pub status: RideStatus,
    pub seats: u32,
    pub pickup: GeoPoint,
    pub drop: GeoPoint,
    pub pickup_address: String,
    pub drop_address: String,
    pub total_fare: f64,
    pub cancelled_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
