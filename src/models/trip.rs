use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Scheduled,
    Ongoing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub geometry: Vec<GeoPoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStop {
    pub id: Uuid,
    pub address: String,
    pub stop_order: u32,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub route: Option<Route>,
    pub status: TripStatus,
    pub total_seats: u32,
    pub available_seats: u32,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    pub from_address: String,
    pub to_address: String,
    pub stops: Vec<TripStop>,
    pub travel_date: DateTime<Utc>,
    pub fare_per_seat: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
