use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::live::PresenceStatus;
use crate::models::request::RideStatus;
use crate::models::trip::{GeoPoint, TripStatus, TripStop};

/// Composed read model for one live trip, shaped for the client.
///
/// `riders` is populated only when the viewer is the trip's driver;
/// other viewers get their own request summary in `my_request`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveTripView {
    pub trip_id: Uuid,
    pub trip_status: TripStatus,
    pub from_address: String,
    pub to_address: String,
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub travel_date: DateTime<Utc>,
    pub fare_per_seat: f64,
    pub total_seats: u32,
    pub available_seats: u32,
    pub driver_name: String,
    pub is_driver_viewer: bool,
    pub driver_position: Option<GeoPoint>,
    pub driver_heading: Option<f64>,
    pub driver_speed_kmph: Option<f64>,
    pub driver_last_updated: Option<DateTime<Utc>>,
    pub route_geometry: Option<Vec<GeoPoint>>,
    pub stops: Vec<TripStop>,
    pub riders: Vec<RiderView>,
    pub my_request: Option<RequestSummary>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiderView {
    pub request_id: Uuid,
    pub rider_name: String,
    pub status: RideStatus,
    pub seats: u32,
    pub total_fare: f64,
    pub pickup_address: String,
    pub drop_address: String,
    pub pickup: GeoPoint,
    pub drop: GeoPoint,
    /// Last reported position, falling back to the pickup point.
    pub position: GeoPoint,
    pub live_status: Option<PresenceStatus>,
    pub live_last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub id: Uuid,
    pub status: RideStatus,
    pub seats: u32,
    pub total_fare: f64,
    pub pickup_address: String,
    pub drop_address: String,
}
