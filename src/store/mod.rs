pub mod views;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::{timeout, Instant};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::live::{LiveTripLocation, LiveUserLocation, PresenceStatus};
use crate::models::request::{RideRequest, RideStatus};
use crate::models::trip::{GeoPoint, Trip, TripStatus};
use crate::models::user::User;

/// Absolute budget for one store-bound operation. Lock waits and the
/// operation itself must fit inside it; expiry fails the whole operation
/// with `Timeout` and no partial state.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now() + budget,
        }
    }

    pub fn remaining(&self) -> Result<Duration, AppError> {
        let now = Instant::now();
        if now >= self.expires_at {
            return Err(AppError::Timeout);
        }
        Ok(self.expires_at - now)
    }
}

type Row<T> = Arc<Mutex<T>>;

async fn lock_row<T>(row: &Row<T>, deadline: &Deadline) -> Result<OwnedMutexGuard<T>, AppError> {
    let budget = deadline.remaining()?;
    timeout(budget, Arc::clone(row).lock_owned())
        .await
        .map_err(|_| AppError::Timeout)
}

struct TripRow {
    driver_id: Uuid,
    row: Row<Trip>,
}

struct RequestRow {
    trip_id: Uuid,
    rider_id: Uuid,
    row: Row<RideRequest>,
}

/// In-process transactional record store.
///
/// Trip and ride-request rows carry per-row async locks; lifecycle
/// transitions hold them for the whole multi-row mutation, always
/// acquiring the trip row before any of its request rows. Live-location
/// tables are plain last-writer-wins maps.
pub struct Store {
    users: DashMap<Uuid, User>,
    trips: DashMap<Uuid, TripRow>,
    requests: DashMap<Uuid, RequestRow>,
    // partial unique index: at most one ongoing trip per driver
    ongoing_by_driver: DashMap<Uuid, Uuid>,
    live_trips: DashMap<Uuid, LiveTripLocation>,
    live_users: DashMap<Uuid, LiveUserLocation>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            trips: DashMap::new(),
            requests: DashMap::new(),
            ongoing_by_driver: DashMap::new(),
            live_trips: DashMap::new(),
            live_users: DashMap::new(),
        }
    }

    // --- seeding (trip creation itself happens upstream of this service) ---

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn insert_trip(&self, trip: Trip) {
        if trip.status == TripStatus::Ongoing {
            self.ongoing_by_driver.insert(trip.driver_id, trip.id);
        }
        self.trips.insert(
            trip.id,
            TripRow {
                driver_id: trip.driver_id,
                row: Arc::new(Mutex::new(trip)),
            },
        );
    }

    pub fn insert_request(&self, request: RideRequest) {
        self.requests.insert(
            request.id,
            RequestRow {
                trip_id: request.trip_id,
                rider_id: request.rider_id,
                row: Arc::new(Mutex::new(request)),
            },
        );
    }

    pub fn user_name(&self, user_id: &Uuid) -> String {
        self.users
            .get(user_id)
            .map(|user| user.name.clone())
            .unwrap_or_else(|| "Rider".to_string())
    }

    // --- row access ---

    fn trip_row(&self, trip_id: &Uuid) -> Option<(Uuid, Row<Trip>)> {
        self.trips
            .get(trip_id)
            .map(|entry| (entry.driver_id, Arc::clone(&entry.row)))
    }

    fn request_row(&self, request_id: &Uuid) -> Option<Row<RideRequest>> {
        self.requests
            .get(request_id)
            .map(|entry| Arc::clone(&entry.row))
    }

    /// Immutable header of a request (trip and rider never change after creation).
    pub(crate) fn request_header(&self, request_id: &Uuid) -> Option<(Uuid, Uuid)> {
        self.requests
            .get(request_id)
            .map(|entry| (entry.trip_id, entry.rider_id))
    }

    pub(crate) fn request_ids_for_trip(&self, trip_id: Uuid) -> Vec<Uuid> {
        self.requests
            .iter()
            .filter(|entry| entry.trip_id == trip_id)
            .map(|entry| *entry.key())
            .collect()
    }

    pub(crate) async fn lock_trip(
        &self,
        trip_id: Uuid,
        deadline: &Deadline,
    ) -> Result<OwnedMutexGuard<Trip>, AppError> {
        let (_, row) = self.trip_row(&trip_id).ok_or(AppError::NotFound)?;
        lock_row(&row, deadline).await
    }

    pub(crate) async fn lock_request(
        &self,
        request_id: Uuid,
        deadline: &Deadline,
    ) -> Result<OwnedMutexGuard<RideRequest>, AppError> {
        let row = self.request_row(&request_id).ok_or(AppError::NotFound)?;
        lock_row(&row, deadline).await
    }

    pub async fn trip_snapshot(&self, trip_id: Uuid, deadline: &Deadline) -> Result<Trip, AppError> {
        Ok(self.lock_trip(trip_id, deadline).await?.clone())
    }

    pub async fn request_snapshot(
        &self,
        request_id: Uuid,
        deadline: &Deadline,
    ) -> Result<RideRequest, AppError> {
        Ok(self.lock_request(request_id, deadline).await?.clone())
    }

    // --- ongoing-trip index ---

    pub(crate) fn claim_ongoing(&self, driver_id: Uuid, trip_id: Uuid) -> Result<(), AppError> {
        match self.ongoing_by_driver.entry(driver_id) {
            Entry::Occupied(existing) if *existing.get() != trip_id => Err(AppError::DriverBusy),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(trip_id);
                Ok(())
            }
        }
    }

    pub(crate) fn release_ongoing(&self, driver_id: Uuid) {
        self.ongoing_by_driver.remove(&driver_id);
    }

    pub fn ongoing_trip_for_driver(&self, driver_id: &Uuid) -> Option<Uuid> {
        self.ongoing_by_driver.get(driver_id).map(|entry| *entry)
    }

    // --- authorization / read helpers ---

    pub async fn is_driver_for_trip(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        deadline: &Deadline,
    ) -> bool {
        let Some((driver_id, row)) = self.trip_row(&trip_id) else {
            return false;
        };
        if driver_id != user_id {
            return false;
        }
        match lock_row(&row, deadline).await {
            Ok(trip) => trip.status == TripStatus::Ongoing,
            Err(_) => false,
        }
    }

    pub async fn is_rider_for_trip(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        deadline: &Deadline,
    ) -> bool {
        if !self.trip_is_ongoing(trip_id, deadline).await {
            return false;
        }
        self.active_request_for_rider(trip_id, user_id, deadline)
            .await
            .is_some()
    }

    async fn trip_is_ongoing(&self, trip_id: Uuid, deadline: &Deadline) -> bool {
        let Some((_, row)) = self.trip_row(&trip_id) else {
            return false;
        };
        match lock_row(&row, deadline).await {
            Ok(trip) => trip.status == TripStatus::Ongoing,
            Err(_) => false,
        }
    }

    /// The rider's request on this trip that is not cancelled, if any.
    pub async fn active_request_for_rider(
        &self,
        trip_id: Uuid,
        rider_id: Uuid,
        deadline: &Deadline,
    ) -> Option<Uuid> {
        let candidates: Vec<(Uuid, Row<RideRequest>)> = self
            .requests
            .iter()
            .filter(|entry| entry.trip_id == trip_id && entry.rider_id == rider_id)
            .map(|entry| (*entry.key(), Arc::clone(&entry.row)))
            .collect();

        for (request_id, row) in candidates {
            let Ok(request) = lock_row(&row, deadline).await else {
                return None;
            };
            if matches!(
                request.status,
                RideStatus::Waiting | RideStatus::Onboard | RideStatus::DroppedOff
            ) {
                return Some(request_id);
            }
        }
        None
    }

    // --- live locations ---

    /// Replaces the single live row of an ongoing trip owned by the caller.
    pub async fn upsert_driver_location(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        position: GeoPoint,
        heading: Option<f64>,
        speed_kmph: Option<f64>,
        deadline: &Deadline,
    ) -> Result<DateTime<Utc>, AppError> {
        let (driver_id, row) = self.trip_row(&trip_id).ok_or(AppError::NotFound)?;
        if driver_id != user_id {
            return Err(AppError::NotOwner);
        }
        let trip = lock_row(&row, deadline).await?;
        if trip.status != TripStatus::Ongoing {
            return Err(AppError::NotFound);
        }
        let updated_at = Utc::now();
        self.live_trips.insert(
            trip_id,
            LiveTripLocation {
                trip_id,
                driver_id,
                position,
                heading,
                speed_kmph,
                updated_at,
            },
        );
        Ok(updated_at)
    }

    pub fn upsert_rider_location(&self, user_id: Uuid, position: GeoPoint) -> DateTime<Utc> {
        let updated_at = Utc::now();
        self.live_users.insert(
            user_id,
            LiveUserLocation {
                user_id,
                position,
                status: PresenceStatus::TripActive,
                updated_at,
            },
        );
        updated_at
    }

    /// Presence touch: updates only an existing row, no-op otherwise.
    pub fn set_presence(&self, user_id: Uuid, status: PresenceStatus) {
        if let Some(mut row) = self.live_users.get_mut(&user_id) {
            row.status = status;
            row.updated_at = Utc::now();
        }
    }

    pub fn live_trip(&self, trip_id: &Uuid) -> Option<LiveTripLocation> {
        self.live_trips.get(trip_id).map(|row| row.clone())
    }

    pub fn live_user(&self, user_id: &Uuid) -> Option<LiveUserLocation> {
        self.live_users.get(user_id).map(|row| row.clone())
    }

    /// Clears any stale live row for the driver and seeds a fresh one at
    /// the trip origin.
    pub(crate) fn reset_live_trip(&self, trip_id: Uuid, driver_id: Uuid, origin: GeoPoint) {
        self.live_trips.retain(|_, row| row.driver_id != driver_id);
        self.live_trips.insert(
            trip_id,
            LiveTripLocation {
                trip_id,
                driver_id,
                position: origin,
                heading: None,
                speed_kmph: None,
                updated_at: Utc::now(),
            },
        );
    }

    pub(crate) fn seed_live_user(&self, user_id: Uuid, position: GeoPoint, status: PresenceStatus) {
        self.live_users.insert(
            user_id,
            LiveUserLocation {
                user_id,
                position,
                status,
                updated_at: Utc::now(),
            },
        );
    }

    pub(crate) fn delete_live_trip(&self, trip_id: Uuid) {
        self.live_trips.remove(&trip_id);
    }

    pub(crate) fn delete_live_user(&self, user_id: Uuid) {
        self.live_users.remove(&user_id);
    }
}
