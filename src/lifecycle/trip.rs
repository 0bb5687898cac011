use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::hub::RealtimeHub;
use crate::lifecycle::publish;
use crate::models::live::PresenceStatus;
use crate::models::request::RideStatus;
use crate::models::trip::{GeoPoint, TripStatus};
use crate::observability::metrics::Metrics;
use crate::protocol::ServerEvent;
use crate::geo::{self, GEOFENCE_RADIUS_M};
use crate::store::{Deadline, Store};

/// Owns the `scheduled -> ongoing -> completed` state machine.
///
/// Transitions run under the trip row lock; every request row they touch
/// is locked before the first mutation so a deadline expiry can never
/// leave a half-applied transition. Broadcasts go out only after the
/// mutation has fully committed.
pub struct TripLifecycle {
    store: Arc<Store>,
    hub: Arc<RealtimeHub>,
    metrics: Metrics,
}

impl TripLifecycle {
    pub fn new(store: Arc<Store>, hub: Arc<RealtimeHub>, metrics: Metrics) -> Self {
        Self {
            store,
            hub,
            metrics,
        }
    }

    pub async fn start(
        &self,
        trip_id: Uuid,
        driver_user_id: Uuid,
        deadline: Deadline,
    ) -> Result<(), AppError> {
        let result = self.start_tx(trip_id, driver_user_id, &deadline).await;
        self.metrics.observe_transition("trip_start", result.is_ok());

        let riders = result?;
        info!(trip_id = %trip_id, riders, "trip started");

        self.hub.ensure_room(trip_id);
        publish(
            &self.hub,
            &self.metrics,
            trip_id,
            ServerEvent::TripStarted {
                trip_id,
                status: TripStatus::Ongoing,
            },
        );
        Ok(())
    }

    async fn start_tx(
        &self,
        trip_id: Uuid,
        driver_user_id: Uuid,
        deadline: &Deadline,
    ) -> Result<usize, AppError> {
        let mut trip = self.store.lock_trip(trip_id, deadline).await?;
        if trip.driver_id != driver_user_id {
            return Err(AppError::NotOwner);
        }
        if trip.status != TripStatus::Scheduled {
            return Err(AppError::InvalidState(
                "Only scheduled trips can be started.".to_string(),
            ));
        }
        match &trip.route {
            Some(route) if !route.geometry.is_empty() => {}
            _ => return Err(AppError::MissingRoute),
        }

        // snapshot every rider to seed before the first mutation
        let mut seeds: Vec<(Uuid, GeoPoint)> = Vec::new();
        for request_id in self.store.request_ids_for_trip(trip_id) {
            let request = self.store.lock_request(request_id, deadline).await?;
            if matches!(request.status, RideStatus::Waiting | RideStatus::Onboard) {
                seeds.push((request.rider_id, request.pickup));
            }
        }

        self.store.claim_ongoing(driver_user_id, trip_id)?;

        trip.status = TripStatus::Ongoing;
        trip.updated_at = Utc::now();
        self.store
            .reset_live_trip(trip_id, driver_user_id, trip.origin);
        let riders = seeds.len();
        for (rider_id, pickup) in seeds {
            self.store
                .seed_live_user(rider_id, pickup, PresenceStatus::TripWaiting);
        }
        Ok(riders)
    }

    pub async fn complete(
        &self,
        trip_id: Uuid,
        driver_user_id: Uuid,
        deadline: Deadline,
    ) -> Result<(), AppError> {
        let result = self.complete_tx(trip_id, driver_user_id, &deadline).await;
        self.metrics
            .observe_transition("trip_complete", result.is_ok());
        result?;

        info!(trip_id = %trip_id, "trip completed");
        publish(
            &self.hub,
            &self.metrics,
            trip_id,
            ServerEvent::TripCompleted {
                trip_id,
                status: TripStatus::Completed,
            },
        );
        self.hub.close_room(trip_id);
        Ok(())
    }

    async fn complete_tx(
        &self,
        trip_id: Uuid,
        driver_user_id: Uuid,
        deadline: &Deadline,
    ) -> Result<(), AppError> {
        let mut trip = self.store.lock_trip(trip_id, deadline).await?;
        if trip.driver_id != driver_user_id {
            return Err(AppError::NotOwner);
        }
        if trip.status != TripStatus::Ongoing {
            return Err(AppError::InvalidState(
                "Trip is not ongoing or not owned by driver.".to_string(),
            ));
        }
        let live = self
            .store
            .live_trip(&trip_id)
            .ok_or(AppError::TooFarFromDestination)?;
        if !geo::within(&live.position, &trip.destination, GEOFENCE_RADIUS_M) {
            return Err(AppError::TooFarFromDestination);
        }

        // lock the full request set up front; the mutation below is all-or-nothing
        let mut requests = Vec::new();
        for request_id in self.store.request_ids_for_trip(trip_id) {
            requests.push(self.store.lock_request(request_id, deadline).await?);
        }

        let now = Utc::now();
        trip.status = TripStatus::Completed;
        trip.available_seats = trip.total_seats;
        trip.updated_at = now;

        for request in &mut requests {
            match request.status {
                RideStatus::Onboard => {
                    request.status = RideStatus::DroppedOff;
                    request.updated_at = now;
                }
                RideStatus::Waiting => {
                    request.status = RideStatus::Cancelled;
                    request.cancelled_reason = Some("Trip completed".to_string());
                    request.cancelled_at = Some(now);
                    request.updated_at = now;
                }
                _ => {}
            }
            self.store.delete_live_user(request.rider_id);
        }

        self.store.delete_live_user(driver_user_id);
        self.store.delete_live_trip(trip_id);
        self.store.release_ongoing(driver_user_id);
        Ok(())
    }

    /// Preview for the driver-side action gate; does not mutate state.
    pub async fn check_trip_action(
        &self,
        trip_id: Uuid,
        user_id: Uuid,
        deadline: Deadline,
    ) -> (bool, String) {
        if self
            .store
            .is_driver_for_trip(trip_id, user_id, &deadline)
            .await
        {
            (true, String::new())
        } else {
            (false, "driver only".to_string())
        }
    }
}
