use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{self, GEOFENCE_RADIUS_M};
use crate::hub::RealtimeHub;
use crate::lifecycle::publish;
use crate::models::live::LiveUserLocation;
use crate::models::request::{RideRequest, RideStatus};
use crate::models::trip::TripStatus;
use crate::observability::metrics::Metrics;
use crate::protocol::ServerEvent;
use crate::store::{Deadline, Store};

const ONBOARD_GATE_MSG: &str =
    "Unable to mark onboard. Be within 100m of pickup and trip must be ongoing.";
const DROPOFF_GATE_MSG: &str =
    "Unable to drop off. Be within 100m of destination and status must be onboard.";
const STATE_REASON: &str = "missing live locations or invalid request state";
const DISTANCE_REASON: &str = "rider must be within 100m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelfAction {
    Onboard,
    Dropoff,
}

/// The one gate predicate behind both the real transitions and the
/// read-only previews. Never duplicated.
fn eligibility(
    trip_status: TripStatus,
    request: &RideRequest,
    live: Option<&LiveUserLocation>,
    action: SelfAction,
) -> Result<(), &'static str> {
    let expected = match action {
        SelfAction::Onboard => RideStatus::Waiting,
        SelfAction::Dropoff => RideStatus::Onboard,
    };
    let Some(live) = live else {
        return Err(STATE_REASON);
    };
    if trip_status != TripStatus::Ongoing || request.status != expected {
        return Err(STATE_REASON);
    }
    let target = match action {
        SelfAction::Onboard => request.pickup,
        SelfAction::Dropoff => request.drop,
    };
    if !geo::within(&live.position, &target, GEOFENCE_RADIUS_M) {
        return Err(DISTANCE_REASON);
    }
    Ok(())
}

/// Owns the per-request `waiting -> onboard -> dropedoff` state machine.
///
/// Gate failures collapse into one coarse `NotEligible`; the caller is
/// not told which sub-check failed.
pub struct RideRequestLifecycle {
    store: Arc<Store>,
    hub: Arc<RealtimeHub>,
    metrics: Metrics,
}

impl RideRequestLifecycle {
    pub fn new(store: Arc<Store>, hub: Arc<RealtimeHub>, metrics: Metrics) -> Self {
        Self {
            store,
            hub,
            metrics,
        }
    }

    pub async fn mark_onboard(
        &self,
        request_id: Uuid,
        rider_user_id: Uuid,
        deadline: Deadline,
    ) -> Result<Uuid, AppError> {
        let result = self.onboard_tx(request_id, rider_user_id, &deadline).await;
        self.metrics
            .observe_transition("request_onboard", result.is_ok());

        let trip_id = result?;
        info!(trip_id = %trip_id, request_id = %request_id, "rider onboard");
        publish(
            &self.hub,
            &self.metrics,
            trip_id,
            ServerEvent::RiderOnboard {
                trip_id,
                request_id,
                status: RideStatus::Onboard,
            },
        );
        Ok(trip_id)
    }

    async fn onboard_tx(
        &self,
        request_id: Uuid,
        rider_user_id: Uuid,
        deadline: &Deadline,
    ) -> Result<Uuid, AppError> {
        let (trip_id, rider_id) = self
            .store
            .request_header(&request_id)
            .ok_or(AppError::NotFound)?;
        if rider_id != rider_user_id {
            return Err(AppError::NotEligible(ONBOARD_GATE_MSG.to_string()));
        }

        // trip row first, then the request row
        let trip = self
            .store
            .lock_trip(trip_id, deadline)
            .await
            .map_err(|err| coarse(err, ONBOARD_GATE_MSG))?;
        let mut request = self.store.lock_request(request_id, deadline).await?;
        let live = self.store.live_user(&rider_id);

        eligibility(trip.status, &request, live.as_ref(), SelfAction::Onboard)
            .map_err(|_| AppError::NotEligible(ONBOARD_GATE_MSG.to_string()))?;

        request.status = RideStatus::Onboard;
        request.updated_at = Utc::now();
        Ok(trip_id)
    }

    pub async fn mark_dropped_off(
        &self,
        request_id: Uuid,
        rider_user_id: Uuid,
        deadline: Deadline,
    ) -> Result<Uuid, AppError> {
        let result = self.dropoff_tx(request_id, rider_user_id, &deadline).await;
        self.metrics
            .observe_transition("request_dropoff", result.is_ok());

        let trip_id = result?;
        info!(trip_id = %trip_id, request_id = %request_id, "rider dropped off");
        publish(
            &self.hub,
            &self.metrics,
            trip_id,
            ServerEvent::RiderDroppedOff {
                trip_id,
                request_id,
                status: RideStatus::DroppedOff,
            },
        );
        Ok(trip_id)
    }

    async fn dropoff_tx(
        &self,
        request_id: Uuid,
        rider_user_id: Uuid,
        deadline: &Deadline,
    ) -> Result<Uuid, AppError> {
        let (trip_id, rider_id) = self
            .store
            .request_header(&request_id)
            .ok_or(AppError::NotFound)?;
        if rider_id != rider_user_id {
            return Err(AppError::NotEligible(DROPOFF_GATE_MSG.to_string()));
        }

        let mut trip = self
            .store
            .lock_trip(trip_id, deadline)
            .await
            .map_err(|err| coarse(err, DROPOFF_GATE_MSG))?;
        let mut request = self.store.lock_request(request_id, deadline).await?;
        let live = self.store.live_user(&rider_id);

        eligibility(trip.status, &request, live.as_ref(), SelfAction::Dropoff)
            .map_err(|_| AppError::NotEligible(DROPOFF_GATE_MSG.to_string()))?;

        let now = Utc::now();
        request.status = RideStatus::DroppedOff;
        request.updated_at = now;
        trip.available_seats += request.seats;
        trip.updated_at = now;
        self.store.delete_live_user(rider_id);
        Ok(trip_id)
    }

    /// Read-only preview of the boarding/drop-off gates. Evaluates the
    /// same predicate the real transitions run; the reason is finer than
    /// the transitions' coarse failure message.
    pub async fn check_self_action(
        &self,
        trip_id: Uuid,
        request_id: Uuid,
        rider_user_id: Uuid,
        action: SelfAction,
        deadline: Deadline,
    ) -> (bool, String) {
        let Some((request_trip_id, rider_id)) = self.store.request_header(&request_id) else {
            return (false, STATE_REASON.to_string());
        };
        if request_trip_id != trip_id || rider_id != rider_user_id {
            return (false, STATE_REASON.to_string());
        }

        let trip_status = match self.store.lock_trip(trip_id, &deadline).await {
            Ok(trip) => trip.status,
            Err(_) => return (false, STATE_REASON.to_string()),
        };
        let request = match self.store.lock_request(request_id, &deadline).await {
            Ok(request) => request.clone(),
            Err(_) => return (false, STATE_REASON.to_string()),
        };
        let live = self.store.live_user(&rider_id);

        match eligibility(trip_status, &request, live.as_ref(), action) {
            Ok(()) => (true, String::new()),
            Err(reason) => (false, reason.to_string()),
        }
    }
}

/// Timeouts stay timeouts; everything else collapses into the coarse gate failure.
fn coarse(err: AppError, message: &str) -> AppError {
    match err {
        AppError::Timeout => AppError::Timeout,
        _ => AppError::NotEligible(message.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{eligibility, SelfAction};
    use crate::models::live::{LiveUserLocation, PresenceStatus};
    use crate::models::request::{RideRequest, RideStatus};
    use crate::models::trip::{GeoPoint, TripStatus};

    fn request(status: RideStatus) -> RideRequest {
        RideRequest {
            id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            rider_id: Uuid::new_v4(),
            status,
            seats: 1,
            pickup: GeoPoint {
                lat: 27.7000,
                lng: 85.3000,
            },
            drop: GeoPoint {
                lat: 27.8000,
                lng: 85.4000,
            },
            pickup_address: "pickup".to_string(),
            drop_address: "drop".to_string(),
            total_fare: 250.0,
            cancelled_reason: None,
            cancelled_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn live_at(point: GeoPoint) -> LiveUserLocation {
        LiveUserLocation {
            user_id: Uuid::new_v4(),
            position: point,
            status: PresenceStatus::TripActive,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn onboard_requires_waiting_status() {
        let request = request(RideStatus::Onboard);
        let live = live_at(request.pickup);
        let result = eligibility(
            TripStatus::Ongoing,
            &request,
            Some(&live),
            SelfAction::Onboard,
        );
        assert!(result.is_err());
    }

    #[test]
    fn onboard_requires_ongoing_trip() {
        let request = request(RideStatus::Waiting);
        let live = live_at(request.pickup);
        let result = eligibility(
            TripStatus::Scheduled,
            &request,
            Some(&live),
            SelfAction::Onboard,
        );
        assert!(result.is_err());
    }

    #[test]
    fn onboard_requires_proximity_to_pickup() {
        let request = request(RideStatus::Waiting);
        let far = live_at(request.drop);
        assert!(eligibility(
            TripStatus::Ongoing,
            &request,
            Some(&far),
            SelfAction::Onboard
        )
        .is_err());

        let near = live_at(request.pickup);
        assert!(eligibility(
            TripStatus::Ongoing,
            &request,
            Some(&near),
            SelfAction::Onboard
        )
        .is_ok());
    }

    #[test]
    fn dropoff_checks_the_drop_point() {
        let request = request(RideStatus::Onboard);
        let at_drop = live_at(request.drop);
        assert!(eligibility(
            TripStatus::Ongoing,
            &request,
            Some(&at_drop),
            SelfAction::Dropoff
        )
        .is_ok());
    }

    #[test]
    fn missing_live_location_is_never_eligible() {
        let request = request(RideStatus::Waiting);
        assert!(eligibility(TripStatus::Ongoing, &request, None, SelfAction::Onboard).is_err());
    }
}
