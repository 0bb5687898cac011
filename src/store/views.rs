use uuid::Uuid;

use crate::error::AppError;
use crate::models::request::RideStatus;
use crate::models::view::{LiveTripView, RequestSummary, RiderView};
use crate::store::{Deadline, Store};

impl Store {
    /// Composed live view of one trip for a given viewer.
    ///
    /// Holds the trip row lock while the rider rows are read so the view
    /// is a consistent snapshot with respect to lifecycle transitions.
    pub async fn live_trip_view(
        &self,
        trip_id: Uuid,
        viewer: Uuid,
        deadline: &Deadline,
    ) -> Result<LiveTripView, AppError> {
        let trip_guard = self.lock_trip(trip_id, deadline).await?;
        let trip = trip_guard.clone();

        let is_driver_viewer = viewer == trip.driver_id;
        let live = self.live_trip(&trip_id);

        let mut riders = Vec::new();
        let mut my_request = None;
        for request_id in self.request_ids_for_trip(trip_id) {
            let request = self.lock_request(request_id, deadline).await?.clone();

            if request.rider_id == viewer && request.status != RideStatus::Cancelled {
                my_request = Some(RequestSummary {
                    id: request.id,
                    status: request.status,
                    seats: request.seats,
                    total_fare: request.total_fare,
                    pickup_address: request.pickup_address.clone(),
                    drop_address: request.drop_address.clone(),
                });
            }

            let active = matches!(
                request.status,
                RideStatus::Waiting | RideStatus::Onboard | RideStatus::DroppedOff
            );
            if is_driver_viewer && active {
                let live_user = self.live_user(&request.rider_id);
                riders.push(RiderView {
                    request_id: request.id,
                    rider_name: self.user_name(&request.rider_id),
                    status: request.status,
                    seats: request.seats,
                    total_fare: request.total_fare,
                    pickup_address: request.pickup_address,
                    drop_address: request.drop_address,
                    pickup: request.pickup,
                    drop: request.drop,
                    position: live_user
                        .as_ref()
                        .map(|row| row.position)
                        .unwrap_or(request.pickup),
                    live_status: live_user.as_ref().map(|row| row.status),
                    live_last_updated: live_user.map(|row| row.updated_at),
                });
            }
        }
        drop(trip_guard);

        let mut stops = trip.stops;
        stops.sort_by_key(|stop| stop.stop_order);

        Ok(LiveTripView {
            trip_id: trip.id,
            trip_status: trip.status,
            from_address: trip.from_address,
            to_address: trip.to_address,
            from: trip.origin,
            to: trip.destination,
            travel_date: trip.travel_date,
            fare_per_seat: trip.fare_per_seat,
            total_seats: trip.total_seats,
            available_seats: trip.available_seats,
            driver_name: self.user_name(&trip.driver_id),
            is_driver_viewer,
            driver_position: live.as_ref().map(|row| row.position),
            driver_heading: live.as_ref().and_then(|row| row.heading),
            driver_speed_kmph: live.as_ref().and_then(|row| row.speed_kmph),
            driver_last_updated: live.map(|row| row.updated_at),
            route_geometry: trip.route.map(|route| route.geometry),
            stops,
            riders,
            my_request,
        })
    }

    /// The caller's current ongoing trip, composed the same way.
    pub async fn current_driver_live_trip(
        &self,
        driver_id: Uuid,
        deadline: &Deadline,
    ) -> Result<LiveTripView, AppError> {
        let trip_id = self
            .ongoing_trip_for_driver(&driver_id)
            .ok_or(AppError::NotFound)?;
        self.live_trip_view(trip_id, driver_id, deadline).await
    }
}
