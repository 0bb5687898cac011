pub mod request;
pub mod trip;

use uuid::Uuid;

use crate::hub::RealtimeHub;
use crate::observability::metrics::Metrics;
use crate::protocol::ServerEvent;

/// Publish a committed transition to the trip's room.
pub(crate) fn publish(hub: &RealtimeHub, metrics: &Metrics, trip_id: Uuid, event: ServerEvent) {
    metrics
        .broadcasts_total
        .with_label_values(&[event.name()])
        .inc();
    hub.broadcast(trip_id, &event);
}
