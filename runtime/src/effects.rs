//! Post-commit effect dispatch.
//!
//! Reducers return [`Effect`] descriptions. Once the state they produced is
//! durably committed, the caller hands the effects to [`dispatch`], which
//! publishes every event in order.

use crate::metrics::EventBusMetrics;
use hotel_ops_core::effect::Effect;
use hotel_ops_core::event_bus::EventBus;

/// Publish the events described by `effects`, in order.
///
/// Publishing is best-effort: the state change has already been committed,
/// so a bus failure is logged and counted but never undoes or fails the
/// operation. Returns the number of events handed to the bus.
pub fn dispatch<E, I>(effects: I, bus: &dyn EventBus<E>) -> usize
where
    I: IntoIterator<Item = Effect<E>>,
{
    let mut published = 0;
    for event in effects.into_iter().flat_map(Effect::into_events) {
        match bus.publish(event) {
            Ok(receivers) => {
                published += 1;
                EventBusMetrics::record_publish();
                tracing::trace!(receivers, "Event published");
            },
            Err(error) => {
                EventBusMetrics::record_publish_error();
                tracing::warn!(%error, "Failed to publish committed event");
            },
        }
    }
    published
}
