//! Audit trail fed from the event bus.
//!
//! Events are published only after their commit, so the trail never shows a
//! change that did not happen. It is in-memory and starts empty: it records
//! what this process saw after [`AuditTrail::spawn`]. At most `capacity`
//! reservations are tracked; past that the least recently started history is
//! dropped.

use crate::aggregates::{HotelEvent, ReservationEvent};
use crate::types::ReservationId;
use futures::StreamExt;
use hotel_ops_core::event_bus::EventBus;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::task::JoinHandle;

struct Log {
    recorded: usize,
    capacity: usize,
    // Reservation ids in the order their history started
    order: VecDeque<ReservationId>,
    reservations: HashMap<ReservationId, Vec<ReservationEvent>>,
}

impl Log {
    fn new(capacity: usize) -> Self {
        Self { recorded: 0, capacity: capacity.max(1), order: VecDeque::new(), reservations: HashMap::new() }
    }

    fn record(&mut self, event: ReservationEvent) {
        let reservation_id = event.reservation_id();
        if let Some(history) = self.reservations.get_mut(&reservation_id) {
            history.push(event);
            return;
        }
        while self.reservations.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else { break };
            self.reservations.remove(&oldest);
            tracing::debug!(reservation_id = %oldest, "Audit history evicted");
        }
        self.order.push_back(reservation_id);
        self.reservations.insert(reservation_id, vec![event]);
    }
}

/// Per-reservation event history
pub struct AuditTrail {
    log: Arc<RwLock<Log>>,
    task: JoinHandle<()>,
}

impl AuditTrail {
    /// Subscribe to `bus` and start recording the histories of up to
    /// `capacity` reservations.
    ///
    /// Must be called inside a tokio runtime. Recording stops when the trail
    /// is dropped or the bus goes away.
    #[must_use]
    pub fn spawn(bus: &dyn EventBus<HotelEvent>, capacity: usize) -> Self {
        let log = Arc::new(RwLock::new(Log::new(capacity)));
        let mut events = bus.subscribe();
        let sink = Arc::clone(&log);

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let mut log = sink.write().unwrap_or_else(PoisonError::into_inner);
                log.recorded += 1;
                if let HotelEvent::Reservation(event) = event {
                    tracing::debug!(
                        reservation_id = %event.reservation_id(),
                        event = event.name(),
                        "Audit entry recorded"
                    );
                    log.record(event);
                }
            }
            tracing::debug!("Event bus closed, audit trail stopped");
        });

        Self { log, task }
    }

    /// Every recorded change to `reservation_id`, oldest first
    #[must_use]
    pub fn history(&self, reservation_id: ReservationId) -> Vec<ReservationEvent> {
        self.read(|log| log.reservations.get(&reservation_id).cloned().unwrap_or_default())
    }

    /// Reservations whose history is currently held
    #[must_use]
    pub fn tracked_reservations(&self) -> usize {
        self.read(|log| log.reservations.len())
    }

    /// Events of any kind seen so far
    #[must_use]
    pub fn events_recorded(&self) -> usize {
        self.read(|log| log.recorded)
    }

    fn read<T>(&self, f: impl FnOnce(&Log) -> T) -> T {
        f(&self.log.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Drop for AuditTrail {
    fn drop(&mut self) {
        self.task.abort();
    }
}
