//! Application wiring.
//!
//! [`HotelApp`] builds every component over one shared store, one event bus
//! and one coordinator, and exposes the [`Dispatcher`] as the entry point.

use crate::aggregates::HotelEvent;
use crate::audit::AuditTrail;
use crate::authz::{PermissionResolver, RoleAdmin};
use crate::booking::BookingCoordinator;
use crate::catalog::HotelCatalog;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::HotelError;
use crate::key::ResourceKey;
use hotel_ops_core::environment::{Clock, SystemClock};
use hotel_ops_core::event_bus::EventBus;
use hotel_ops_core::state_store::StateStore;
use hotel_ops_runtime::{
    BroadcastEventBus, Coordinator, ExecutionContext, HealthCheck, HealthReport, InMemoryStateStore,
};
use std::sync::Arc;

/// The assembled hotel service
pub struct HotelApp {
    config: Config,
    store: Arc<dyn StateStore>,
    bus: Arc<BroadcastEventBus<HotelEvent>>,
    clock: Arc<dyn Clock>,
    booking: BookingCoordinator,
    catalog: HotelCatalog,
    roles: RoleAdmin,
    dispatcher: Dispatcher,
    audit: AuditTrail,
}

impl HotelApp {
    /// Wire the service over `store`.
    ///
    /// Must be called inside a tokio runtime: this node's execution context
    /// is the caller's runtime, and the audit trail starts listening at once.
    #[must_use]
    pub fn new(config: Config, store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        let bus = Arc::new(BroadcastEventBus::new(config.booking.event_bus_capacity));
        let shared_bus: Arc<dyn EventBus<HotelEvent>> = bus.clone();

        let membership = ExecutionContext::current(config.server.node_id.clone()).into_iter().collect();
        let coordinator = Coordinator::<ResourceKey>::with_membership(config.coordinator_config(), membership);
        let retry = config.commit_retry_policy();

        let booking = BookingCoordinator::new(
            Arc::clone(&store),
            coordinator,
            Arc::clone(&shared_bus),
            Arc::clone(&clock),
            retry.clone(),
        );
        let catalog = HotelCatalog::new(Arc::clone(&store), Arc::clone(&shared_bus), Arc::clone(&clock));
        let roles = RoleAdmin::new(Arc::clone(&store), retry);
        let resolver = PermissionResolver::new(Arc::clone(&store));
        let dispatcher = Dispatcher::new(resolver, roles.clone(), booking.clone(), catalog.clone());
        let audit = AuditTrail::spawn(bus.as_ref(), config.booking.audit_capacity);

        tracing::info!(node_id = %config.server.node_id, "Hotel service initialized");

        Self { config, store, bus, clock, booking, catalog, roles, dispatcher, audit }
    }

    /// Single-node service over a fresh in-memory store and the system clock
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, Arc::new(InMemoryStateStore::new()), Arc::new(SystemClock))
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The request entry point
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Mutations, bypassing authorization
    #[must_use]
    pub const fn booking(&self) -> &BookingCoordinator {
        &self.booking
    }

    /// Hotel records and reads, bypassing authorization
    #[must_use]
    pub const fn catalog(&self) -> &HotelCatalog {
        &self.catalog
    }

    /// Role administration, bypassing authorization. Used for bootstrap.
    #[must_use]
    pub const fn roles(&self) -> &RoleAdmin {
        &self.roles
    }

    /// Reservation history seen by this node
    #[must_use]
    pub const fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    /// Post-commit event stream
    #[must_use]
    pub fn events(&self) -> &BroadcastEventBus<HotelEvent> {
        &self.bus
    }

    /// Health of the coordinator and the store
    pub async fn health(&self) -> HealthReport {
        let store = match self.store.revision().await {
            Ok(revision) => HealthCheck::healthy("state_store").with_metadata("revision", revision.to_string()),
            Err(error) => HealthCheck::unhealthy("state_store", error.to_string()),
        };
        let checks = vec![self.booking.coordinator().health(), store];
        HealthReport::new(checks, self.clock.now())
    }

    /// Stop accepting mutations and drain queued work.
    ///
    /// # Errors
    ///
    /// Returns [`HotelError::Unavailable`] if work is still queued when the
    /// configured shutdown timeout expires.
    pub async fn shutdown(&self) -> Result<(), HotelError> {
        tracing::info!("Shutting down hotel service");
        self.booking.coordinator().shutdown(self.config.shutdown_timeout()).await?;
        Ok(())
    }
}
