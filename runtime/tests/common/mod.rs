//! Shared harness for runtime integration tests.

#![allow(dead_code)]

use chairbook_core::environment::Clock;
use chairbook_core::settings::EngineSettings;
use chairbook_core::types::{ClientId, CreationChannel, ServiceId};
use chairbook_runtime::{
    BookingRequest, BookingService, DepositExpirySweeper, EngineEnvironment, MembershipService,
    SettlementService,
};
use chairbook_testing::{InMemoryBookingStore, ManualClock, MemoryState, RecordingEventBus, test_clock};
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;

/// Engine wired to in-memory doubles. The clock starts at Monday
/// 2030-03-11 08:00 UTC.
pub struct Harness {
    pub store: InMemoryBookingStore,
    pub clock: ManualClock,
    pub events: RecordingEventBus,
    pub env: EngineEnvironment,
}

impl Harness {
    pub fn new(state: MemoryState) -> Self {
        Self::with_settings(state, EngineSettings::default())
    }

    pub fn with_settings(state: MemoryState, settings: EngineSettings) -> Self {
        let store = InMemoryBookingStore::new(state);
        let clock = ManualClock::new(test_clock().now());
        let events = RecordingEventBus::new();
        let env = EngineEnvironment::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            Arc::new(events.clone()),
            settings,
        );
        Self {
            store,
            clock,
            events,
            env,
        }
    }

    pub fn booking(&self) -> BookingService {
        BookingService::new(self.env.clone())
    }

    pub fn settlement(&self) -> SettlementService {
        SettlementService::new(self.env.clone())
    }

    pub fn memberships(&self) -> MembershipService {
        MembershipService::new(self.env.clone())
    }

    pub fn sweeper(&self) -> DepositExpirySweeper {
        DepositExpirySweeper::new(self.env.clone())
    }
}

pub fn request(
    client_id: ClientId,
    service_id: ServiceId,
    date: NaiveDate,
    start: NaiveTime,
) -> BookingRequest {
    BookingRequest {
        client_id,
        service_id,
        date,
        start,
        notes: None,
        full_payment: false,
        channel: CreationChannel::Online,
    }
}
