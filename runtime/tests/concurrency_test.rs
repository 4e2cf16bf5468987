//! Races: overlapping reservations, the last membership credit and scarce
//! stock.

#![allow(clippy::unwrap_used)]

mod common;

use chairbook_core::error::{BookingError, SettlementError};
use chairbook_core::types::{
    AppointmentStatus, CostBreakdown, Money, PaymentMethod, ProductLine, SettlementRequest,
};
use chairbook_testing::MemoryState;
use chairbook_testing::fixtures::{self, monday, t};
use common::{Harness, request};
use futures::future::join_all;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_of_many_overlapping_bookings_succeeds() {
    let haircut = fixtures::haircut();
    let clients: Vec<_> = (0..10).map(|_| fixtures::returning_client()).collect();
    let mut state = MemoryState::default()
        .with_schedule(fixtures::standard_week())
        .with_service(haircut.clone());
    for client in &clients {
        state = state.with_client(client.clone());
    }
    let harness = Harness::new(state);

    let attempts = clients.iter().enumerate().map(|(i, client)| {
        let booking = harness.booking();
        // Alternate between the same start and an overlapping one
        let start = if i % 2 == 0 { t(10, 0) } else { t(10, 30) };
        let request = request(client.id, haircut.id, monday(), start);
        tokio::spawn(async move { booking.book(request).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let booked = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(BookingError::Conflict { .. })))
        .count();
    assert_eq!(booked, 1);
    assert_eq!(conflicts, 9);
    assert_eq!(harness.store.snapshot().await.appointments.len(), 1);
}

fn checkout(
    appointment: chairbook_core::types::AppointmentId,
    use_membership_credit: bool,
    product_lines: Vec<ProductLine>,
) -> SettlementRequest {
    SettlementRequest {
        appointment_id: appointment,
        breakdown: CostBreakdown {
            service_cost: Money::ZERO,
            product_cost: Money::ZERO,
            discount: Money::ZERO,
            total: Money::ZERO,
        },
        payment_method: if use_membership_credit {
            PaymentMethod::Membership
        } else {
            PaymentMethod::Cash
        },
        use_membership_credit,
        product_lines,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_credit_is_consumed_once() {
    let haircut = fixtures::haircut();
    let client = fixtures::returning_client();
    let plan = fixtures::plan(vec![]);
    let grant = fixtures::grant(client.id, plan.id, 5, 4);
    let appointments: Vec<_> = [t(9, 0), t(10, 0), t(11, 0), t(12, 0)]
        .into_iter()
        .map(|start| {
            fixtures::appointment(client.id, &haircut, monday(), start, AppointmentStatus::Scheduled)
        })
        .collect();

    let mut state = MemoryState::default()
        .with_service(haircut)
        .with_client(client)
        .with_membership_type(plan)
        .with_grant(grant.clone());
    for appointment in &appointments {
        state = state.with_appointment(appointment.clone());
    }
    let harness = Harness::new(state);

    let attempts = appointments.iter().map(|appointment| {
        let settlement = harness.settlement();
        let request = checkout(appointment.id, true, vec![]);
        tokio::spawn(async move { settlement.settle(request).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(SettlementError::NoEligibleCredit(_))))
            .count(),
        3
    );

    let state = harness.store.snapshot().await;
    let stored = &state.grants[&grant.id];
    assert_eq!(stored.used_credits, stored.total_credits);
    assert_eq!(state.credit_usages.len(), 1);
    assert_eq!(state.settlements.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stock_never_goes_negative() {
    let haircut = fixtures::haircut();
    let client = fixtures::returning_client();
    let pomade = fixtures::product(3, 500);
    let appointments: Vec<_> = [t(9, 0), t(10, 0), t(11, 0), t(12, 0), t(14, 0)]
        .into_iter()
        .map(|start| {
            fixtures::appointment(client.id, &haircut, monday(), start, AppointmentStatus::Confirmed)
        })
        .collect();

    let mut state = MemoryState::default()
        .with_service(haircut)
        .with_client(client)
        .with_product(pomade.clone());
    for appointment in &appointments {
        state = state.with_appointment(appointment.clone());
    }
    let harness = Harness::new(state);

    let attempts = appointments.iter().map(|appointment| {
        let settlement = harness.settlement();
        let request = checkout(
            appointment.id,
            false,
            vec![ProductLine {
                product_id: pomade.id,
                quantity: 1,
            }],
        );
        tokio::spawn(async move { settlement.settle(request).await })
    });
    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 3);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(SettlementError::InsufficientStock { available: 0, .. })))
            .count(),
        2
    );
    assert_eq!(harness.store.snapshot().await.products[&pomade.id].stock, 0);
}
