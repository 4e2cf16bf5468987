//! Reusable test data.
//!
//! The reference week is open Monday to Saturday, 09:00-18:00 with a
//! 13:00-14:00 break. All dates are in March 2030 so they stay in the
//! future relative to the wall clock.

#![allow(clippy::unwrap_used)] // Fixed, known-valid literals
#![allow(clippy::missing_panics_doc)]

use chairbook_core::calendar::{BusinessHours, TimeWindow, WeeklySchedule};
use chairbook_core::types::{
    Appointment, AppointmentId, AppointmentStatus, BookingCode, Client, ClientId, Contact,
    CreationChannel, GrantId, GrantStatus, MembershipGrant, MembershipType, MembershipTypeId,
    Money, Product, ProductId, Service, ServiceId,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

/// `HH:MM` as a time
#[must_use]
pub fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// Monday 2030-03-11
#[must_use]
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 11).unwrap()
}

/// Sunday 2030-03-10 (closed in the reference week)
#[must_use]
pub fn sunday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 3, 10).unwrap()
}

/// UTC instant on `date` at `time`
#[must_use]
pub fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Monday to Saturday, 09:00-18:00, break 13:00-14:00
#[must_use]
pub fn standard_week() -> WeeklySchedule {
    WeeklySchedule::new((1..=6).map(|weekday| BusinessHours {
        weekday,
        is_open: true,
        open: t(9, 0),
        close: t(18, 0),
        break_window: Some(TimeWindow {
            start: t(13, 0),
            end: t(14, 0),
        }),
    }))
    .unwrap()
}

/// 60-minute standard service
#[must_use]
pub fn haircut() -> Service {
    Service {
        id: ServiceId::new(),
        name: "Haircut".to_string(),
        duration_minutes: 60,
        price: Money::from_cents(3000),
        allows_concurrent: false,
        active: true,
    }
}

/// 30-minute service that runs on the parallel track
#[must_use]
pub fn hair_wash() -> Service {
    Service {
        id: ServiceId::new(),
        name: "Hair wash".to_string(),
        duration_minutes: 30,
        price: Money::from_cents(1000),
        allows_concurrent: true,
        active: true,
    }
}

/// Client with settled visits (no deposit required)
#[must_use]
pub fn returning_client() -> Client {
    Client {
        id: ClientId::new(),
        contact: Contact {
            name: "Ana Returning".to_string(),
            email: Some("ana@example.com".to_string()),
            phone: Some("+15550100".to_string()),
        },
        visit_count: 3,
        total_spent: Money::from_cents(9000),
        last_visit: Some(NaiveDate::from_ymd_opt(2030, 2, 1).unwrap()),
    }
}

/// Client with no settled visit (deposit required by default)
#[must_use]
pub fn new_client() -> Client {
    Client {
        id: ClientId::new(),
        contact: Contact {
            name: "Ben New".to_string(),
            email: Some("ben@example.com".to_string()),
            phone: None,
        },
        visit_count: 0,
        total_spent: Money::ZERO,
        last_visit: None,
    }
}

/// Active product
#[must_use]
pub fn product(stock: u32, price_cents: u64) -> Product {
    Product {
        id: ProductId::new(),
        name: "Pomade".to_string(),
        stock,
        price: Money::from_cents(price_cents),
        active: true,
    }
}

/// Membership plan restricted to `services` (empty = any service)
#[must_use]
pub fn plan(services: Vec<ServiceId>) -> MembershipType {
    MembershipType {
        id: MembershipTypeId::new(),
        name: "Monthly cuts".to_string(),
        eligible_services: services,
    }
}

/// Active grant on `plan` for `client`
#[must_use]
pub fn grant(client: ClientId, plan: MembershipTypeId, total: u32, used: u32) -> MembershipGrant {
    MembershipGrant {
        id: GrantId::new(),
        client_id: client,
        membership_type_id: plan,
        total_credits: total,
        used_credits: used,
        status: GrantStatus::Active,
        expires_on: None,
        activated_at: at(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), t(9, 0)),
    }
}

/// Appointment for `service` on `date` starting at `start`
#[must_use]
pub fn appointment(
    client: ClientId,
    service: &Service,
    date: NaiveDate,
    start: NaiveTime,
    status: AppointmentStatus,
) -> Appointment {
    let created = at(date, t(8, 0));
    let id = AppointmentId::new();
    Appointment {
        id,
        booking_code: BookingCode::from_string(id.as_uuid().simple().to_string()[..8].to_uppercase()),
        client_id: client,
        service_id: service.id,
        date,
        start,
        end: start + chrono::Duration::minutes(i64::from(service.duration_minutes)),
        status,
        channel: CreationChannel::Staff,
        deposit_required: false,
        deposit_paid: false,
        deposit_hold_expires_at: None,
        reminder_sent: false,
        cancellation_reason: None,
        notes: None,
        created_at: created,
        updated_at: created,
    }
}
