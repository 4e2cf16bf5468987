//! Row decoding and column conversions.
//!
//! Queries are built at runtime with `sqlx::query` and decoded by hand, so
//! the crate compiles without a live database.

use chairbook_core::calendar::{BlockedWindow, BusinessHours, TimeWindow};
use chairbook_core::error::StoreError;
use chairbook_core::interval::{BookedInterval, MinuteInterval};
use chairbook_core::types::{
    Appointment, AppointmentId, AppointmentStatus, BookingCode, Client, ClientId, Contact,
    CostBreakdown, CreationChannel, GrantId, GrantStatus, MembershipGrant, MembershipType,
    MembershipTypeId, Money, PaymentMethod, Product, ProductId, Service, ServiceId,
    SettlementId, SettlementLine, SettlementRecord,
};
use chrono::NaiveTime;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::Row;
use uuid::Uuid;

/// Columns selected for every appointment read.
pub(crate) const APPOINTMENT_COLUMNS: &str = "id, booking_code, client_id, service_id, date, \
    start_time, end_time, status, channel, deposit_required, deposit_paid, \
    deposit_hold_expires_at, reminder_sent, cancellation_reason, notes, created_at, updated_at";

/// Columns selected for every grant read.
pub(crate) const GRANT_COLUMNS: &str = "id, client_id, membership_type_id, total_credits, \
    used_credits, status, expires_on, activated_at";

/// Translate a driver error.
///
/// Unique violations keep the constraint name; callers tell booking-code
/// collisions from slot collisions by it.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let constraint = db.constraint().unwrap_or("unknown").to_string();
            metrics::counter!("chairbook_store_unique_violations_total", "constraint" => constraint.clone())
                .increment(1);
            StoreError::UniqueViolation(constraint)
        }
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Connection(err.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Corrupt(err.to_string()),
        _ => StoreError::Query(err.to_string()),
    }
}

pub(crate) fn cents(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Query(format!("amount {} cents out of range", money.cents())))
}

pub(crate) fn count(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Query(format!("count {value} out of range")))
}

fn money(value: i64, column: &str) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Corrupt(format!("{column} is negative: {value}")))
}

fn unsigned(value: i32, column: &str) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} is negative: {value}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(store_error)
}

fn parsed<T>(value: &str, column: &str, parse: impl FnOnce(&str) -> Option<T>) -> Result<T, StoreError> {
    parse(value).ok_or_else(|| StoreError::Corrupt(format!("unknown {column} '{value}'")))
}

pub(crate) fn service(row: &PgRow) -> Result<Service, StoreError> {
    Ok(Service {
        id: ServiceId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        duration_minutes: unsigned(get(row, "duration_minutes")?, "duration_minutes")?,
        price: money(get(row, "price_cents")?, "price_cents")?,
        allows_concurrent: get(row, "allows_concurrent")?,
        active: get(row, "active")?,
    })
}

pub(crate) fn client(row: &PgRow) -> Result<Client, StoreError> {
    Ok(Client {
        id: ClientId::from_uuid(get(row, "id")?),
        contact: Contact {
            name: get(row, "name")?,
            email: get(row, "email")?,
            phone: get(row, "phone")?,
        },
        visit_count: unsigned(get(row, "visit_count")?, "visit_count")?,
        total_spent: money(get(row, "total_spent_cents")?, "total_spent_cents")?,
        last_visit: get(row, "last_visit")?,
    })
}

pub(crate) fn appointment(row: &PgRow) -> Result<Appointment, StoreError> {
    let status: String = get(row, "status")?;
    let channel: String = get(row, "channel")?;
    Ok(Appointment {
        id: AppointmentId::from_uuid(get(row, "id")?),
        booking_code: BookingCode::from_string(get(row, "booking_code")?),
        client_id: ClientId::from_uuid(get(row, "client_id")?),
        service_id: ServiceId::from_uuid(get(row, "service_id")?),
        date: get(row, "date")?,
        start: get(row, "start_time")?,
        end: get(row, "end_time")?,
        status: parsed(&status, "status", AppointmentStatus::parse)?,
        channel: parsed(&channel, "channel", CreationChannel::parse)?,
        deposit_required: get(row, "deposit_required")?,
        deposit_paid: get(row, "deposit_paid")?,
        deposit_hold_expires_at: get(row, "deposit_hold_expires_at")?,
        reminder_sent: get(row, "reminder_sent")?,
        cancellation_reason: get(row, "cancellation_reason")?,
        notes: get(row, "notes")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

pub(crate) fn booked_interval(row: &PgRow) -> Result<BookedInterval, StoreError> {
    let start: NaiveTime = get(row, "start_time")?;
    let end: NaiveTime = get(row, "end_time")?;
    Ok(BookedInterval {
        appointment_id: AppointmentId::from_uuid(get(row, "id")?),
        service_id: ServiceId::from_uuid(get(row, "service_id")?),
        allows_concurrent: get(row, "allows_concurrent")?,
        span: MinuteInterval::from_times(start, end),
    })
}

pub(crate) fn product(row: &PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: ProductId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        stock: unsigned(get(row, "stock")?, "stock")?,
        price: money(get(row, "price_cents")?, "price_cents")?,
        active: get(row, "active")?,
    })
}

pub(crate) fn membership_type(row: &PgRow) -> Result<MembershipType, StoreError> {
    membership_type_of(row, MembershipTypeId::from_uuid(get(row, "id")?))
}

/// Plan columns of a row whose `id` column belongs to another table.
pub(crate) fn membership_type_of(
    row: &PgRow,
    id: MembershipTypeId,
) -> Result<MembershipType, StoreError> {
    let eligible: Vec<Uuid> = get(row, "eligible_services")?;
    Ok(MembershipType {
        id,
        name: get(row, "name")?,
        eligible_services: eligible.into_iter().map(ServiceId::from_uuid).collect(),
    })
}

pub(crate) fn grant(row: &PgRow) -> Result<MembershipGrant, StoreError> {
    let status: String = get(row, "status")?;
    Ok(MembershipGrant {
        id: GrantId::from_uuid(get(row, "id")?),
        client_id: ClientId::from_uuid(get(row, "client_id")?),
        membership_type_id: MembershipTypeId::from_uuid(get(row, "membership_type_id")?),
        total_credits: unsigned(get(row, "total_credits")?, "total_credits")?,
        used_credits: unsigned(get(row, "used_credits")?, "used_credits")?,
        status: parsed(&status, "grant status", GrantStatus::parse)?,
        expires_on: get(row, "expires_on")?,
        activated_at: get(row, "activated_at")?,
    })
}

pub(crate) fn business_hours(row: &PgRow) -> Result<BusinessHours, StoreError> {
    let weekday: i16 = get(row, "weekday")?;
    let break_start: Option<NaiveTime> = get(row, "break_start")?;
    let break_end: Option<NaiveTime> = get(row, "break_end")?;
    Ok(BusinessHours {
        weekday: u8::try_from(weekday)
            .map_err(|_| StoreError::Corrupt(format!("weekday {weekday} out of range")))?,
        is_open: get(row, "is_open")?,
        open: get(row, "open_time")?,
        close: get(row, "close_time")?,
        break_window: break_start
            .zip(break_end)
            .map(|(start, end)| TimeWindow { start, end }),
    })
}

pub(crate) fn blocked_window(row: &PgRow) -> Result<BlockedWindow, StoreError> {
    Ok(BlockedWindow {
        date: get(row, "date")?,
        start: get(row, "start_time")?,
        end: get(row, "end_time")?,
        reason: get(row, "reason")?,
    })
}

pub(crate) fn settlement(row: &PgRow) -> Result<SettlementRecord, StoreError> {
    let method: String = get(row, "payment_method")?;
    let lines: Json<Vec<SettlementLine>> = get(row, "lines")?;
    let grant_id: Option<Uuid> = get(row, "membership_grant_id")?;
    Ok(SettlementRecord {
        id: SettlementId::from_uuid(get(row, "id")?),
        appointment_id: AppointmentId::from_uuid(get(row, "appointment_id")?),
        client_id: ClientId::from_uuid(get(row, "client_id")?),
        breakdown: CostBreakdown {
            service_cost: money(get(row, "service_cost_cents")?, "service_cost_cents")?,
            product_cost: money(get(row, "product_cost_cents")?, "product_cost_cents")?,
            discount: money(get(row, "discount_cents")?, "discount_cents")?,
            total: money(get(row, "total_cents")?, "total_cents")?,
        },
        payment_method: parsed(&method, "payment method", PaymentMethod::parse)?,
        membership_credit_used: get(row, "membership_credit_used")?,
        membership_grant_id: grant_id.map(GrantId::from_uuid),
        lines: lines.0,
        settled_at: get(row, "settled_at")?,
    })
}
