//! Domain types for the booking and settlement engine.
//!
//! Value objects, entities and status enums shared by every layer. All
//! monetary amounts are integer cents, all calendar times are local
//! business times (`NaiveDate` / `NaiveTime`), and all audit timestamps
//! are UTC.

use crate::interval::MinuteInterval;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a bookable service
    ServiceId
);
uuid_id!(
    /// Unique identifier for an appointment
    AppointmentId
);
uuid_id!(
    /// Unique identifier for a client
    ClientId
);
uuid_id!(
    /// Unique identifier for a membership type (a plan definition)
    MembershipTypeId
);
uuid_id!(
    /// Unique identifier for a membership grant held by a client
    GrantId
);
uuid_id!(
    /// Unique identifier for a retail product
    ProductId
);
uuid_id!(
    /// Unique identifier for a settlement record
    SettlementId
);
uuid_id!(
    /// Unique identifier for a ledger entry
    FinancialEntryId
);

// ============================================================================
// Money
// ============================================================================

/// Monetary amount in cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero cents
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns `true` when the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, returning `None` on overflow
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Subtracts, returning `None` when the result would be negative
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Services
// ============================================================================

/// A bookable service (haircut, beard trim, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service identifier
    pub id: ServiceId,
    /// Display name
    pub name: String,
    /// Duration in minutes
    pub duration_minutes: u32,
    /// List price
    pub price: Money,
    /// May run in parallel with a standard appointment (second staff track)
    pub allows_concurrent: bool,
    /// Inactive services cannot be booked
    pub active: bool,
}

// ============================================================================
// Appointments
// ============================================================================

/// Appointment status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// New client awaiting deposit validation
    Pending,
    /// Booking accepted, no deposit outstanding
    Scheduled,
    /// Deposit validated or paid in full
    Confirmed,
    /// Client is in the chair
    InProgress,
    /// Fulfilled and settled (terminal)
    Completed,
    /// Cancelled by a person or by hold expiry (terminal)
    Cancelled,
    /// Client did not show up
    NoShow,
}

impl AppointmentStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Scheduled,
        Self::Confirmed,
        Self::InProgress,
        Self::Completed,
        Self::Cancelled,
        Self::NoShow,
    ];

    /// Convert to the storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// `completed` and `cancelled` accept no further transitions
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether an appointment in this status occupies its interval
    #[must_use]
    pub const fn occupies_calendar(&self) -> bool {
        !matches!(self, Self::Cancelled | Self::NoShow)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the appointment was created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationChannel {
    /// Self-service booking
    #[default]
    Online,
    /// Entered by staff
    Staff,
    /// Walk-in client
    WalkIn,
}

impl CreationChannel {
    /// Convert to the storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Staff => "staff",
            Self::WalkIn => "walk_in",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "staff" => Some(Self::Staff),
            "walk_in" => Some(Self::WalkIn),
            _ => None,
        }
    }
}

/// Who initiated a cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationOrigin {
    /// The client asked for it
    Client,
    /// Staff cancelled it
    Staff,
    /// The engine cancelled it (deposit hold expiry)
    System,
}

impl CancellationOrigin {
    /// Reason recorded when the caller gives none
    #[must_use]
    pub const fn default_reason(&self) -> &'static str {
        match self {
            Self::Client => "Cancelled by client",
            Self::Staff => "Cancelled by staff",
            Self::System => "Cancelled automatically",
        }
    }
}

/// Human-readable, collision-resistant short code given to the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingCode(String);

impl BookingCode {
    /// Characters used in codes; excludes look-alikes such as `0/O` and `1/I`.
    pub const ALPHABET: &'static [u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

    /// Code length
    pub const LENGTH: usize = 8;

    /// Generate a random code
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..Self::LENGTH)
            .map(|_| char::from(Self::ALPHABET[rng.gen_range(0..Self::ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// Wrap an existing code (e.g. loaded from storage)
    #[must_use]
    pub const fn from_string(code: String) -> Self {
        Self(code)
    }

    /// The code as text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A booked appointment.
///
/// Status and schedule fields are only changed through
/// [`AppointmentReducer`](crate::lifecycle::AppointmentReducer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    /// Appointment identifier
    pub id: AppointmentId,
    /// Code handed to the client
    pub booking_code: BookingCode,
    /// Who the appointment is for
    pub client_id: ClientId,
    /// What is being booked
    pub service_id: ServiceId,
    /// Local business date
    pub date: NaiveDate,
    /// Local start time (inclusive)
    pub start: NaiveTime,
    /// Local end time (exclusive)
    pub end: NaiveTime,
    /// Lifecycle status
    pub status: AppointmentStatus,
    /// Where the booking came from
    pub channel: CreationChannel,
    /// A deposit must be paid before the hold expires
    pub deposit_required: bool,
    /// Deposit has been received
    pub deposit_paid: bool,
    /// When an unpaid hold lapses
    pub deposit_hold_expires_at: Option<DateTime<Utc>>,
    /// A reminder has been delivered
    pub reminder_sent: bool,
    /// Why it was cancelled
    pub cancellation_reason: Option<String>,
    /// Free-form notes from the booking
    pub notes: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last change timestamp
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// The appointment's half-open minute interval
    #[must_use]
    pub fn span(&self) -> MinuteInterval {
        MinuteInterval::from_times(self.start, self.end)
    }

    /// Local start as a date-time
    #[must_use]
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }

    /// Whether the deposit hold has lapsed at `now`
    #[must_use]
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == AppointmentStatus::Pending
            && !self.deposit_paid
            && self.deposit_hold_expires_at.is_some_and(|expiry| expiry <= now)
    }
}

// ============================================================================
// Clients
// ============================================================================

/// How to reach a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name
    pub name: String,
    /// Email address
    pub email: Option<String>,
    /// Phone number
    pub phone: Option<String>,
}

/// A client and their visit aggregates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier
    pub id: ClientId,
    /// Contact details
    pub contact: Contact,
    /// Number of settled visits
    pub visit_count: u32,
    /// Lifetime spend
    pub total_spent: Money,
    /// Date of the most recent settled visit
    pub last_visit: Option<NaiveDate>,
}

impl Client {
    /// A client with no settled visit yet
    #[must_use]
    pub const fn is_first_time(&self) -> bool {
        self.visit_count == 0
    }
}

// ============================================================================
// Memberships
// ============================================================================

/// Membership grant status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Credits may be consumed
    Active,
    /// Past its expiration date
    Expired,
    /// Cancelled by staff
    Cancelled,
}

impl GrantStatus {
    /// Convert to the storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A membership plan definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipType {
    /// Plan identifier
    pub id: MembershipTypeId,
    /// Display name
    pub name: String,
    /// Services a credit may pay for; empty means any service
    pub eligible_services: Vec<ServiceId>,
}

impl MembershipType {
    /// Whether a credit from this plan may pay for `service_id`
    #[must_use]
    pub fn covers(&self, service_id: ServiceId) -> bool {
        self.eligible_services.is_empty() || self.eligible_services.contains(&service_id)
    }
}

/// Prepaid credits held by a client.
///
/// `used <= total` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipGrant {
    /// Grant identifier
    pub id: GrantId,
    /// Holder
    pub client_id: ClientId,
    /// Plan
    pub membership_type_id: MembershipTypeId,
    /// Credits purchased
    pub total_credits: u32,
    /// Credits consumed
    pub used_credits: u32,
    /// Grant status
    pub status: GrantStatus,
    /// Last date on which credits may be used
    pub expires_on: Option<NaiveDate>,
    /// When the grant was activated
    pub activated_at: DateTime<Utc>,
}

impl MembershipGrant {
    /// Credits left
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.total_credits.saturating_sub(self.used_credits)
    }

    /// Whether a credit can be taken from this grant on `today`
    #[must_use]
    pub fn is_usable_on(&self, today: NaiveDate) -> bool {
        self.status == GrantStatus::Active
            && self.remaining() > 0
            && self.expires_on.is_none_or(|last_day| today <= last_day)
    }
}

/// A grant together with the plan that defines its service restriction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreditCandidate {
    /// The grant
    pub grant: MembershipGrant,
    /// Its plan
    pub membership_type: MembershipType,
}

/// Audit row written when a credit is consumed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditUsage {
    /// Grant the credit came from
    pub grant_id: GrantId,
    /// Appointment it paid for
    pub appointment_id: AppointmentId,
    /// When it was consumed
    pub used_at: DateTime<Utc>,
}

// ============================================================================
// Inventory
// ============================================================================

/// A retail product sold at checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Units on hand
    pub stock: u32,
    /// Current unit price
    pub price: Money,
    /// Inactive products cannot be sold
    pub active: bool,
}

// ============================================================================
// Settlement
// ============================================================================

/// Requested product sale at checkout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    /// Product sold
    pub product_id: ProductId,
    /// Units sold
    pub quantity: u32,
}

/// A product sale as recorded, with its price captured at settlement time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementLine {
    /// Product sold
    pub product_id: ProductId,
    /// Units sold
    pub quantity: u32,
    /// Unit price at settlement time
    pub unit_price: Money,
    /// `unit_price * quantity`
    pub line_total: Money,
}

/// Checkout amounts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    /// Service portion
    pub service_cost: Money,
    /// Product portion
    pub product_cost: Money,
    /// Discount applied
    pub discount: Money,
    /// Amount charged
    pub total: Money,
}

impl CostBreakdown {
    /// Checks that `total = service + products - discount`.
    ///
    /// # Errors
    ///
    /// Returns a description of the inconsistency.
    pub fn validate(&self) -> Result<(), String> {
        let subtotal = self
            .service_cost
            .checked_add(self.product_cost)
            .ok_or_else(|| "cost subtotal overflows".to_string())?;
        let expected = subtotal
            .checked_sub(self.discount)
            .ok_or_else(|| format!("discount {} exceeds subtotal {subtotal}", self.discount))?;
        if expected != self.total {
            return Err(format!(
                "total {} does not equal service {} + products {} - discount {}",
                self.total, self.service_cost, self.product_cost, self.discount
            ));
        }
        Ok(())
    }
}

/// How the client paid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash at the counter
    Cash,
    /// Card terminal
    Card,
    /// Bank transfer
    Transfer,
    /// Fully covered by a membership credit
    Membership,
}

impl PaymentMethod {
    /// Convert to the storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Transfer => "transfer",
            Self::Membership => "membership",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "transfer" => Some(Self::Transfer),
            "membership" => Some(Self::Membership),
            _ => None,
        }
    }
}

/// Input to a settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    /// Appointment being settled
    pub appointment_id: AppointmentId,
    /// Amounts
    pub breakdown: CostBreakdown,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Consume one membership credit
    #[serde(default)]
    pub use_membership_credit: bool,
    /// Products sold
    #[serde(default)]
    pub product_lines: Vec<ProductLine>,
}

/// The single checkout record of an appointment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    /// Record identifier
    pub id: SettlementId,
    /// Settled appointment (unique)
    pub appointment_id: AppointmentId,
    /// Client charged
    pub client_id: ClientId,
    /// Amounts
    pub breakdown: CostBreakdown,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// A membership credit was consumed
    pub membership_credit_used: bool,
    /// Grant the credit came from
    pub membership_grant_id: Option<GrantId>,
    /// Products sold
    pub lines: Vec<SettlementLine>,
    /// When it was settled
    pub settled_at: DateTime<Utc>,
}

/// Immutable ledger row for a non-zero settlement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialEntry {
    /// Entry identifier
    pub id: FinancialEntryId,
    /// Source settlement
    pub settlement_id: SettlementId,
    /// Source appointment
    pub appointment_id: AppointmentId,
    /// Client charged
    pub client_id: ClientId,
    /// Amount received
    pub amount: Money,
    /// Payment method
    pub payment_method: PaymentMethod,
    /// Business date of the income
    pub entry_date: NaiveDate,
    /// Ledger description
    pub description: String,
    /// When it was written
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in AppointmentStatus::ALL {
            assert_eq!(AppointmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AppointmentStatus::parse("archived"), None);
    }

    #[test]
    fn terminal_and_occupying_statuses() {
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::NoShow.is_terminal());
        assert!(!AppointmentStatus::NoShow.occupies_calendar());
        assert!(AppointmentStatus::Pending.occupies_calendar());
    }

    #[test]
    fn booking_code_uses_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = BookingCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), BookingCode::LENGTH);
            assert!(code.as_str().bytes().all(|b| BookingCode::ALPHABET.contains(&b)));
            assert!(!code.as_str().contains('0'));
            assert!(!code.as_str().contains('O'));
            assert!(!code.as_str().contains('I'));
        }
    }

    #[test]
    fn money_display_and_arithmetic() {
        assert_eq!(Money::from_cents(1250).to_string(), "12.50");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(3).checked_sub(Money::from_cents(4)), None);
        assert_eq!(
            Money::from_cents(250).checked_mul(3),
            Some(Money::from_cents(750))
        );
    }

    #[test]
    fn cost_breakdown_validation() {
        let ok = CostBreakdown {
            service_cost: Money::from_cents(3000),
            product_cost: Money::from_cents(1500),
            discount: Money::from_cents(500),
            total: Money::from_cents(4000),
        };
        assert!(ok.validate().is_ok());

        let wrong_total = CostBreakdown {
            total: Money::from_cents(4500),
            ..ok
        };
        assert!(wrong_total.validate().is_err());

        let oversized_discount = CostBreakdown {
            discount: Money::from_cents(5000),
            total: Money::ZERO,
            ..ok
        };
        assert!(oversized_discount.validate().is_err());
    }

    #[test]
    fn grant_usability() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let mut grant = MembershipGrant {
            id: GrantId::new(),
            client_id: ClientId::new(),
            membership_type_id: MembershipTypeId::new(),
            total_credits: 2,
            used_credits: 1,
            status: GrantStatus::Active,
            expires_on: Some(today),
            activated_at: Utc::now(),
        };
        assert_eq!(grant.remaining(), 1);
        assert!(grant.is_usable_on(today));
        assert!(!grant.is_usable_on(today.succ_opt().unwrap()));

        grant.used_credits = 2;
        assert!(!grant.is_usable_on(today));
    }

    #[test]
    fn membership_type_restriction() {
        let haircut = ServiceId::new();
        let unrestricted = MembershipType {
            id: MembershipTypeId::new(),
            name: "Any".to_string(),
            eligible_services: vec![],
        };
        let restricted = MembershipType {
            eligible_services: vec![haircut],
            ..unrestricted.clone()
        };
        assert!(unrestricted.covers(ServiceId::new()));
        assert!(restricted.covers(haircut));
        assert!(!restricted.covers(ServiceId::new()));
    }

    #[test]
    fn ids_parse_from_strings() {
        let id = AppointmentId::new();
        let parsed: AppointmentId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
