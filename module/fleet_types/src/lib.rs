//! # `fleet_types`
//!
//! Canonical domain model for the fleet management backend.
//!
//! Entities expose only state transitions that preserve their invariants;
//! transition methods fail fast with a typed [`FleetError`] kind when a
//! precondition is violated. Nothing in this crate knows about storage,
//! HTTP, or a cache — those layers consume these types.
//!
//! All monetary amounts are whole Philippine pesos carried as `i64`. The
//! historical centavo representation is deliberately not modeled.

pub mod error;
pub mod vehicle;
pub mod customer;
pub mod rental;
pub mod maintenance;
pub mod accounting;
pub mod billing;
pub mod user;
pub mod messaging;
pub mod pagination;

pub use error::{ FieldViolation, FleetError, Result };
pub use vehicle::{ Vehicle, VehicleState };
pub use customer::Customer;
pub use rental::{ Rental, RentalStatus };
pub use maintenance::{ MaintenanceJob, MaintenancePart, MaintenanceStatus, MaintenanceType };
pub use accounting::{ Account, AccountType, LedgerEntry, LedgerLine };
pub use billing::{ Invoice, InvoiceStatus, Payment, PaymentMethod, PaymentStatus };
pub use user::{ AppUser, Role };
pub use messaging::{ DlqMessage, IdempotencyRecord, InboxProcessedMessage, OutboxEvent };
pub use pagination::CursorPage;

/// Whole-unit monetary amount in Philippine pesos.
pub type Amount = i64;

/// Default currency code for every monetary amount in the system.
pub const CURRENCY_PHP: &str = "PHP";
