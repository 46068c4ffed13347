//! # `fleet_ops`
//!
//! Use-case engines for rentals, maintenance, and billing.
//!
//! Every mutation that touches more than one aggregate (rental↔vehicle,
//! rental↔ledger, maintenance↔vehicle, payment↔invoice↔ledger) runs
//! inside a single database transaction; there is no cross-service
//! two-phase commit anywhere. The storage layer remains the authority
//! for the booking-overlap and mileage invariants, so the engines treat
//! its verdicts as final rather than pre-checking and hoping.

pub mod vehicle_engine;
pub mod rental_engine;
pub mod maintenance_engine;
pub mod billing_engine;

pub use billing_engine::{ BillingEngine, CaptureOutcome };
pub use maintenance_engine::MaintenanceEngine;
pub use rental_engine::RentalEngine;
pub use vehicle_engine::{ NewVehicle, VehicleEngine, VehiclePatch };
