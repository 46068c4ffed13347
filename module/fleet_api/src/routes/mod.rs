//! REST API route handlers.

pub mod health;
pub mod auth;
pub mod vehicles;
pub mod customers;
pub mod rentals;
pub mod maintenance;
pub mod accounting;
pub mod reports;

use serde::Deserialize;
use uuid::Uuid;

/// Shared cursor-pagination query parameters.
#[ derive( Debug, Deserialize ) ]
pub struct PageQuery
{
  /// Page size, 1..=100, default 20.
  pub limit: Option< i64 >,
  /// Id of the last item of the previous page.
  pub cursor: Option< Uuid >,
}
