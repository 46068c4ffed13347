//! Reliable-delivery scaffolding and idempotency records.
//!
//! Outbox rows are inserted in the same transaction as the state change
//! they describe; an external publisher drains them in insertion order.
//! The inbox deduplicates by `(message_id, consumer_group)`.

use chrono::{ DateTime, Duration, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

/// Default idempotency-record lifetime.
pub const IDEMPOTENCY_DEFAULT_TTL_MINUTES: i64 = 60;
/// Hard ceiling on the idempotency-record lifetime.
pub const IDEMPOTENCY_MAX_TTL_MINUTES: i64 = 24 * 60;

/// Stored response for a non-safe request, keyed by the client-supplied
/// `Idempotency-Key` header.
///
/// Lifecycle: reserved on first sight (`response_status` null = in
/// progress), finalized when the handler's response is captured, evicted
/// once `expires_at` passes.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct IdempotencyRecord
{
  /// Client-supplied key, unique.
  pub key: String,
  /// Route path the key was first used on.
  pub path: String,
  /// HTTP method the key was first used on.
  pub method: String,
  /// Fingerprint of the original request body.
  pub request_fingerprint: Option< String >,
  /// Stored response status; null while the first request is in flight.
  pub response_status: Option< i32 >,
  /// Stored response body, replayed verbatim.
  pub response_body: Option< String >,
  /// Reservation instant.
  pub created_at: DateTime< Utc >,
  /// Eviction deadline.
  pub expires_at: DateTime< Utc >,
}

impl IdempotencyRecord
{
  /// Whether the original request has finished and stored its response.
  pub fn is_finalized( &self ) -> bool
  {
    self.response_status.is_some()
  }

  /// Clamp a requested TTL into the allowed window and produce the
  /// eviction deadline.
  pub fn expiry_for( created_at: DateTime< Utc >, ttl_minutes: i64 ) -> DateTime< Utc >
  {
    let clamped = ttl_minutes.clamp( 1, IDEMPOTENCY_MAX_TTL_MINUTES );
    created_at + Duration::minutes( clamped )
  }
}

/// A domain event awaiting publication.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct OutboxEvent
{
  /// Stable identifier; doubles as the published message id.
  pub id: Uuid,
  /// Aggregate the event belongs to (drain order is per-aggregate).
  pub aggregate_type: String,
  /// Aggregate instance.
  pub aggregate_id: Uuid,
  /// Event name, e.g. `rental.activated`.
  pub event_type: String,
  /// JSON payload.
  pub payload: serde_json::Value,
  /// Insertion instant; drain order within an aggregate.
  pub created_at: DateTime< Utc >,
  /// Set by the external publisher once delivered.
  pub published_at: Option< DateTime< Utc > >,
}

/// Dedup record for consumed messages.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct InboxProcessedMessage
{
  /// Message id as delivered.
  pub message_id: Uuid,
  /// Consumer group that processed it.
  pub consumer_group: String,
  /// Processing instant.
  pub processed_at: DateTime< Utc >,
}

/// A message the publisher gave up on.
#[ derive( Debug, Clone, Serialize, Deserialize ) ]
#[ serde( rename_all = "camelCase" ) ]
pub struct DlqMessage
{
  /// Stable identifier.
  pub id: Uuid,
  /// Failed outbox event.
  pub outbox_event_id: Uuid,
  /// Last failure description.
  pub failure_reason: String,
  /// Delivery attempts made.
  pub attempts: i32,
  /// Dead-lettering instant.
  pub failed_at: DateTime< Utc >,
}

#[ cfg( test ) ]
mod tests
{
  use super::*;

  #[ test ]
  fn ttl_is_clamped_to_a_day()
  {
    let now = Utc::now();
    let capped = IdempotencyRecord::expiry_for( now, 10_000 );
    assert_eq!( capped, now + Duration::minutes( IDEMPOTENCY_MAX_TTL_MINUTES ) );

    let floor = IdempotencyRecord::expiry_for( now, 0 );
    assert_eq!( floor, now + Duration::minutes( 1 ) );
  }

  #[ test ]
  fn reservation_is_not_finalized()
  {
    let now = Utc::now();
    let record = IdempotencyRecord
    {
      key: "k1".to_string(),
      path: "/v1/accounting/invoices/x/pay".to_string(),
      method: "POST".to_string(),
      request_fingerprint: None,
      response_status: None,
      response_body: None,
      created_at: now,
      expires_at: IdempotencyRecord::expiry_for( now, IDEMPOTENCY_DEFAULT_TTL_MINUTES ),
    };
    assert!( !record.is_finalized() );
  }
}
