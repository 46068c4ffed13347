//! # `fleet_api`
//!
//! HTTP pipeline for the fleet management backend.
//!
//! Middleware order on every request: request-id → rate limit (per route
//! class) → authentication → authorization → idempotency (designated
//! routes) → handler → error translator. Responses always carry the
//! uniform envelope and the `X-Request-ID` header.

pub mod envelope;
pub mod request_id;
pub mod rate_limit;
pub mod jwt_auth;
pub mod idempotency;
pub mod state;
pub mod routes;
pub mod housekeeping;

use axum::extract::{ Request, State };
use axum::middleware::from_fn_with_state;
use axum::response::{ IntoResponse, Response };
use axum::routing::{ get, patch, post };
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::envelope::ApiFailure;
use crate::request_id::RequestId;
use crate::state::AppState;
use fleet_types::FleetError;

pub use state::AppState as FleetApiState;

/// 404 for unclassified paths, behind the global 5/min safety net.
async fn not_found( State( state ): State< AppState >, request: Request ) -> Response
{
  let request_id = request
    .extensions()
    .get::< RequestId >()
    .cloned()
    .unwrap_or_else( RequestId::generate );

  let ip = request
    .extensions()
    .get::< axum::extract::ConnectInfo< std::net::SocketAddr > >()
    .map_or_else( || "unknown".to_string(), |info| info.0.ip().to_string() );

  let decision = state.limiter.check( rate_limit::RouteClass::Global, &ip );
  if !decision.allowed
  {
    let err = FleetError::RateLimited { retry_after_secs: decision.reset_secs };
    return ApiFailure::from_error( &err, &request_id ).into_response();
  }

  ApiFailure::from_error(
    &FleetError::NotFound( format!( "no route for {}", request.uri().path() ) ),
    &request_id,
  )
  .into_response()
}

/// Assemble the full router over prepared state.
pub fn build_router( state: AppState ) -> Router
{
  // Credential surface: tightest bucket, no auth.
  let auth_routes = Router::new()
    .route( "/v1/users/login", post( routes::auth::login ) )
    .route( "/v1/users/register", post( routes::auth::register ) )
    .route_layer( from_fn_with_state( state.clone(), rate_limit::auth_strict ) );

  // Payment capture: authenticated bucket plus the idempotency layer.
  // Layers added later run earlier, so the rate limit is added last.
  let pay_routes = Router::new()
    .route( "/v1/accounting/invoices/:id/pay", post( routes::accounting::pay_invoice ) )
    .route_layer( from_fn_with_state( state.clone(), idempotency::idempotency_middleware ) )
    .route_layer( from_fn_with_state( state.clone(), rate_limit::authenticated_api ) );

  // Everything else behind a bearer token.
  let authenticated_routes = Router::new()
    .route(
      "/v1/vehicles",
      get( routes::vehicles::list_vehicles ).post( routes::vehicles::create_vehicle ),
    )
    .route(
      "/v1/vehicles/:id",
      get( routes::vehicles::get_vehicle )
        .patch( routes::vehicles::patch_vehicle )
        .delete( routes::vehicles::retire_vehicle ),
    )
    .route( "/v1/vehicles/:id/state", patch( routes::vehicles::set_vehicle_state ) )
    .route( "/v1/vehicles/:id/odometer", post( routes::vehicles::record_odometer ) )
    .route(
      "/v1/rentals",
      get( routes::rentals::list_rentals ).post( routes::rentals::create_rental ),
    )
    .route( "/v1/rentals/:id", get( routes::rentals::get_rental ) )
    .route( "/v1/rentals/:id/activate", post( routes::rentals::activate_rental ) )
    .route( "/v1/rentals/:id/complete", post( routes::rentals::complete_rental ) )
    .route( "/v1/rentals/:id/cancel", post( routes::rentals::cancel_rental ) )
    .route(
      "/v1/customers",
      get( routes::customers::list_customers ).post( routes::customers::create_customer ),
    )
    .route( "/v1/customers/:id", get( routes::customers::get_customer ) )
    .route(
      "/v1/maintenance",
      get( routes::maintenance::list_jobs ).post( routes::maintenance::schedule_job ),
    )
    .route( "/v1/maintenance/:id", get( routes::maintenance::get_job ) )
    .route( "/v1/maintenance/:id/start", post( routes::maintenance::start_job ) )
    .route( "/v1/maintenance/:id/complete", post( routes::maintenance::complete_job ) )
    .route( "/v1/maintenance/:id/cancel", post( routes::maintenance::cancel_job ) )
    .route(
      "/v1/accounting/invoices",
      get( routes::accounting::list_invoices ).post( routes::accounting::issue_invoice ),
    )
    .route( "/v1/accounting/invoices/:id", get( routes::accounting::get_invoice ) )
    .route( "/v1/accounting/accounts/:code/balance", get( routes::accounting::account_balance ) )
    .route( "/v1/reports/revenue", get( routes::reports::revenue ) )
    .route( "/v1/reports/balance-sheet", get( routes::reports::balance_sheet_report ) )
    .route( "/v1/reconciliation/invoices", get( routes::reports::reconciliation_invoices ) )
    .route( "/v1/reconciliation/integrity", get( routes::reports::reconciliation_integrity ) )
    .route_layer( from_fn_with_state( state.clone(), rate_limit::authenticated_api ) );

  // Open surface.
  let public_routes = Router::new()
    .route( "/health", get( routes::health::health ) )
    .route( "/", get( routes::health::root ) )
    .route_layer( from_fn_with_state( state.clone(), rate_limit::public_api ) );

  Router::new()
    .merge( auth_routes )
    .merge( pay_routes )
    .merge( authenticated_routes )
    .merge( public_routes )
    .fallback( not_found )
    .layer( axum::middleware::from_fn( request_id::request_id_middleware ) )
    .layer( TraceLayer::new_for_http() )
    .layer( CorsLayer::permissive() )
    .with_state( state )
}
