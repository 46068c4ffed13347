//! Fleet management API server.
//!
//! Startup sequence: configuration → tracing → pool → migrations → seed
//! → optional cache → router → serve. Migrations and seed data are fully
//! applied before the listener binds, so a half-migrated database never
//! serves traffic. Shutdown is graceful on SIGINT/SIGTERM: in-flight
//! requests drain and their transactions commit or roll back cleanly.

use std::net::SocketAddr;

use anyhow::Context;
use tracing::{ info, warn };
use tracing_subscriber::EnvFilter;

use fleet_api::housekeeping::spawn_purge_task;
use fleet_api::jwt_auth::JwtVerifier;
use fleet_api::state::AppState;
use fleet_config::AppConfig;

#[ tokio::main ]
async fn main() -> anyhow::Result< () >
{
  let config = AppConfig::from_env().context( "configuration" )?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_new( &config.log_level ).unwrap_or_else( |_| EnvFilter::new( "info" ) ),
    )
    .init();

  let pool = fleet_store::connect_pool( &config.database_url, config.database_pool_size )
    .await
    .context( "database connection" )?;

  fleet_store::migrations::apply_all_migrations( &pool )
    .await
    .context( "migrations" )?;

  let bootstrap_admin = config
    .bootstrap_admin_email
    .as_deref()
    .zip( config.bootstrap_admin_password.as_deref() );
  fleet_store::seed::seed_all( &pool, bootstrap_admin )
    .await
    .context( "seed data" )?;

  let cache = match &config.redis_url
  {
    Some( url ) => match fleet_cache::FleetCache::connect( url ).await
    {
      Ok( cache ) =>
      {
        info!( "cache connected" );
        Some( cache )
      }
      Err( e ) =>
      {
        // The cache is soft state; boot without it rather than failing.
        warn!( error = %e, "cache unavailable, continuing without it" );
        None
      }
    },
    None => None,
  };

  let jwt = JwtVerifier::new(
    &config.jwt_secret,
    config.jwt_issuer.clone(),
    config.jwt_audience.clone(),
    config.jwt_expiry_secs,
  );

  let state = AppState::new( pool.clone(), cache.clone(), jwt, config.idempotency_ttl_minutes );
  let app = fleet_api::build_router( state );

  let _housekeeping = spawn_purge_task( pool, cache );

  let addr = SocketAddr::from( ( [ 0, 0, 0, 0 ], config.port ) );
  let listener = tokio::net::TcpListener::bind( addr ).await.context( "bind" )?;
  info!( %addr, "fleet backend listening" );

  axum::serve( listener, app.into_make_service_with_connect_info::< SocketAddr >() )
    .with_graceful_shutdown( shutdown_signal() )
    .await
    .context( "server" )?;

  info!( "shutdown complete" );
  Ok( () )
}

async fn shutdown_signal()
{
  let ctrl_c = async
  {
    tokio::signal::ctrl_c().await.ok();
  };

  #[ cfg( unix ) ]
  let terminate = async
  {
    match tokio::signal::unix::signal( tokio::signal::unix::SignalKind::terminate() )
    {
      Ok( mut signal ) =>
      {
        signal.recv().await;
      }
      Err( _ ) => core::future::pending().await,
    }
  };

  #[ cfg( not( unix ) ) ]
  let terminate = core::future::pending::< () >();

  tokio::select!
  {
    () = ctrl_c => {},
    () = terminate => {},
  }
}
