use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use openpipes_api::background::session_maintenance;
use openpipes_api::config::ServerConfig;
use openpipes_api::router::build_app_router;
use openpipes_api::state::AppState;
use openpipes_core::session::SessionStore;
use openpipes_core::vault::TokenVault;
use openpipes_db::PgStore;
use openpipes_pipefy::{BulkUpdater, Catalog, GraphqlTransport, PipefyClient};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Secrets ---
    let vault = TokenVault::from_hex_key(
        &std::env::var("ENCRYPTION_KEY").expect("ENCRYPTION_KEY must be set"),
    )
    .expect("ENCRYPTION_KEY must be 64 hex characters");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = openpipes_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    openpipes_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    openpipes_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let store = Arc::new(PgStore::new(pool));

    // --- Pipefy ---
    let transport: Arc<dyn GraphqlTransport> = Arc::new(
        PipefyClient::new(
            config.pipefy.api_url.clone(),
            Duration::from_secs(config.pipefy.timeout_secs),
        )
        .expect("Failed to build Pipefy HTTP client"),
    );
    tracing::info!(api_url = %config.pipefy.api_url, "Pipefy client ready");

    // --- Sessions ---
    let sessions = SessionStore::new(
        Duration::from_secs(config.session.ttl_secs),
        config.session.max_entries,
    );

    let maintenance_cancel = CancellationToken::new();
    let maintenance_handle = tokio::spawn(session_maintenance::run(
        sessions.clone(),
        session_maintenance::DEFAULT_INTERVAL,
        maintenance_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        accounts: store.clone(),
        registry: store,
        config: Arc::new(config.clone()),
        vault: Arc::new(vault),
        sessions,
        catalog: Catalog::new(Arc::clone(&transport)),
        bulk: BulkUpdater::new(transport, config.pipefy.bulk_concurrency),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    maintenance_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), maintenance_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the default filter; `LOG_FORMAT=json` switches to
/// one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "openpipes_api=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolve once SIGINT (Ctrl-C) or, on Unix, SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = ctrl_c => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutting down");
}
