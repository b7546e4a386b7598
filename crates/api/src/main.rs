use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use educafric_api::config::ServerConfig;
use educafric_api::router::build_app_router;
use educafric_api::state::AppState;
use educafric_core::TemplateCatalog;
use educafric_notify::adapters::{
    EmailAdapter, EmailConfig, InAppAdapter, PushAdapter, PushConfig, SmsAdapter, SmsConfig,
    WhatsappAdapter, WhatsappConfig,
};
use educafric_notify::store::pg::run_archiver;
use educafric_notify::{
    AdapterRegistry, AllowAll, DeliveryOrchestrator, EscalationPolicy, NotifyConfig, PgDirectory,
    PgPreferences, PgStore, PreferenceResolver,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "educafric_api=debug,educafric_notify=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let notify_config = NotifyConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = educafric_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    educafric_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    educafric_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Channel adapters ---
    // Unconfigured providers are simply absent from the registry; tasks
    // forced onto them fail permanently instead of panicking.
    let mut adapters = AdapterRegistry::new().register(Arc::new(InAppAdapter::new()));
    if let Some(sms) = SmsConfig::from_env() {
        adapters = adapters.register(Arc::new(SmsAdapter::new(sms)));
        tracing::info!("SMS adapter configured");
    }
    if let Some(whatsapp) = WhatsappConfig::from_env() {
        adapters = adapters.register(Arc::new(WhatsappAdapter::new(whatsapp)));
        tracing::info!("WhatsApp adapter configured");
    }
    if let Some(email) = EmailConfig::from_env() {
        adapters = adapters.register(Arc::new(EmailAdapter::new(email)));
        tracing::info!("Email adapter configured");
    }
    if let Some(push) = PushConfig::from_env() {
        adapters = adapters.register(Arc::new(PushAdapter::new(push)));
        tracing::info!("Push adapter configured");
    }

    // --- Orchestrator ---
    let store = PgStore::new(pool.clone());
    let resolver = PreferenceResolver::new(
        Arc::new(PgPreferences::new(pool.clone())),
        Arc::new(AllowAll),
    );
    let retention = notify_config.retention;
    let orchestrator = DeliveryOrchestrator::new(
        notify_config,
        TemplateCatalog::builtin(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(PgDirectory::new(pool.clone())),
        resolver,
        EscalationPolicy::new(),
        adapters,
    );
    tracing::info!("Delivery orchestrator started");

    // --- Retention archiver ---
    let archiver_cancel = tokio_util::sync::CancellationToken::new();
    let archiver_handle = tokio::spawn(run_archiver(
        store,
        retention,
        Duration::from_secs(3600),
        archiver_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator,
    };

    // --- Router ---
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
    tracing::info!("Server stopped accepting connections, cleaning up");

    archiver_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        archiver_handle,
    )
    .await;
    tracing::info!("Archiver stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
