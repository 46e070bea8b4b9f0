use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use user_service::config::Config;
use user_service::config::StorageBackend;
use user_service::domain::session::issuer::TokenIssuer;
use user_service::domain::session::models::SessionSettings;
use user_service::domain::session::ports::RefreshTokenStore;
use user_service::domain::session::ports::SessionServicePort;
use user_service::domain::session::service::SessionService;
use user_service::domain::user::ports::UserDirectory;
use user_service::domain::user::ports::UserServicePort;
use user_service::domain::user::service::UserService;
use user_service::inbound::http::router::create_router;
use user_service::outbound::repositories::InMemoryRefreshTokenStore;
use user_service::outbound::repositories::InMemoryUserDirectory;
use user_service::outbound::repositories::PostgresRefreshTokenStore;
use user_service::outbound::repositories::PostgresUserDirectory;

type Services = (Arc<dyn SessionServicePort>, Arc<dyn UserServicePort>);

fn build_services<UD, RS>(
    directory: Arc<UD>,
    store: Arc<RS>,
    token_issuer: Arc<TokenIssuer>,
    settings: SessionSettings,
) -> Services
where
    UD: UserDirectory,
    RS: RefreshTokenStore,
{
    let session_service: Arc<dyn SessionServicePort> = Arc::new(SessionService::new(
        Arc::clone(&directory),
        store,
        token_issuer,
        settings,
    ));
    let user_service: Arc<dyn UserServicePort> = Arc::new(UserService::new(directory));

    (session_service, user_service)
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "user-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        storage_backend = ?config.storage.backend,
        request_timeout_secs = config.server.request_timeout_secs,
        access_token_ttl_secs = config.jwt.access_token_ttl_secs,
        refresh_token_ttl_days = config.jwt.refresh_token_ttl_days,
        issue_tokens_on_register = config.session.issue_tokens_on_register,
        revoke_family_on_reuse = config.session.revoke_family_on_reuse,
        "Configuration loaded"
    );

    // Bad token settings are fatal here, never per request.
    let token_issuer = Arc::new(TokenIssuer::new(&config.token_settings()?)?);
    let session_settings = config.session_settings()?;

    let (session_service, user_service) = match config.storage.backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database
                .url
                .as_deref()
                .context("database.url is required for the postgres backend")?;

            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .connect(database_url)
                .await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            build_services(
                Arc::new(PostgresUserDirectory::new(pg_pool.clone())),
                Arc::new(PostgresRefreshTokenStore::new(pg_pool)),
                Arc::clone(&token_issuer),
                session_settings,
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, all data is lost on restart");

            build_services(
                Arc::new(InMemoryUserDirectory::new()),
                Arc::new(InMemoryRefreshTokenStore::new()),
                Arc::clone(&token_issuer),
                session_settings,
            )
        }
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(
        session_service,
        user_service,
        token_issuer,
        config.request_timeout(),
    );

    if let Err(e) = axum::serve(http_listener, http_application).await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    tracing::info!("Server exited successfully");
    Ok(())
}
