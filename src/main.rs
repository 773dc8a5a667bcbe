use anyhow::{Context, Result};
use forum::api::{create_router, AppState};
use forum::auth::{random_token, CredentialHasher};
use forum::config::{load_config, ForumConfig};
use forum::content::ContentStore;
use forum::oauth::ProviderRegistry;
use forum::users::SqliteUserStore;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum=info,tower_http=info".into()),
        )
        .init();

    info!("Forum starting...");

    let mut config = match std::env::var("FORUM_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            load_config(&path)?
        }
        Err(_) => ForumConfig::default(),
    };
    config.apply_env();

    if config.security.hash_key.is_empty() {
        warn!("No hash key configured (FORUM_HASH_KEY); using an ephemeral key, sessions will not survive a restart");
        config.security.hash_key = random_token(32);
    }

    let providers = ProviderRegistry::from_config(&config);
    let enabled: Vec<&str> = providers.enabled().iter().map(|p| p.as_str()).collect();
    if enabled.is_empty() {
        warn!("No identity provider configured; sign-in is unavailable");
    } else {
        info!(providers = ?enabled, "Identity providers enabled");
    }

    let users = Arc::new(SqliteUserStore::new(&config.server.database_path)?);
    let content = Arc::new(ContentStore::new(&config.server.database_path)?);
    info!(path = %config.server.database_path, "Database opened");

    let state = AppState::new(
        users,
        content,
        CredentialHasher::new(config.security.hash_key.clone()),
        providers,
    );
    let app = create_router(state, &config.server.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "Forum listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Forum stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl_c signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
