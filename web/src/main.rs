use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use config::ImageStorage;
use session::AppSessionStore;
use state::{AppState, SharedState};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{debug, info};
use tracing_subscriber::filter::EnvFilter;

pub use config::EnvConfig;

mod api;
mod auth;
mod chat;
mod config;
mod error;
mod gcs;
mod geocode;
mod images;
mod oauth;
mod session;
mod state;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Configuration file with one section per environment
    #[arg(short, long, default_value = "pupiweb.yaml")]
    pub config: PathBuf,
    /// The environment section of the configuration file to use
    #[arg(short, long, default_value = "dev")]
    pub env: String,
}

fn load_config(args: &Cli) -> Result<EnvConfig> {
    let mut config = if args.config.exists() {
        debug!(file = ?args.config, env = %args.env, "Loading configuration");
        let yaml = std::fs::read_to_string(&args.config)
            .with_context(|| format!("Unable to read configuration file {:?}", args.config))?;
        EnvConfig::from_yaml(&yaml, &args.env)?
    } else {
        info!(
            "Configuration file {:?} not found, using defaults and environment variables",
            args.config
        );
        EnvConfig::default()
    };
    config.init()?;
    Ok(config)
}

/// All routes of the application, without session handling
fn routes(state: &AppState) -> Router<AppState> {
    let mut router = Router::new()
        .nest("/api", api::router())
        .nest("/auth", oauth::router());
    if let Some(ImageStorage::Local(ref dir)) = state.config.image_storage {
        router = router.nest_service(images::LOCAL_URL_PREFIX, ServeDir::new(dir));
    }
    if let Some(ref dir) = state.config.static_dir {
        let index = PathBuf::from(dir).join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }
    router
}

/// Attach the session and tracing layers and the shared state to `routes`
fn app(routes: Router<AppState>, state: AppState, sessions: AppSessionStore) -> Router {
    let secure = state.config.public_base_url.starts_with("https://");
    routes
        .layer(session::layer(sessions, secure))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Unable to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Unable to listen for SIGTERM: {e}");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("PUPIWEB_LOG"))
        .init();
    let args = Cli::parse();
    let config = load_config(&args)?;
    let addr: SocketAddr = format!("{}:{}", config.listen.host, config.listen.port)
        .parse()
        .with_context(|| "Invalid listen address")?;

    let shared_state = Arc::new(SharedState::new(config).await?);
    let sessions = AppSessionStore::for_database(&shared_state.db)
        .await
        .with_context(|| "Unable to set up session store")?;
    let expired_deletion = sessions.spawn_expired_deletion();

    let app = app(routes(&shared_state), shared_state.clone(), sessions);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Unable to listen on {addr}"))?;
    info!(
        backend = %shared_state.db.backend(),
        "Listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    if let Some(task) = expired_deletion {
        task.abort();
    }
    shared_state.db.close().await;
    Ok(())
}
