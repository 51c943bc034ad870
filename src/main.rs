use std::process::ExitCode;
use std::sync::Arc;

use hushword::{
    api,
    config::{Config, GatewayBackend, StoreBackend},
    credential::CredentialIssuer,
    error::GameResult,
    gateway::HttpGateway,
    state::AppState,
    store::{MemoryRoomStore, PostgresRoomStore, RoomRepository, RoomStore},
    sweep,
    words::Vocabulary,
};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hushword=debug,tower_http=debug".into());

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn build_state(config: &Config) -> GameResult<AppState> {
    let store: Arc<dyn RoomStore> = match &config.store {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory room store (single instance only)");
            Arc::new(MemoryRoomStore::new())
        }
        StoreBackend::Postgres { database_url } => {
            tracing::info!("Using Postgres room store");
            Arc::new(PostgresRoomStore::connect(database_url).await?)
        }
    };
    let repo = RoomRepository::new(store, config.room_ttl);

    let vocabulary = match &config.words_file {
        Some(path) => {
            let vocabulary = Vocabulary::from_file(path)?;
            tracing::info!("Loaded {} words from {}", vocabulary.len(), path.display());
            vocabulary
        }
        None => Vocabulary::builtin()?,
    };

    let credentials = match &config.credential_secret {
        Some(secret) => CredentialIssuer::new(secret.as_bytes(), config.credential_ttl)?,
        None => {
            tracing::warn!(
                "CREDENTIAL_SECRET not set, using a random secret. Credentials will not survive a restart or work across instances."
            );
            CredentialIssuer::ephemeral(config.credential_ttl)?
        }
    };

    Ok(match &config.gateway {
        GatewayBackend::Local => AppState::with_local_gateway(repo, vocabulary, credentials),
        GatewayBackend::Http { url, api_key } => {
            tracing::info!("Publishing events to {}", url);
            let gateway = HttpGateway::new(url.clone(), api_key.clone())?;
            AppState::new(repo, vocabulary, Arc::new(gateway), credentials)
        }
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    init_tracing();
    tracing::info!("Starting hushword...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let state = match build_state(&config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    sweep::spawn_room_sweeper(state.clone(), config.sweep_interval);

    let app = api::router(state);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
