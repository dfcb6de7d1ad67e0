use std::sync::Arc;
use std::time::Duration;

use pixel_saga::app::{self, AppState};
use pixel_saga::services::gemini::GeminiClient;
use pixel_saga::session::{self, SessionStore};
use pixel_saga::{Config, Storyteller};
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Arc::new(Config::from_env());
    tracing::debug!("Loaded {:?}", config);

    // One client serves both the text and the image model
    let gemini = Arc::new(GeminiClient::new(config.clone())?);
    let storyteller = Storyteller::new(gemini.clone(), gemini);

    let sessions = Arc::new(SessionStore::with_limits(
        config.session_ttl,
        config.max_sessions,
    ));
    session::spawn_sweeper(sessions.clone(), sessions.ttl().min(Duration::from_secs(60)));

    let app = app::router(AppState {
        storyteller: Arc::new(storyteller),
        sessions,
    });

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
