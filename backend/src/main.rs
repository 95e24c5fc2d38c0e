use backend::{app, AppState, Config};
use santa_core::Roster;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("backend=info")),
        )
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let config = Config::from_env();
    let roster_text = tokio::fs::read_to_string(&config.roster_path)
        .await
        .expect("read roster file");
    let roster: Roster = serde_json::from_str(&roster_text).expect("parse roster file");

    let addr = format!("0.0.0.0:{}", config.port);
    let state = AppState::load(config, roster).await;
    tracing::info!("starting server on {addr}");
    axum::serve(
        tokio::net::TcpListener::bind(&addr).await.expect("bind"),
        app(state),
    )
    .await
    .expect("server error");
}
