use anyhow::Context;

mod app;
mod auth;
mod config;
mod error;
mod gallery;
mod maintenance;
mod rate_limit;
mod state;
mod storage;
mod upload;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "imagencali=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = state::AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&state.db)
        .await
        .context("run database migrations")?;

    auth::service::ensure_admin(&state)
        .await
        .context("seed admin user")?;

    let limiters = app::Limiters::from_config(&state.config);
    maintenance::spawn(state.clone(), limiters.clone());

    let app = app::build_app(state.clone(), limiters);
    app::serve(app, &state.config).await
}
