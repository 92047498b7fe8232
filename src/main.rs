use std::time::Duration;

mod app;
mod audit;
mod config;
mod error;
mod library;
mod meals;
mod nutrition;
mod photos;
mod sessions;
mod state;
mod users;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "snapmeal=debug,axum=info,tower_http=info".to_string());
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

    let app_state = AppState::init().await?;

    sqlx::migrate!("./migrations").run(&app_state.db).await?;

    // Background sweep: flips overdue sessions to EXPIRED so late replies are
    // rejected instead of committing stale meals.
    let sweep_state = app_state.clone();
    let sweep_interval = Duration::from_secs(app_state.config.sweep_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = sweep_state.sessions.expire_due().await {
                tracing::warn!(error = %e, "session expiry sweep failed");
            }
        }
    });

    let app = app::build_app(app_state);
    app::serve(app).await
}
