use babymonitor::{app, profiles, reminders, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "babymonitor=debug,axum=info,tower_http=info".to_string());
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

    let _session = profiles::services::watch_auth_state(app_state.clone());
    if app_state.config.reminders.enabled {
        let _advice = reminders::services::spawn_advice_reminders(
            app_state.notifier.clone(),
            app_state.config.reminders.interval(),
        );
    } else {
        tracing::info!("advice reminders disabled");
    }

    let bind = app_state.config.bind_addr();
    app::serve(app::build_app(app_state), &bind).await
}
