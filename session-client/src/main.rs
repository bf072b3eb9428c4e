use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use common_observability::SessionMetrics;
use reqwest::Client;
use serde_json::json;
use session_client::{select_route, CognitoProvider, SessionConfig, SessionController};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = SessionConfig::from_env()?;
    let idp = config
        .idp
        .clone()
        .context("SESSION_IDP_ENDPOINT must be set for session-probe")?;

    let http_client = Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let provider = Arc::new(
        CognitoProvider::from_config(http_client, &idp).with_refresh_margin(config.token_skew),
    );
    if let Ok(refresh_token) = env::var("SESSION_PROBE_REFRESH_TOKEN") {
        provider.restore(refresh_token).await;
    }

    let metrics = SessionMetrics::new().context("Failed to register session metrics")?;
    let controller = SessionController::from_config(provider.clone(), &config, metrics)?;

    let state = match (
        env::var("SESSION_PROBE_USERNAME"),
        env::var("SESSION_PROBE_PASSWORD"),
    ) {
        (Ok(username), Ok(password)) => controller
            .sign_in(&username, &password)
            .await
            .context("Sign-in failed")?,
        _ => controller.check_auth_status().await,
    };

    let route = select_route(&state);
    let report = json!({
        "session": state,
        "route": route,
        "path": route.path(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    println!("{}", controller.metrics().render()?);

    Ok(())
}
