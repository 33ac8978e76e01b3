use std::net::SocketAddr;
use std::sync::Arc;

use amon::account::HttpAccountService;
use amon::config::MasterConfig;
use amon::directory::LdapDirectory;
use amon::mapi::HttpMachineInfoApi;
use amon::master::{routes, AppState};
use amon::plugins::NotificationRegistry;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Structured logging, controllable via RUST_LOG.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "amon=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Config from env (dotenvy-loaded inside MasterConfig::from_env).
    let config = MasterConfig::from_env();

    // 3. External collaborators (spec §4.A/§4.C): one real adapter per
    // dependency, matching the shape `AppState` expects.
    let directory = Arc::new(LdapDirectory::new(
        config.ufds.url.clone(),
        config.ufds.root_dn.clone(),
        config.ufds.password.clone(),
    ));
    let mapi = Arc::new(HttpMachineInfoApi::new(config.mapi.url.clone()));
    let accounts = Arc::new(HttpAccountService::new(config.accounts.url.clone()));

    // 4. Typed plugin registries (spec §9): the probe types a deployment
    // knows how to validate/host, and the notification media it can
    // deliver through. The real conformer lives with the agent since it's
    // the agent that runs probes, but Master validates the same configs at
    // PUT time so both tiers must share one registry.
    let probe_types = Arc::new(amon::agent::probes::registry());
    let mut notifications = NotificationRegistry::new();
    notifications.register("log", Arc::new(amon::plugins::notification::LogNotificationPlugin::new()));
    let notifications = Arc::new(notifications);

    let state = Arc::new(AppState::new(&config, directory, mapi, accounts, probe_types, notifications));

    let app = routes::router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    tracing::info!(%addr, "amon-master listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
