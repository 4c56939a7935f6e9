use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use office_relay::gmail::{GmailClient, GoogleTokenSource};
use office_relay::relay::Relay;
use office_relay::supabase::SupabaseClient;
use office_relay::{config, http, realtime};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Override the HTTP listen port (defaults to $PORT, then 8080)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let mut cfg = config::load().context("invalid configuration")?;
    if let Some(port) = args.port {
        cfg.port = port;
    }
    info!(supabase_url = %cfg.supabase_url, "configuration loaded");
    info!(
        credentials = %cfg.google_credentials_path,
        impersonating = %cfg.impersonate_user,
        "using Google service-account credentials"
    );

    let store = Arc::new(SupabaseClient::new(
        &cfg.supabase_url,
        cfg.supabase_service_role_key.clone(),
    )?);
    let tokens = GoogleTokenSource::delegated(&cfg.google_credentials_path, &cfg.impersonate_user)
        .await
        .context("failed to set up Gmail delegation")?;
    let mailer = Arc::new(GmailClient::new(Arc::new(tokens)));

    let relay = Arc::new(Relay::new(store, mailer));

    // Realtime ingress runs beside the HTTP server; a dropped
    // subscription is logged but does not take the process down.
    let realtime_relay = relay.clone();
    let supabase_url = cfg.supabase_url.clone();
    let service_role_key = cfg.supabase_service_role_key.clone();
    tokio::spawn(async move {
        if let Err(err) = realtime::run(&supabase_url, &service_role_key, realtime_relay).await {
            error!(?err, "realtime subscription terminated");
        }
    });

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "notification relay listening");
    axum::serve(listener, http::router(relay))
        .await
        .context("http server error")?;

    Ok(())
}
