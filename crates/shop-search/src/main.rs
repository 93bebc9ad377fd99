mod config;
mod detail;
mod error;
mod extract;
mod http;
mod model;
mod prompts;
mod rate_limit;
mod server;
mod service;
#[cfg(test)]
mod testing;

use std::fs::OpenOptions;
use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use search_common::ai::AiCapability;
use search_common::gemini::{GeminiClient, GeminiClientConfig};

use config::{Config, Transport};
use rate_limit::RateLimiter;
use server::ShopSearchServer;
use service::SearchService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_path = dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(&config)?;

    info!(log_level = %config.log_level, transport = ?config.transport, "starting shop-search");
    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "loaded .env");
    }

    let gemini_config = GeminiClientConfig::from_env()?;
    info!(
        model = %gemini_config.model,
        base_url = %gemini_config.base_url,
        timeout_ms = gemini_config.default_timeout.as_millis(),
        max_retries = gemini_config.max_retries,
        "gemini client configured"
    );
    let ai: Arc<dyn AiCapability> = Arc::new(GeminiClient::new(gemini_config)?);
    let service = SearchService::new(ai, RateLimiter::default());

    match config.transport {
        Transport::Http => serve_http(&config, service).await?,
        Transport::Stdio => serve_stdio(service).await?,
    }

    info!("shop-search shut down");
    Ok(())
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let file_layer = match &config.log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_writer(Arc::new(file))
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
        .with(file_layer)
        .init();

    if let Some(path) = &config.log_file {
        info!(log_file = %path.display(), "file logging enabled");
    }
    Ok(())
}

async fn serve_http(config: &Config, service: SearchService) -> anyhow::Result<()> {
    let addr = config.bind_addr()?;
    let router = http::build_router(service, &config.static_dir);

    let listener = TcpListener::bind(addr).await?;
    info!(listen_addr = %addr, "HTTP server ready");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}

async fn serve_stdio(service: SearchService) -> anyhow::Result<()> {
    let server = ShopSearchServer::new(service);
    info!("MCP server ready, serving on stdio");
    let running = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;
    running.waiting().await?;
    Ok(())
}
