use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// JSON API plus static front-end over HTTP.
    Http,
    /// MCP tools over stdio.
    Stdio,
}

/// Application configuration loaded once at startup and passed down explicitly.
///
/// Gemini settings (`GOOGLE_API_KEY`, `GEMINI_MODEL`, ...) are read separately by
/// `GeminiClientConfig::from_env`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log file path. `None` disables file logging.
    pub log_file: Option<PathBuf>,
    pub host: String,
    pub port: u16,
    /// Directory holding `index.html` and other front-end assets.
    pub static_dir: PathBuf,
    pub transport: Transport,
}

impl Config {
    /// Optional:
    /// - `LOG_LEVEL` (default: "debug")
    /// - `LOG_FILE` (default: "logs/app.log", empty disables)
    /// - `HOST` (default: "0.0.0.0"), `PORT` (default: 8000)
    /// - `STATIC_DIR` (default: "static")
    /// - `SHOP_SEARCH_TRANSPORT` ("http" or "stdio", default: "http")
    pub fn from_env() -> Result<Self, AppError> {
        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string());

        let log_file = match std::env::var("LOG_FILE") {
            Ok(path) if path.trim().is_empty() => None,
            Ok(path) => Some(PathBuf::from(path)),
            Err(_) => Some(PathBuf::from("logs/app.log")),
        };

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AppError::Config(format!("PORT must be a port number, got {raw:?}")))?,
            Err(_) => 8000,
        };

        let static_dir =
            PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()));

        let transport = match std::env::var("SHOP_SEARCH_TRANSPORT") {
            Ok(raw) => parse_transport(&raw)?,
            Err(_) => Transport::Http,
        };

        Ok(Self {
            log_level,
            log_file,
            host,
            port,
            static_dir,
            transport,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid bind address {}:{}: {e}", self.host, self.port)))
    }
}

fn parse_transport(raw: &str) -> Result<Transport, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "http" => Ok(Transport::Http),
        "stdio" | "mcp" => Ok(Transport::Stdio),
        other => Err(AppError::Config(format!(
            "SHOP_SEARCH_TRANSPORT must be \"http\" or \"stdio\", got {other:?}"
        ))),
    }
}
