use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use slog::{o, Drain, Logger};
use slog_async::Async;
use slog_term::{FullFormat, TermDecorator};
use std::time::Instant;

use crate::config::AppConfig;

/// Configuration for setting up the logger
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub async_buffer_size: usize,
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            async_buffer_size: 1024,
            use_color: true,
        }
    }
}

impl From<&AppConfig> for LoggerConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            use_color: !cfg.log_json,
            ..Default::default()
        }
    }
}

/// Builds the root application logger
pub fn setup_logger(config: LoggerConfig) -> Logger {
    let decorator = {
        let builder = TermDecorator::new();
        let builder = if config.use_color {
            builder.force_color()
        } else {
            builder
        };
        builder.build()
    };

    let drain = FullFormat::new(decorator).build().fuse();

    let drain = Async::new(drain)
        .chan_size(config.async_buffer_size)
        .build()
        .fuse();

    Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// Child logger tagged with the owning component
pub fn component_logger(base: &Logger, component: &'static str) -> Logger {
    base.new(o!("component" => component))
}

/// Logger that drops every record
pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Access log line per request
pub async fn logging_middleware(
    State(logger): State<Logger>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start_time = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let request_id = req
        .extensions()
        .get::<crate::tracing::RequestId>()
        .map(|id| id.to_string())
        .unwrap_or_default();

    let response = next.run(req).await;
    let status = response.status().as_u16();
    let duration_ms = start_time.elapsed().as_millis() as u64;

    slog::info!(
        logger,
        "HTTP request handled";
        "method" => method,
        "path" => path,
        "status" => status,
        "duration_ms" => duration_ms,
        "request_id" => request_id,
    );

    response
}
