//! Binary entry point: loads YAML configuration, wires the global
//! runtime state and starts the actix-web server. Grounded in
//! `examples/original_source/cmd/ordinator.go`.
use std::time::Duration;

use gateway_core::actix_web::{App, HttpServer};
use gateway_core::cache::{IdentityCache, SessionCache};
use gateway_core::config::GatewayConfig;
use gateway_core::logger::LoggerBuilder;
use gateway_core::memorydb::default::DefaultBackend;
use gateway_core::state::{GlobalState, StopHandle};
use gateway_core::tracing::Level;
use gateway_core::{request, router, security};

fn log_level(level: gateway_core::config::LogLevel) -> Level {
    match level {
        gateway_core::config::LogLevel::Trace => Level::TRACE,
        gateway_core::config::LogLevel::Debug => Level::DEBUG,
        gateway_core::config::LogLevel::Info => Level::INFO,
        gateway_core::config::LogLevel::Warn => Level::WARN,
    }
}

#[gateway_core::main]
async fn main() -> gateway_core::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".into());
    let config = GatewayConfig::load(&config_path)?;

    let (logger, _guard) = LoggerBuilder::new()
        .level(log_level(config.log_level))
        .start();

    let backend = DefaultBackend::new(None);
    let (ttl_hours, sweep_hours) = config
        .cache_adapters
        .first()
        .map(|a| (a.evict_time_hours, a.evict_schedule_time_hours))
        .unwrap_or_else(|| {
            gateway_core::tracing::warn!("no cache-adapters configured, using 24h/1h defaults");
            (24, 1)
        });

    let sweep_backend = backend.clone();
    let sweep_interval = Duration::from_secs(u64::from(sweep_hours).max(1) * 3600);
    gateway_core::tokio::spawn(async move {
        let mut interval = gateway_core::tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_backend.sweep();
        }
    });

    let state = GlobalState {
        sessions: SessionCache::new(backend.clone(), ttl_hours),
        identities: IdentityCache::new(backend, ttl_hours),
        logger,
        stop_handle: StopHandle::default(),
    }
    .build();

    let port = config.port;
    let http_client = reqwest::Client::new();
    let routers = router::build(config, state.clone(), http_client);

    gateway_core::tracing::info!(port, "gateway starting");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(request::Middleware::new())
            .wrap(security::SecurityHeader::default().build())
            .configure(routers.clone())
    })
    .bind(("0.0.0.0", port))?
    .run();

    state.stop_handle.start(server).await
}
