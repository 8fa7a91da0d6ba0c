pub mod config;
pub mod error;
pub mod hierarchy;
pub mod http;
pub mod ingest;
pub mod interpret;
pub mod render;
pub mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{self, prelude::*, EnvFilter};

use interp::AnthropicInterpreter;

use crate::config::Config;
use crate::hierarchy::HierarchyStore;
use crate::http::AppState;
use crate::interpret::InterpretationCache;

pub async fn run(config: Config) {
    // Initialize logging; RUST_LOG overrides the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.logging.log_to_file {
        let file_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_writer(
                std::fs::File::create(&config.logging.log_file_path)
                    .expect("Failed to create log file"),
            );

        let stdout_appender = tracing_subscriber::fmt::layer()
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_appender)
            .with(stdout_appender)
            .try_init()
            .expect("Failed to initialize logging");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_file(true)
            .with_line_number(true)
            .init();
    }

    tracing::info!("Starting Prism '{}'", config.server.id);

    let storage = storage::create_storage_backend(&config.storage)
        .expect("Failed to initialize storage backend");
    let interpreter = AnthropicInterpreter::new(config.interpreter.clone())
        .expect("Failed to initialize interpretation client");

    let state = AppState {
        store: Arc::new(HierarchyStore::new()),
        cache: Arc::new(InterpretationCache::new()),
        interpreter: Arc::new(interpreter),
        storage,
        config: Arc::new(config),
    };

    let addr: SocketAddr = format!(
        "{}:{}",
        state.config.server.bind_address, state.config.server.bind_port
    )
    .parse()
    .expect("Invalid bind address or port");

    let app = http::build_router(state);

    tracing::info!("Starting HTTP server on {}", addr);

    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
        .expect("HTTP server failed");
}
