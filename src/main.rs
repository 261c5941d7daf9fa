use anyhow::Context;
use foodie::chat::ChatEngine;
use foodie::cli::commands::{self, report_outcome};
use foodie::cli::output::Output;
use foodie::cli::{Cli, Commands, ServeArgs};
use foodie::llm::create_client;
use foodie::rag::{RagService, watcher::watch_documents};
use foodie::session::SessionManager;
use foodie::utils::toml_config::{ConfigManager, FoodieConfig};
use foodie::{AppState, build_app};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    // The configured subscriber depends on the file, so loading logs to stderr
    let bootstrap = bootstrap_subscriber(
        log_filter(if cli.verbose { "debug" } else { "info" }),
        std::io::stderr,
    );
    let config_manager = Arc::new(
        tracing::subscriber::with_default(bootstrap, || ConfigManager::new(&cli.config))
            .with_context(|| format!("Failed to load {}", cli.config.display()))?,
    );
    let config = config_manager.config();
    init_tracing(&config, cli.verbose);

    match cli.command() {
        Commands::Serve(args) => serve(config_manager, args, &output).await,
        Commands::Index { force } => {
            let rag = RagService::from_config(&config)?;
            commands::run_index(&rag, force, &output).await?;
            Ok(())
        }
        Commands::Ask => {
            let rag = Arc::new(RagService::from_config(&config)?);
            report_outcome(&rag.initialize().await?, &output);

            let engine = ChatEngine::new(create_client(&config.ollama)?, rag);
            let sessions = SessionManager::new(config.session.timeout(), config.session.token_limit);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let summary = commands::run_ask(
                &engine,
                &sessions,
                stdin,
                config.rag.similarity_top_k,
                &output,
            )
            .await?;
            tracing::debug!(?summary, "Question loop finished");
            Ok(())
        }
        Commands::Monitor => {
            let rag = RagService::from_config(&config)?;
            commands::run_monitor(rag.monitor(), &output);
            Ok(())
        }
        Commands::Config => {
            commands::print_config(&config, &output)?;
            Ok(())
        }
    }
}

/// `RUST_LOG` when set, otherwise `level` for this crate and tower-http.
fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("foodie={level},tower_http={level}")))
}

/// Plain subscriber used while the configuration is loaded.
fn bootstrap_subscriber<W>(
    filter: EnvFilter,
    writer: W,
) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .finish()
}

fn init_tracing(config: &FoodieConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.server.log_level.as_str()
    };
    let filter = log_filter(level);

    let registry = tracing_subscriber::registry().with(filter);
    if config.server.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn serve(
    config_manager: Arc<ConfigManager>,
    args: ServeArgs,
    output: &Output,
) -> anyhow::Result<()> {
    let config = config_manager.config();
    output.banner();

    let rag = Arc::new(RagService::from_config(&config)?);
    let engine = Arc::new(ChatEngine::new(create_client(&config.ollama)?, Arc::clone(&rag)));

    // Serve immediately; /api/health reports "initializing" until the index is in place
    let startup = Arc::clone(&rag);
    tokio::spawn(async move {
        match startup.initialize().await {
            Ok(outcome) => tracing::info!(chunks = outcome.chunks(), "RAG service ready"),
            Err(e) => tracing::error!("RAG initialization failed: {}", e),
        }
    });

    let _document_watcher = if args.reload {
        config_manager.start_watching()?;
        std::fs::create_dir_all(&config.rag.data_dir).with_context(|| {
            format!("Failed to create {}", config.rag.data_dir.display())
        })?;
        Some(watch_documents(Arc::clone(&rag))?)
    } else {
        None
    };

    let state = AppState::new(Arc::clone(&config_manager), engine, args.app);
    let app = build_app(state);

    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {host}:{port}"))?;

    output.success(&format!("Serving {:?} on http://{host}:{port}", args.app));
    output.info(&format!("OpenAPI document: http://{host}:{port}/openapi.json"));
    tracing::info!(%host, port, app = ?args.app, reload = args.reload, "Server starting");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    config_manager.stop_watching();
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_config_loading_messages_are_logged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foodie.toml");
        std::fs::write(&path, "[server]\nlog_format = \"xml\"\n").unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber =
            bootstrap_subscriber(EnvFilter::new("foodie=info"), move || writer.clone());
        tracing::subscriber::with_default(subscriber, || {
            ConfigManager::new(&path).unwrap();
            ConfigManager::new(dir.path().join("missing.toml")).unwrap();
        });

        let logs = String::from_utf8(captured.0.lock().clone()).unwrap();
        assert!(logs.contains("Unknown server.log_format 'xml'"));
        assert!(logs.contains("No configuration file"));
    }
}
