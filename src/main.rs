//! TIFF Squeeze - lossless TIFF compression with pixel-exact verification.
//!
//! This binary dispatches the `compress`, `verify` and `serve` subcommands.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tiff_squeeze::{
    batch::{FileManager, ProgressEvent, ProgressSink, Retention},
    config::{
        Cli, Command, CompressConfig, ServeConfig, VerifyConfig, DEFAULT_LOG_FILTER,
        VERBOSE_LOG_FILTER,
    },
    server::{create_router, AppState, RouterConfig},
    verify::{log_report, TiffVerifier},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.command.verbose());

    if let Err(e) = cli.command.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match cli.command {
        Command::Compress(config) => run_compress(config).await,
        Command::Verify(config) => run_verify(config).await,
        Command::Serve(config) => run_serve(config).await,
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Compress Command
// =============================================================================

/// Prints the result log as it is produced.
struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn emit(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::FileStarted { index, total, .. } => {
                println!("Processing file {} of {}", index, total);
            }
            ProgressEvent::Log(line) => println!("{}", line),
            _ => {}
        }
    }
}

async fn run_compress(config: CompressConfig) -> ExitCode {
    let retention = match config.retention_policy() {
        Ok(r) => r,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        path = %config.path.display(),
        method = %config.method,
        retention = retention.name(),
        "Starting compression"
    );
    if matches!(retention, Retention::Delete) {
        warn!("Discarded files are deleted permanently (use --retention backup to keep them)");
    }

    let manager = FileManager::new(config.method).with_retention(retention);
    let path = config.path.clone();
    let result =
        tokio::task::spawn_blocking(move || manager.process_path(&path, &mut ConsoleProgress))
            .await;

    match result {
        Ok(Ok(report)) => {
            println!("{}", report);
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Ok(Err(e)) => {
            error!("An error occurred: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Worker task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Verify Command
// =============================================================================

async fn run_verify(config: VerifyConfig) -> ExitCode {
    let result = tokio::task::spawn_blocking(move || verify_pair(&config)).await;

    match result {
        Ok(Ok(passed)) => {
            if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Ok(Err(e)) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Worker task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn verify_pair(config: &VerifyConfig) -> Result<bool, String> {
    let verifier = TiffVerifier::new(&config.original, &config.compressed);
    let report = verifier.verify_all().map_err(|e| e.to_string())?;
    log_report(&config.original, &report);

    for (check, ok) in report.checks() {
        println!("{} {}", if ok { "✓" } else { "✗" }, check);
    }

    if let Some(out) = &config.diff_map {
        let png = verifier
            .plot_verification(config.frame)
            .map_err(|e| e.to_string())?;
        std::fs::write(out, &png)
            .map_err(|e| format!("Failed to write {}: {}", out.display(), e))?;
        info!(output = %out.display(), frame = config.frame, "Wrote verification plot");
    }

    Ok(report.passed())
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    let start_dir = match config.start_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };

    let router = create_router(AppState::new(start_dir.clone()), build_router_config(&config));
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  TIFF Squeeze v{}", env!("CARGO_PKG_VERSION"));
    info!("  Open the GUI:  http://{}/", addr);
    info!("  Start folder:  {}", start_dir.display());
    info!("────────────────────────────────────────────────────────────────");
    info!("");
    if config.host != "127.0.0.1" && config.host != "localhost" {
        warn!("The GUI can read and delete local files; bind to 127.0.0.1 unless you trust the network");
    }

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new().with_tracing(!config.no_tracing);
    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }
    router_config
}
