//! Command-line configuration.
//!
//! Three subcommands, each backed by a clap-derived config struct:
//!
//! - `compress` - compress, verify and retain a file or folder
//! - `verify` - run the five checks on an original/compressed pair
//! - `serve` - start the local web GUI
//!
//! # Environment Variables
//!
//! Options can also be set via environment variables with the
//! `TIFF_SQUEEZE_` prefix:
//!
//! - `TIFF_SQUEEZE_METHOD` - Compression method (default: zip)
//! - `TIFF_SQUEEZE_RETENTION` - Retention policy (default: delete)
//! - `TIFF_SQUEEZE_BACKUP_DIR` - Backup folder for `backup` retention
//! - `TIFF_SQUEEZE_HOST` - GUI bind address (default: 127.0.0.1)
//! - `TIFF_SQUEEZE_PORT` - GUI port (default: 8640)
//! - `TIFF_SQUEEZE_START_DIR` - Folder the GUI picker opens in
//! - `TIFF_SQUEEZE_CORS_ORIGINS` - Allowed CORS origins (comma-separated)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::batch::Retention;
use crate::compress::CompressionMethod;

// =============================================================================
// Default Values
// =============================================================================

/// Default GUI host. Local only.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default GUI port.
pub const DEFAULT_PORT: u16 = 8640;

/// Default compression method.
pub const DEFAULT_METHOD: &str = "zip";

/// Default retention policy.
pub const DEFAULT_RETENTION: &str = "delete";

/// Default log filter, overridden by `RUST_LOG`.
pub const DEFAULT_LOG_FILTER: &str = "tiff_squeeze=info,tower_http=info";

/// Log filter used with `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "tiff_squeeze=debug,tower_http=debug";

// =============================================================================
// CLI Arguments
// =============================================================================

/// TIFF Squeeze - lossless TIFF compression with pixel-exact verification.
#[derive(Parser, Debug, Clone)]
#[command(name = "tiff-squeeze")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compress a TIFF file or every TIFF below a folder, verify each result
    /// and keep either the original or the compressed file.
    Compress(CompressConfig),

    /// Verify that a compressed TIFF holds exactly the original pixels.
    Verify(VerifyConfig),

    /// Start the local web GUI.
    Serve(ServeConfig),
}

impl Command {
    pub fn verbose(&self) -> bool {
        match self {
            Command::Compress(c) => c.verbose,
            Command::Verify(c) => c.verbose,
            Command::Serve(c) => c.verbose,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Command::Compress(c) => c.validate(),
            Command::Verify(c) => c.validate(),
            Command::Serve(c) => c.validate(),
        }
    }
}

/// What happens to the file that is not kept.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionMode {
    /// Remove it permanently
    Delete,
    /// Move it into --backup-dir
    Backup,
    /// Leave both files in place (dry run)
    KeepBoth,
}

impl RetentionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RetentionMode::Delete => "delete",
            RetentionMode::Backup => "backup",
            RetentionMode::KeepBoth => "keep-both",
        }
    }
}

fn parse_method(s: &str) -> Result<CompressionMethod, String> {
    s.parse().map_err(|e: crate::error::CompressError| e.to_string())
}

#[derive(Args, Debug, Clone)]
pub struct CompressConfig {
    /// TIFF file or folder to compress.
    pub path: PathBuf,

    /// Compression method: zip, lzw or packbits.
    #[arg(short, long, default_value = DEFAULT_METHOD, env = "TIFF_SQUEEZE_METHOD", value_parser = parse_method)]
    pub method: CompressionMethod,

    /// What to do with the file that is not kept.
    #[arg(long, value_enum, default_value = DEFAULT_RETENTION, env = "TIFF_SQUEEZE_RETENTION")]
    pub retention: RetentionMode,

    /// Folder that receives discarded files with `--retention backup`.
    #[arg(long, env = "TIFF_SQUEEZE_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CompressConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.retention_policy().map(|_| ())
    }

    /// The retention policy built from `--retention` and `--backup-dir`.
    pub fn retention_policy(&self) -> Result<Retention, String> {
        Retention::from_parts(self.retention.as_str(), self.backup_dir.clone())
            .map_err(|e| format!("{e} (see --retention and --backup-dir)"))
    }
}

#[derive(Args, Debug, Clone)]
pub struct VerifyConfig {
    /// The original TIFF.
    pub original: PathBuf,

    /// The compressed TIFF.
    pub compressed: PathBuf,

    /// Write the verification plot for `--frame` to this PNG file.
    #[arg(long)]
    pub diff_map: Option<PathBuf>,

    /// Frame rendered into the plot (0-based).
    #[arg(long, default_value_t = 0)]
    pub frame: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl VerifyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.original == self.compressed {
            return Err("original and compressed must be different files".to_string());
        }
        if let Some(out) = &self.diff_map {
            let is_png = out
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            if !is_png {
                return Err(format!("--diff-map must be a .png file, got {}", out.display()));
            }
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TIFF_SQUEEZE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TIFF_SQUEEZE_PORT")]
    pub port: u16,

    /// Folder the path picker opens in (default: current directory).
    #[arg(long, env = "TIFF_SQUEEZE_START_DIR")]
    pub start_dir: Option<PathBuf>,

    /// Allowed CORS origins (comma-separated, `*` for any).
    ///
    /// If not specified, only same-origin requests are allowed.
    #[arg(long, env = "TIFF_SQUEEZE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ServeConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("port must be greater than 0".to_string());
        }
        if self.host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }
        if let Some(dir) = &self.start_dir {
            if !dir.is_dir() {
                return Err(format!("start directory {} does not exist", dir.display()));
            }
        }
        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Tests
// =============================================================================
