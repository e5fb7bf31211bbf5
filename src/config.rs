use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

/// Upload a CSV, pick a column, get summary statistics and a histogram.
#[derive(Parser, Debug, Clone)]
#[command(name = "csv-lens")]
#[command(version, about)]
pub struct Config {
    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind to
    #[arg(long, default_value = "5000")]
    pub port: u16,

    /// Directory uploaded CSV files are stored in
    #[arg(long, default_value = "uploads")]
    pub upload_dir: PathBuf,

    /// Directory served under /static; charts go to its plots/ subdirectory
    #[arg(long, default_value = "static")]
    pub static_dir: PathBuf,

    /// File that error-level log records are appended to
    #[arg(long, default_value = "error.log")]
    pub error_log: PathBuf,

    /// Maximum file upload size in megabytes
    #[arg(long, default_value = "50")]
    pub upload_limit_mb: usize,

    /// Development mode: debug logging and error details in 500 responses
    #[arg(long)]
    pub debug: bool,
}

impl Config {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn upload_limit_bytes(&self) -> usize {
        self.upload_limit_mb * 1024 * 1024
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
