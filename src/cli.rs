use clap::Parser;

/// Recursive, caching, DNSSEC-validating DNS resolver
#[derive(Debug, Parser)]
#[command(name = "vigild", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file layered on top of environment variables
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Tracing filter directive (e.g. "info", "vigil_dns=debug"); overrides RUST_LOG
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}
