use clap::Parser;

/// Entry point for the OOM exporter.
///
/// Follows the kernel log for OOM killer reports, attributes them to Docker containers
/// and keeps a per-container `oom_totals` counter file up to date for the node exporter
/// textfile collector.
///
/// # Errors
///
/// Returns an error, and thereby a non-zero exit status, if the configuration is
/// invalid or a fatal error occurs (unreadable input, unreachable Docker daemon,
/// unwritable metrics file). Restarting is left to the supervisor.
///
/// # Examples
///
/// ```bash
/// RUST_LOG=info cargo run -- --input /var/log/kern.log --output /tmp/oom.prom
/// ```
#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = oom_exporter::config::Args::parse();
    let config = oom_exporter::config::Config::try_from(args)?;
    oom_exporter::run(config).await?;
    Ok(())
}
