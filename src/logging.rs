use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Sends diagnostics to stderr when `verbose` is set; otherwise stays
/// silent so stdout carries only the report.
pub fn init(verbose: bool) -> Result<()> {
    if !verbose {
        return Ok(());
    }
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .with_level(true)
        .try_init();
    Ok(())
}
