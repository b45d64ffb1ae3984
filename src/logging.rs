//! Log output for the `taglock` binary.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Level selected by the number of `-v` flags.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Directives in `RUST_LOG` are applied on top of the `-v` level.
pub fn init(verbose: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for_verbosity(verbose).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
