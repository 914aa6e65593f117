//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use tracing_subscriber::{EnvFilter, fmt};

#[expect(clippy::print_stderr, reason = "terminal error line for the user")]
fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = feedstore_cli::run() {
        eprintln!("feedstore: {err}");
        std::process::exit(1);
    }
}
