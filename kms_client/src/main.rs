//! `kms_query` binary entry point.

use kms_client::cli::CLI;
use tracing_subscriber::{fmt, EnvFilter};

fn main() {
	// Logs go to stderr; stdout only ever carries the JSON result.
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new("warn"));
	fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();

	std::process::exit(CLI::execute());
}
