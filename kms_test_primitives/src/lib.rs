//! Primitive types for test setup.

use std::{
	net::TcpListener,
	ops::{Deref, Range},
	path::{Path, PathBuf},
};

use rand::prelude::*;

mod enclave;

pub use enclave::{EnclaveNode, FakeEnclave, Reply};

const SERVER_PORT_RANGE: Range<u16> = 10000..60000;
const MAX_PORT_SEARCH_ATTEMPTS: u16 = 50;

/// Wrapper type for [`std::path::PathBuf`] that attempts to remove a file or
/// directory at the path on drop.
#[derive(Debug)]
pub struct PathWrapper(PathBuf);

impl PathWrapper {
	/// A path under the system temp dir that is unique to this call. Nothing
	/// is created on disk.
	#[must_use]
	pub fn random(prefix: &str) -> Self {
		let suffix: u64 = rand::thread_rng().gen();
		Self(std::env::temp_dir().join(format!("{prefix}-{suffix:016x}")))
	}
}

impl From<&str> for PathWrapper {
	fn from(path: &str) -> Self {
		Self(PathBuf::from(path))
	}
}

impl From<PathBuf> for PathWrapper {
	fn from(path: PathBuf) -> Self {
		Self(path)
	}
}

impl Drop for PathWrapper {
	fn drop(&mut self) {
		// Try removing it both as a file and as a directory. One of these
		// will always fail
		drop(std::fs::remove_dir_all(&self.0));
		drop(std::fs::remove_file(&self.0));
	}
}

impl Deref for PathWrapper {
	type Target = Path;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl AsRef<Path> for PathWrapper {
	fn as_ref(&self) -> &Path {
		&self.0
	}
}

/// Get a TCP port on the local system that nothing is listening on.
#[must_use]
pub fn find_free_port() -> Option<u16> {
	let mut rng = rand::thread_rng();
	for _ in 0..MAX_PORT_SEARCH_ATTEMPTS {
		let port = rng.gen_range(SERVER_PORT_RANGE);
		if port_is_available(port) {
			return Some(port);
		}
	}

	None
}

/// Whether a listener can currently bind to `port` on localhost.
fn port_is_available(port: u16) -> bool {
	TcpListener::bind(("127.0.0.1", port)).is_ok()
}

/// What a node answers to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body, sent as `application/json`.
	pub body: String,
}

impl StubResponse {
	/// A `200 OK` with `body`.
	#[must_use]
	pub fn ok(body: impl Into<String>) -> Self {
		Self { status: 200, body: body.into() }
	}

	/// A reply with an arbitrary `status`.
	#[must_use]
	pub fn status(status: u16, body: impl Into<String>) -> Self {
		Self { status, body: body.into() }
	}
}
