//! Persistence for the client's identity key pair.
//!
//! The file is a JSON object with hex encoded `private` and `public` fields.

use std::{
	fs,
	io::{ErrorKind, Write},
	path::{Path, PathBuf},
};

use kms_crypto::{key_from_slice, IdentityKeyPair};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::ClientError;

const TMP_EXT: &str = "tmp";

#[derive(Serialize, Deserialize)]
struct IdentityFile {
	private: String,
	public: String,
}

/// Load the identity key pair at `path`, or create and persist a new one if
/// nothing exists there yet.
///
/// An existing file that cannot be parsed is an error; it is never silently
/// replaced.
pub fn load_or_create<P: AsRef<Path>>(
	path: P,
) -> Result<IdentityKeyPair, ClientError> {
	let path = path.as_ref();
	match fs::read(path) {
		Ok(contents) => {
			let contents = Zeroizing::new(contents);
			parse(&contents).map_err(|e| {
				ClientError::Storage(format!("{}: {e}", path.display()))
			})
		}
		Err(e) if e.kind() == ErrorKind::NotFound => {
			let pair = IdentityKeyPair::generate();
			store(path, &pair)?;
			tracing::info!(path = %path.display(), "created new identity key");
			Ok(pair)
		}
		Err(e) => Err(ClientError::Storage(format!(
			"failed to read {}: {e}",
			path.display()
		))),
	}
}

/// Write `pair` to `path` with owner only permissions. The file is written
/// next to `path` and renamed into place so readers never see a partial
/// write.
pub fn store<P: AsRef<Path>>(
	path: P,
	pair: &IdentityKeyPair,
) -> Result<(), ClientError> {
	let path = path.as_ref();
	let storage_err =
		|e: std::io::Error| ClientError::Storage(format!("{}: {e}", path.display()));

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(storage_err)?;
	}

	let file = IdentityFile {
		private: hex::encode(pair.private_bytes().as_slice()),
		public: hex::encode(pair.public_bytes()),
	};
	let serialized = Zeroizing::new(
		serde_json::to_vec(&file)
			.map_err(|e| ClientError::Storage(e.to_string()))?,
	);
	drop(Zeroizing::new(file.private));

	let tmp = tmp_path(path);
	// A stale temp file from an interrupted run would make `create_new` fail.
	drop(fs::remove_file(&tmp));
	let result = write_owner_only(&tmp, &serialized)
		.and_then(|()| fs::rename(&tmp, path));
	if result.is_err() {
		drop(fs::remove_file(&tmp));
	}

	result.map_err(storage_err)
}

fn parse(contents: &[u8]) -> Result<IdentityKeyPair, ClientError> {
	let file: IdentityFile = serde_json::from_slice(contents)
		.map_err(|e| ClientError::Storage(format!("invalid json: {e}")))?;
	let file = (Zeroizing::new(file.private), file.public);

	let private = Zeroizing::new(
		hex::decode(file.0.as_str())
			.map_err(|e| ClientError::Storage(format!("invalid private: {e}")))?,
	);
	let public = hex::decode(&file.1)
		.map_err(|e| ClientError::Storage(format!("invalid public: {e}")))?;

	let private = Zeroizing::new(
		key_from_slice(&private)
			.map_err(|e| ClientError::Storage(format!("private: {e}")))?,
	);
	let public = key_from_slice(&public)
		.map_err(|e| ClientError::Storage(format!("public: {e}")))?;

	IdentityKeyPair::from_parts(&private, public)
		.map_err(|e| ClientError::Storage(e.to_string()))
}

fn tmp_path(path: &Path) -> PathBuf {
	let mut name = path.file_name().unwrap_or_default().to_os_string();
	name.push(".");
	name.push(TMP_EXT);
	path.with_file_name(name)
}

#[cfg(unix)]
fn write_owner_only(path: &Path, buf: &[u8]) -> std::io::Result<()> {
	use std::os::unix::fs::OpenOptionsExt;

	let mut file = fs::OpenOptions::new()
		.write(true)
		.create_new(true)
		.mode(0o600)
		.open(path)?;
	file.write_all(buf)?;
	file.sync_all()
}

#[cfg(not(unix))]
fn write_owner_only(path: &Path, buf: &[u8]) -> std::io::Result<()> {
	let mut file =
		fs::OpenOptions::new().write(true).create_new(true).open(path)?;
	file.write_all(buf)?;
	file.sync_all()
}
