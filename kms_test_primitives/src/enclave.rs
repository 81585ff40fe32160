//! Stand in for a node with a KMS enclave behind it.

use std::sync::{Arc, Mutex};

use base64::{
	engine::general_purpose::{STANDARD, URL_SAFE},
	Engine,
};
use kms_crypto::{DerivedKey, IdentityKeyPair, QuerySession, KEY_LEN, NONCE_LEN};
use mockito::{Matcher, Mock, Server, ServerGuard};

use crate::StubResponse;

const TX_KEY_PATH: &str = "/registration/v1beta1/tx-key";
const CODE_HASH_PATH: &str = "/compute/v1beta1/code_hash/by_contract_address/";
const QUERY_PATH: &str = "/compute/v1beta1/query/";

/// How a [`FakeEnclave`] answers a query it could open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
	/// `{"data": ...}` carrying this JSON object.
	Data(serde_json::Value),
	/// `{"data": ...}` carrying `{"echo": <query json>}`.
	Echo,
	/// An error status with this text sealed into the message.
	Message(String),
}

/// Answers the node endpoints a query touches, sealing replies the way the
/// enclave does.
#[derive(Debug)]
pub struct FakeEnclave {
	identity: IdentityKeyPair,
	code_hash: String,
	reply: Reply,
}

impl FakeEnclave {
	/// An enclave with a fresh key pair.
	#[must_use]
	pub fn new(code_hash: &str, reply: Reply) -> Self {
		Self {
			identity: IdentityKeyPair::generate(),
			code_hash: code_hash.to_string(),
			reply,
		}
	}

	/// The enclave's consensus IO public key.
	#[must_use]
	pub fn public_key(&self) -> [u8; KEY_LEN] {
		self.identity.public_bytes()
	}

	/// Answer a request for `target`, which may be a full URL or just the
	/// path and query.
	#[must_use]
	pub fn answer(&self, target: &str) -> StubResponse {
		if target.ends_with(TX_KEY_PATH) {
			let key = STANDARD.encode(self.public_key());
			return StubResponse::ok(format!(r#"{{"key":"{key}"}}"#));
		}
		if target.contains(CODE_HASH_PATH) {
			return StubResponse::ok(format!(
				r#"{{"code_hash":"{}"}}"#,
				self.code_hash
			));
		}
		if target.contains(QUERY_PATH) {
			return self.answer_query(target);
		}

		StubResponse::status(404, r#"{"code":5,"message":"Not Implemented"}"#)
	}

	/// Recover the derived key and plaintext from a wire payload.
	#[must_use]
	pub fn open_query(&self, payload: &[u8]) -> Option<(DerivedKey, Vec<u8>)> {
		if payload.len() < NONCE_LEN + KEY_LEN {
			return None;
		}
		let (nonce, rest) = payload.split_at(NONCE_LEN);
		let (client_public, ciphertext) = rest.split_at(KEY_LEN);

		let key = QuerySession::with_nonce(&self.identity, nonce.try_into().ok()?)
			.derive_key(&client_public.try_into().ok()?)
			.ok()?;
		let plaintext = key.open(ciphertext).ok()?;

		Some((key, plaintext))
	}

	// Status a well formed query is answered with.
	fn query_status(&self) -> u16 {
		match self.reply {
			Reply::Message(_) => 500,
			Reply::Data(_) | Reply::Echo => 200,
		}
	}

	fn answer_query(&self, target: &str) -> StubResponse {
		let opened = target
			.split_once("?query=")
			.and_then(|(_, encoded)| URL_SAFE.decode(encoded).ok())
			.and_then(|payload| self.open_query(&payload));
		let Some((key, plaintext)) = opened else {
			return StubResponse::status(
				400,
				r#"{"code":3,"message":"failed to decrypt query"}"#,
			);
		};
		let Some(query) = plaintext.strip_prefix(self.code_hash.as_bytes())
		else {
			return StubResponse::status(
				400,
				r#"{"code":3,"message":"code hash mismatch"}"#,
			);
		};

		match &self.reply {
			Reply::Data(value) => data_response(&key, value),
			Reply::Echo => {
				let query: serde_json::Value =
					serde_json::from_slice(query).unwrap_or_default();
				data_response(&key, &serde_json::json!({ "echo": query }))
			}
			Reply::Message(text) => {
				let sealed = seal_b64(&key, text.as_bytes());
				let body = serde_json::json!({
					"code": 2,
					"message": format!(
						"query contract failed: encrypted: {sealed}: contract error"
					),
				});
				StubResponse::status(500, body.to_string())
			}
		}
	}
}

/// A [`FakeEnclave`] served over HTTP by a [`mockito`] server, one mock per
/// node route.
///
/// Each route has a fixed status, so a query the enclave cannot open is
/// still answered with the status of a good one; only the body differs.
pub struct EnclaveNode {
	server: ServerGuard,
	requests: Arc<Mutex<Vec<String>>>,
	_mocks: Vec<Mock>,
}

impl EnclaveNode {
	/// Start a server answering for `enclave`.
	#[must_use]
	pub fn spawn(enclave: FakeEnclave) -> Self {
		let mut server = Server::new();
		let requests = Arc::new(Mutex::new(Vec::new()));
		let query_status = enclave.query_status();
		let enclave = Arc::new(enclave);

		let mocks = [
			(TX_KEY_PATH, 200),
			(CODE_HASH_PATH, 200),
			(QUERY_PATH, query_status),
		]
		.into_iter()
		.map(|(path, status)| {
			let enclave = Arc::clone(&enclave);
			let requests = Arc::clone(&requests);
			server
				.mock("GET", Matcher::Regex(format!("^{path}")))
				.with_status(usize::from(status))
				.with_header("content-type", "application/json")
				.with_body_from_request(move |request| {
					let target = request.path_and_query().to_string();
					let body = enclave.answer(&target).body;
					if let Ok(mut requests) = requests.lock() {
						requests.push(target);
					}
					body.into_bytes()
				})
				.create()
		})
		.collect();

		Self { server, requests, _mocks: mocks }
	}

	/// Base URL of the node, e.g. `http://127.0.0.1:12345`.
	#[must_use]
	pub fn url(&self) -> String {
		self.server.url()
	}

	/// Paths (with query) requested so far, in order.
	///
	/// # Panics
	///
	/// Panics if a mock panicked while holding the lock.
	#[must_use]
	pub fn requests(&self) -> Vec<String> {
		self.requests.lock().expect("request log poisoned").clone()
	}
}

fn data_response(key: &DerivedKey, value: &serde_json::Value) -> StubResponse {
	let inner = STANDARD.encode(value.to_string());
	let data = seal_b64(key, inner.as_bytes());
	StubResponse::ok(format!(r#"{{"data":"{data}"}}"#))
}

fn seal_b64(key: &DerivedKey, plaintext: &[u8]) -> String {
	// Sealing only fails on a malformed key, which a derived key never is.
	STANDARD.encode(key.seal(plaintext).unwrap_or_default())
}
