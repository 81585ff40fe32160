//! Sealing queries for the enclave and opening what it sends back.
//!
//! A query travels as `nonce||client_public_key||siv(code_hash||query_json)`,
//! base64url encoded into the `query` parameter of the compute endpoint.
//!
//! The node answers in one of two shapes:
//!
//! * `{"data": "<base64>"}`: the sealed contract result. Once opened it is
//!   itself base64 of the result JSON.
//! * `{"message": "... encrypted: <base64>: <rest>"}`: an enclave error. Only
//!   the first segment after the marker is sealed, and once opened it is the
//!   message text directly, with no second base64 layer.

use std::fmt;

use base64::{
	engine::general_purpose::{STANDARD, URL_SAFE},
	Engine,
};
use kms_crypto::{DerivedKey, QuerySession, KEY_LEN, NONCE_LEN};
use serde_json::{Map, Value};

use crate::{error::ClientError, msg::QueryMsg};

/// Path, relative to the node base URL, of the contract query endpoint. The
/// contract address is appended.
pub const QUERY_PATH: &str = "/compute/v1beta1/query/";

/// Marker in front of the sealed part of an enclave error message.
pub const ENCRYPTED_MARKER: &str = "encrypted: ";

const SEGMENT_SEPARATOR: &str = ": ";

/// Decrypted JSON object returned by the contract.
pub type QueryResult = Map<String, Value>;

/// Ways an enclave error message can fail to carry a sealed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormatError {
	/// The message does not contain [`ENCRYPTED_MARKER`].
	MissingMarker,
	/// Nothing follows the marker.
	EmptyCiphertext,
}

impl fmt::Display for MessageFormatError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::MissingMarker => write!(f, "no `{ENCRYPTED_MARKER}` marker"),
			Self::EmptyCiphertext => write!(f, "empty ciphertext after marker"),
		}
	}
}

/// The plaintext the enclave expects: the contract code hash immediately
/// followed by the query JSON.
pub fn build_plaintext(
	code_hash: &str,
	query: &QueryMsg,
) -> Result<Vec<u8>, ClientError> {
	let query_json = query.to_json()?;

	let mut plaintext = Vec::with_capacity(code_hash.len() + query_json.len());
	plaintext.extend_from_slice(code_hash.as_bytes());
	plaintext.extend_from_slice(query_json.as_bytes());

	Ok(plaintext)
}

/// Prefix `ciphertext` with the session nonce and the client public key.
#[must_use]
pub fn wire_payload(session: &QuerySession<'_>, ciphertext: &[u8]) -> Vec<u8> {
	let mut payload =
		Vec::with_capacity(NONCE_LEN + KEY_LEN + ciphertext.len());
	payload.extend_from_slice(session.nonce());
	payload.extend_from_slice(&session.identity().public_bytes());
	payload.extend_from_slice(ciphertext);

	payload
}

/// Seal `query` for the enclave and return the wire payload.
pub fn seal_query(
	session: &QuerySession<'_>,
	key: &DerivedKey,
	code_hash: &str,
	query: &QueryMsg,
) -> Result<Vec<u8>, ClientError> {
	let plaintext = build_plaintext(code_hash, query)?;
	let ciphertext = key.seal(&plaintext)?;

	Ok(wire_payload(session, &ciphertext))
}

/// URL of the query endpoint with `payload` base64url encoded (padded) in
/// the `query` parameter.
#[must_use]
pub fn query_url(base: &str, contract_address: &str, payload: &[u8]) -> String {
	format!(
		"{base}{QUERY_PATH}{contract_address}?query={}",
		URL_SAFE.encode(payload)
	)
}

/// Open the response body of a query sealed under `key`.
///
/// The body is parsed whatever the HTTP status was, since nodes report
/// enclave errors with an error status.
pub fn parse_response(
	body: &str,
	key: &DerivedKey,
) -> Result<QueryResult, ClientError> {
	let response: Value = serde_json::from_str(body)?;

	if let Some(data) = response.get("data").and_then(Value::as_str) {
		return open_data(data, key);
	}
	if let Some(message) = response.get("message").and_then(Value::as_str) {
		return open_message(message, key);
	}

	Err(ClientError::Protocol(
		"response data not found: no decryptable payload".to_string(),
	))
}

/// The sealed segment of an enclave error message: everything after the
/// first [`ENCRYPTED_MARKER`] up to the next `": "`, trimmed.
///
/// Anything after that separator is left alone.
pub fn encrypted_segment(message: &str) -> Result<&str, MessageFormatError> {
	let (_, rest) = message
		.split_once(ENCRYPTED_MARKER)
		.ok_or(MessageFormatError::MissingMarker)?;
	let segment = rest
		.split_once(SEGMENT_SEPARATOR)
		.map_or(rest, |(segment, _)| segment)
		.trim();

	if segment.is_empty() {
		return Err(MessageFormatError::EmptyCiphertext);
	}

	Ok(segment)
}

// base64 -> open -> base64 -> JSON object.
fn open_data(data: &str, key: &DerivedKey) -> Result<QueryResult, ClientError> {
	let ciphertext = STANDARD.decode(data).map_err(|e| {
		ClientError::Decode(format!("failed to decode data field: {e}"))
	})?;
	let opened = key.open(&ciphertext)?;
	let json = STANDARD.decode(&opened).map_err(|e| {
		ClientError::Decode(format!("failed to decode decrypted data: {e}"))
	})?;

	match serde_json::from_slice::<Value>(&json)? {
		Value::Object(map) => Ok(map),
		other => Err(ClientError::Decode(format!(
			"decrypted data is not a json object: {other}"
		))),
	}
}

fn open_message(
	message: &str,
	key: &DerivedKey,
) -> Result<QueryResult, ClientError> {
	let raw_error = || ClientError::Protocol(format!("message: {message}"));

	let segment = encrypted_segment(message).map_err(|e| {
		tracing::debug!(error = %e, "enclave message has no sealed segment");
		raw_error()
	})?;
	let ciphertext = STANDARD.decode(segment).map_err(|_| raw_error())?;
	let opened = key.open(&ciphertext).map_err(|_| raw_error())?;

	let mut result = Map::new();
	result.insert(
		"message".to_string(),
		Value::String(String::from_utf8_lossy(&opened).into_owned()),
	);

	Ok(result)
}
