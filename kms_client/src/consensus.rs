//! Chain state a query needs before it can be sealed: the enclave's consensus
//! IO public key and the code hash of the contract.
//!
//! Neither call retries; a failure fails the whole attempt against that
//! endpoint.

use base64::{engine::general_purpose::STANDARD, Engine};
use kms_crypto::{key_from_slice, KEY_LEN};
use serde::Deserialize;

use crate::{
	error::ClientError,
	request::{HttpResponse, Transport},
};

/// Path, relative to the node base URL, of the consensus IO key.
pub const TX_KEY_PATH: &str = "/registration/v1beta1/tx-key";
/// Path, relative to the node base URL, of the code hash lookup. The contract
/// address is appended.
pub const CODE_HASH_PATH: &str = "/compute/v1beta1/code_hash/by_contract_address/";

#[derive(Deserialize)]
struct TxKeyResponse {
	key: Option<String>,
}

#[derive(Deserialize)]
struct CodeHashResponse {
	code_hash: Option<String>,
}

/// Fetch the enclave's consensus IO public key from the node at `base`.
pub fn fetch_enclave_public_key<T: Transport + ?Sized>(
	transport: &T,
	base: &str,
) -> Result<[u8; KEY_LEN], ClientError> {
	let url = format!("{base}{TX_KEY_PATH}");
	let response = transport.get(&url)?;
	let parsed: TxKeyResponse = parse_json(&url, &response)?;

	let encoded = parsed.key.ok_or_else(|| {
		ClientError::Protocol(format!("{url}: response has no key"))
	})?;
	let decoded = STANDARD.decode(encoded.trim())?;

	Ok(key_from_slice(&decoded)?)
}

/// Fetch the code hash of `contract_address` from the node at `base`.
pub fn fetch_code_hash<T: Transport + ?Sized>(
	transport: &T,
	base: &str,
	contract_address: &str,
) -> Result<String, ClientError> {
	let url = format!("{base}{CODE_HASH_PATH}{contract_address}");
	let response = transport.get(&url)?;
	let parsed: CodeHashResponse = parse_json(&url, &response)?;

	match parsed.code_hash {
		Some(hash) if !hash.is_empty() => Ok(hash),
		_ => Err(ClientError::Protocol(format!(
			"{url}: response has no code_hash"
		))),
	}
}

fn parse_json<'de, D: Deserialize<'de>>(
	url: &str,
	response: &'de HttpResponse,
) -> Result<D, ClientError> {
	serde_json::from_str(&response.body).map_err(|e| {
		ClientError::Decode(format!(
			"{url}: invalid json (status {}): {e}",
			response.status
		))
	})
}
