//! Queries understood by the KMS contract.

use serde::Serialize;

/// A query to the KMS contract.
///
/// Serializes to the contract's JSON, e.g.
/// `{"get_env_by_image":{"collateral":[1,2],"quote":[3,4]}}`. Fields are
/// declared in lexicographic order so the JSON keys come out sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
	/// Secret key for a registered service, released against an attested
	/// quote.
	GetSecretKey {
		/// Quote collateral.
		collateral: Vec<u8>,
		/// Attestation quote.
		quote: Vec<u8>,
		/// Id of the service the key belongs to.
		service_id: u64,
	},
	/// Environment registered for the attested image.
	GetEnvByImage {
		/// Quote collateral.
		collateral: Vec<u8>,
		/// Attestation quote.
		quote: Vec<u8>,
	},
	/// Secret key registered for the attested image.
	GetSecretKeyByImage {
		/// Quote collateral.
		collateral: Vec<u8>,
		/// Attestation quote.
		quote: Vec<u8>,
	},
}

impl QueryMsg {
	/// JSON encoding of the query as the contract expects it.
	pub fn to_json(&self) -> Result<String, serde_json::Error> {
		serde_json::to_string(self)
	}
}
