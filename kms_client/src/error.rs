//! Errors for the query client.

use std::fmt;

use kms_crypto::KmsCryptoError;

/// Errors that can occur while querying the enclave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
	/// Could not reach the node, the request timed out, or the body could not
	/// be read.
	Transport(String),
	/// Malformed base64, hex, UTF-8 or JSON somewhere in the pipeline.
	Decode(String),
	/// A ciphertext did not authenticate under the derived key.
	Authentication,
	/// The node answered, but not with anything we can use.
	Protocol(String),
	/// The identity file could not be read, written or parsed.
	Storage(String),
	/// There were no endpoints to try.
	NoEndpoints,
	/// Every endpoint failed. Holds the error from the first endpoint.
	AllEndpointsFailed(Box<ClientError>),
}

impl fmt::Display for ClientError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Transport(e) => write!(f, "transport error: {e}"),
			Self::Decode(e) => write!(f, "decode error: {e}"),
			Self::Authentication => {
				write!(f, "failed to decrypt payload: authentication failed")
			}
			Self::Protocol(e) => write!(f, "{e}"),
			Self::Storage(e) => write!(f, "identity key error: {e}"),
			Self::NoEndpoints => write!(f, "no endpoints configured"),
			Self::AllEndpointsFailed(first) => {
				write!(f, "all endpoints failed: {first}")
			}
		}
	}
}

impl std::error::Error for ClientError {}

impl From<KmsCryptoError> for ClientError {
	fn from(e: KmsCryptoError) -> Self {
		match e {
			KmsCryptoError::SivDecrypt | KmsCryptoError::CiphertextTooShort => {
				Self::Authentication
			}
			KmsCryptoError::InvalidKeyLength { .. } => Self::Decode(e.to_string()),
			KmsCryptoError::MismatchedPublicKey => Self::Storage(e.to_string()),
			KmsCryptoError::KeyDerivation | KmsCryptoError::SivEncrypt => {
				Self::Protocol(e.to_string())
			}
		}
	}
}

impl From<serde_json::Error> for ClientError {
	fn from(e: serde_json::Error) -> Self {
		Self::Decode(format!("invalid json: {e}"))
	}
}

impl From<base64::DecodeError> for ClientError {
	fn from(e: base64::DecodeError) -> Self {
		Self::Decode(format!("invalid base64: {e}"))
	}
}

impl From<hex::FromHexError> for ClientError {
	fn from(e: hex::FromHexError) -> Self {
		Self::Decode(format!("invalid hex: {e}"))
	}
}
