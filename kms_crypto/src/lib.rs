//! Cryptography for encrypted queries against a Secret Network enclave.
//!
//! The protocol is:
//!
//! 1. X25519 between the client's long lived identity key and the enclave's
//!    consensus IO public key.
//! 2. `HKDF-SHA256(salt = HKDF_SALT, ikm = shared_secret||nonce)` to get a 32
//!    byte key. See [`QuerySession::derive_key`].
//! 3. Deterministic AES-128-SIV with a single empty header. See [`siv`].
//!
//! Everything in this crate is I/O free.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

use std::fmt;

mod identity;
mod session;
pub mod siv;

pub use identity::IdentityKeyPair;
pub use session::{DerivedKey, QuerySession};

/// Length of X25519 private keys, public keys and shared secrets.
pub const KEY_LEN: usize = 32;
/// Length of the per query nonce.
pub const NONCE_LEN: usize = 32;
/// Length of the key produced by HKDF and consumed by AES-SIV.
pub const DERIVED_KEY_LEN: usize = 32;
/// Length of the synthetic IV that prefixes every ciphertext.
pub const SIV_TAG_LEN: usize = 16;

/// Salt shared with the enclave for deriving query keys. If this does not
/// match the enclave's constant every query fails authentication.
pub const HKDF_SALT: [u8; 32] = [
	0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x4b, 0xea,
	0xd8, 0xdf, 0x69, 0x99, 0x08, 0x52, 0xc2, 0x02, 0xdb, 0x0e, 0x00, 0x97,
	0xc1, 0xa1, 0x2e, 0xa6, 0x37, 0xd7, 0xe9, 0x6d,
];

/// Errors for kms crypto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KmsCryptoError {
	/// A key or nonce did not have the expected length.
	InvalidKeyLength {
		/// The length that was expected.
		expected: usize,
		/// The length that was received.
		actual: usize,
	},
	/// The given public key does not match the private key.
	MismatchedPublicKey,
	/// HKDF refused to expand to the requested length.
	KeyDerivation,
	/// AES-SIV refused to encrypt, e.g. the plaintext is too large.
	SivEncrypt,
	/// The ciphertext was too short to contain a synthetic IV.
	CiphertextTooShort,
	/// The synthetic IV did not authenticate the plaintext. Either the
	/// ciphertext was tampered with or the key is wrong.
	SivDecrypt,
}

impl fmt::Display for KmsCryptoError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InvalidKeyLength { expected, actual } => write!(
				f,
				"invalid key length: expected {expected} bytes, got {actual}"
			),
			Self::MismatchedPublicKey => {
				write!(f, "public key does not match private key")
			}
			Self::KeyDerivation => write!(f, "hkdf expand failed"),
			Self::SivEncrypt => write!(f, "aes-siv encryption failed"),
			Self::CiphertextTooShort => {
				write!(f, "ciphertext is shorter than the siv tag")
			}
			Self::SivDecrypt => write!(f, "failed to authenticate ciphertext"),
		}
	}
}

impl std::error::Error for KmsCryptoError {}

/// Copy `bytes` into a fixed size key array.
pub fn key_from_slice(bytes: &[u8]) -> Result<[u8; KEY_LEN], KmsCryptoError> {
	bytes.try_into().map_err(|_| KmsCryptoError::InvalidKeyLength {
		expected: KEY_LEN,
		actual: bytes.len(),
	})
}
