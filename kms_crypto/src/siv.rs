//! Deterministic authenticated encryption with AES-SIV (RFC 5297).
//!
//! A 32 byte key is split into a CMAC key (first half) and a CTR key (second
//! half), i.e. AES-128-SIV. Every call authenticates exactly one empty
//! header, which is what the enclave does. Ciphertexts are laid out as
//! `siv_tag||encrypted_message`.

use aes_siv::{siv::Aes128Siv, KeyInit};

use crate::{KmsCryptoError, DERIVED_KEY_LEN, SIV_TAG_LEN};

const EMPTY_HEADERS: [&[u8]; 1] = [&[]];

/// Encrypt `plaintext`. The same key and plaintext always produce the same
/// ciphertext.
pub fn seal(
	key: &[u8; DERIVED_KEY_LEN],
	plaintext: &[u8],
) -> Result<Vec<u8>, KmsCryptoError> {
	Aes128Siv::new(key.into())
		.encrypt(EMPTY_HEADERS, plaintext)
		.map_err(|_| KmsCryptoError::SivEncrypt)
}

/// Decrypt `ciphertext` and check the synthetic IV. No plaintext is
/// returned unless it authenticates.
pub fn open(
	key: &[u8; DERIVED_KEY_LEN],
	ciphertext: &[u8],
) -> Result<Vec<u8>, KmsCryptoError> {
	if ciphertext.len() < SIV_TAG_LEN {
		return Err(KmsCryptoError::CiphertextTooShort);
	}

	Aes128Siv::new(key.into())
		.decrypt(EMPTY_HEADERS, ciphertext)
		.map_err(|_| KmsCryptoError::SivDecrypt)
}
