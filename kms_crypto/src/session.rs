//! Per query key derivation.

use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{
	siv, IdentityKeyPair, KmsCryptoError, DERIVED_KEY_LEN, HKDF_SALT, KEY_LEN,
	NONCE_LEN,
};

/// State for a single query attempt: a fresh nonce bound to the client
/// identity.
///
/// The same session must be used to seal the query and to open the
/// response, otherwise the keys will not line up.
#[derive(Debug)]
pub struct QuerySession<'a> {
	nonce: [u8; NONCE_LEN],
	identity: &'a IdentityKeyPair,
}

impl<'a> QuerySession<'a> {
	/// Start a session with a random nonce from the OS randomness source.
	#[must_use]
	pub fn new(identity: &'a IdentityKeyPair) -> Self {
		let mut nonce = [0u8; NONCE_LEN];
		OsRng.fill_bytes(&mut nonce);

		Self { nonce, identity }
	}

	/// Start a session with a caller chosen nonce. Only meant for pinning
	/// test vectors; real queries should use [`Self::new`].
	#[must_use]
	pub fn with_nonce(
		identity: &'a IdentityKeyPair,
		nonce: [u8; NONCE_LEN],
	) -> Self {
		Self { nonce, identity }
	}

	/// The nonce sent in the clear at the start of the wire payload.
	#[must_use]
	pub fn nonce(&self) -> &[u8; NONCE_LEN] {
		&self.nonce
	}

	/// The identity this session encrypts as.
	#[must_use]
	pub fn identity(&self) -> &IdentityKeyPair {
		self.identity
	}

	/// Derive the symmetric key shared with the holder of `remote_public`.
	///
	/// `HKDF-SHA256(salt = HKDF_SALT, ikm = X25519(private, remote)||nonce,
	/// info = "")`, 32 bytes of output.
	pub fn derive_key(
		&self,
		remote_public: &[u8; KEY_LEN],
	) -> Result<DerivedKey, KmsCryptoError> {
		let shared_secret = self.identity.diffie_hellman(remote_public);

		let mut ikm = [0u8; KEY_LEN + NONCE_LEN];
		ikm[..KEY_LEN].copy_from_slice(shared_secret.as_bytes());
		ikm[KEY_LEN..].copy_from_slice(&self.nonce);

		let hkdf = Hkdf::<Sha256>::new(Some(&HKDF_SALT), &ikm);
		ikm.zeroize();

		let mut key = [0u8; DERIVED_KEY_LEN];
		hkdf.expand(&[], &mut key)
			.map_err(|_| KmsCryptoError::KeyDerivation)?;

		Ok(DerivedKey(key))
	}
}

/// Symmetric key for one query attempt. Zeroed on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; DERIVED_KEY_LEN]);

impl DerivedKey {
	/// Wrap raw key bytes.
	#[must_use]
	pub fn from_bytes(bytes: [u8; DERIVED_KEY_LEN]) -> Self {
		Self(bytes)
	}

	/// Raw key bytes.
	#[must_use]
	pub fn as_bytes(&self) -> &[u8; DERIVED_KEY_LEN] {
		&self.0
	}

	/// Seal `plaintext` with AES-SIV under this key.
	pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, KmsCryptoError> {
		siv::seal(&self.0, plaintext)
	}

	/// Authenticate and open `ciphertext` sealed under this key.
	pub fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, KmsCryptoError> {
		siv::open(&self.0, ciphertext)
	}
}

impl std::fmt::Debug for DerivedKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("DerivedKey(..)")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sequential_nonce() -> [u8; NONCE_LEN] {
		let mut nonce = [0u8; NONCE_LEN];
		for (i, b) in nonce.iter_mut().enumerate() {
			*b = u8::try_from(i).unwrap();
		}
		nonce
	}

	// If any of these change the client can no longer talk to the enclave.
	const REMOTE_PUBLIC_HEX: &str =
		"13be4feaeaf204c7fd3358fc9c00721881d174278128227ec674f37f7fe97b6d";
	const EXPECTED_KEY_HEX: &str =
		"b0a526b0db86facbfbd79ce6fe494eb1bb10aa48e406fe245769f91f1da3ebed";
	const EXPECTED_CIPHERTEXT_HEX: &str =
		"1fb131606e0d4fab00f49d871cb65c2a2884aff282ba2dd0";

	#[test]
	fn golden_vector() {
		let client = IdentityKeyPair::from_private(&[0u8; 32]);
		let remote = IdentityKeyPair::from_private(&[7u8; 32]);
		assert_eq!(hex::encode(remote.public_bytes()), REMOTE_PUBLIC_HEX);

		let session = QuerySession::with_nonce(&client, sequential_nonce());
		let key = session.derive_key(&remote.public_bytes()).unwrap();
		assert_eq!(hex::encode(key.as_bytes()), EXPECTED_KEY_HEX);

		let ciphertext = key.seal(b"abc123{}").unwrap();
		assert_eq!(hex::encode(&ciphertext), EXPECTED_CIPHERTEXT_HEX);
		assert_eq!(key.open(&ciphertext).unwrap(), b"abc123{}");
	}

	#[test]
	fn derive_key_is_deterministic() {
		let client = IdentityKeyPair::generate();
		let remote = IdentityKeyPair::generate();
		let session = QuerySession::new(&client);

		let a = session.derive_key(&remote.public_bytes()).unwrap();
		let b = session.derive_key(&remote.public_bytes()).unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn both_sides_derive_the_same_key() {
		let client = IdentityKeyPair::generate();
		let enclave = IdentityKeyPair::generate();
		let client_session = QuerySession::new(&client);

		// The enclave learns the nonce from the wire payload.
		let enclave_session =
			QuerySession::with_nonce(&enclave, *client_session.nonce());

		assert_eq!(
			client_session.derive_key(&enclave.public_bytes()).unwrap(),
			enclave_session.derive_key(&client.public_bytes()).unwrap()
		);
	}

	#[test]
	fn any_input_change_changes_key() {
		let client = IdentityKeyPair::generate();
		let remote = IdentityKeyPair::generate();
		let other_remote = IdentityKeyPair::generate();
		let nonce = sequential_nonce();
		let mut other_nonce = nonce;
		other_nonce[31] ^= 1;

		let base = QuerySession::with_nonce(&client, nonce)
			.derive_key(&remote.public_bytes())
			.unwrap();
		let nonce_changed = QuerySession::with_nonce(&client, other_nonce)
			.derive_key(&remote.public_bytes())
			.unwrap();
		let remote_changed = QuerySession::with_nonce(&client, nonce)
			.derive_key(&other_remote.public_bytes())
			.unwrap();

		assert_ne!(base, nonce_changed);
		assert_ne!(base, remote_changed);
	}

	#[test]
	fn fresh_sessions_use_fresh_nonces() {
		let client = IdentityKeyPair::generate();

		assert_ne!(
			QuerySession::new(&client).nonce(),
			QuerySession::new(&client).nonce()
		);
	}

	#[test]
	fn debug_does_not_leak_key() {
		let key = DerivedKey::from_bytes([0x11; 32]);
		assert_eq!(format!("{key:?}"), "DerivedKey(..)");
	}
}
