//! Long lived X25519 identity of a query client.

use rand_core::{OsRng, RngCore};
use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

use crate::{KmsCryptoError, KEY_LEN};

/// The client's X25519 key pair.
///
/// The enclave sees the public half in every query payload and uses it for
/// its side of the key agreement, so the pair should outlive any single
/// query.
pub struct IdentityKeyPair {
	private: StaticSecret,
	public: PublicKey,
}

impl IdentityKeyPair {
	/// Generate a new pair using the OS randomness source.
	#[must_use]
	pub fn generate() -> Self {
		let mut private = Zeroizing::new([0u8; KEY_LEN]);
		OsRng.fill_bytes(&mut *private);

		Self::from_private(&private)
	}

	/// Build the pair from raw private key bytes. The public key is computed
	/// with a scalar base multiplication.
	///
	/// `private` is only borrowed; wiping it stays with the caller.
	#[must_use]
	pub fn from_private(private: &[u8; KEY_LEN]) -> Self {
		let private = StaticSecret::from(*private);
		let public = PublicKey::from(&private);

		Self { private, public }
	}

	/// Build the pair from previously persisted bytes, checking that `public`
	/// really belongs to `private`.
	pub fn from_parts(
		private: &[u8; KEY_LEN],
		public: [u8; KEY_LEN],
	) -> Result<Self, KmsCryptoError> {
		let pair = Self::from_private(private);
		if pair.public.as_bytes() != &public {
			return Err(KmsCryptoError::MismatchedPublicKey);
		}

		Ok(pair)
	}

	/// Raw bytes of the private key, exactly as they were generated. The
	/// copy is wiped when dropped.
	#[must_use]
	pub fn private_bytes(&self) -> Zeroizing<[u8; KEY_LEN]> {
		Zeroizing::new(self.private.to_bytes())
	}

	/// Raw bytes of the public key.
	#[must_use]
	pub fn public_bytes(&self) -> [u8; KEY_LEN] {
		self.public.to_bytes()
	}

	/// X25519 key agreement with `remote_public`.
	pub(crate) fn diffie_hellman(
		&self,
		remote_public: &[u8; KEY_LEN],
	) -> SharedSecret {
		self.private.diffie_hellman(&PublicKey::from(*remote_public))
	}
}

impl std::fmt::Debug for IdentityKeyPair {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdentityKeyPair")
			.field("public", self.public.as_bytes())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn public_key_is_base_point_multiple() {
		// RFC 7748 section 6.1, Alice's key pair.
		let private: [u8; 32] = hex::decode(
			"77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a",
		)
		.unwrap()
		.try_into()
		.unwrap();
		let pair = IdentityKeyPair::from_private(&private);

		assert_eq!(
			hex::encode(pair.public_bytes()),
			"8520f0098930a754748b7ddcb43ef75a0dbf3a0d26381af4eba4a98eaa9b4e6a"
		);
		assert_eq!(*pair.private_bytes(), private);
	}

	#[test]
	fn generate_is_random() {
		let a = IdentityKeyPair::generate();
		let b = IdentityKeyPair::generate();

		assert_ne!(a.private_bytes(), b.private_bytes());
		assert_ne!(a.public_bytes(), b.public_bytes());
	}

	#[test]
	fn from_parts_rejects_foreign_public_key() {
		let a = IdentityKeyPair::generate();
		let b = IdentityKeyPair::generate();

		assert!(
			IdentityKeyPair::from_parts(&a.private_bytes(), a.public_bytes())
				.is_ok()
		);
		assert_eq!(
			IdentityKeyPair::from_parts(&a.private_bytes(), b.public_bytes())
				.unwrap_err(),
			KmsCryptoError::MismatchedPublicKey
		);
	}

	#[test]
	fn private_key_stays_in_zeroizing_buffers() {
		let private = Zeroizing::new([0x42u8; KEY_LEN]);
		let pair = IdentityKeyPair::from_private(&private);

		let exported: Zeroizing<[u8; KEY_LEN]> = pair.private_bytes();
		assert_eq!(exported, private);

		let reloaded =
			IdentityKeyPair::from_parts(&exported, pair.public_bytes()).unwrap();
		assert_eq!(reloaded.public_bytes(), pair.public_bytes());
	}

	#[test]
	fn key_agreement_is_symmetric() {
		let alice = IdentityKeyPair::generate();
		let bob = IdentityKeyPair::generate();

		assert_eq!(
			alice.diffie_hellman(&bob.public_bytes()).as_bytes(),
			bob.diffie_hellman(&alice.public_bytes()).as_bytes()
		);
	}

	#[test]
	fn debug_does_not_leak_private_key() {
		let pair = IdentityKeyPair::from_private(&[0xab; 32]);
		let debug = format!("{pair:?}");

		assert!(!debug.contains("171, 171, 171"));
		assert!(debug.contains("public"));
	}
}
