//! Hashing and secp256k1 ECDSA operations for the Cobble protocol.
//!
//! Addresses are `RIPEMD160(SHA256(compressed pubkey))`, hex-encoded
//! (40 lowercase hex chars). Signatures are DER-encoded ECDSA over the
//! 32-byte signing preimage, carried on the wire as hex strings.
//!
//! Verification never panics: any decoding failure of a public key or
//! signature counts as "signature invalid".

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CryptoError;

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 digest of `data`, lowercase hex-encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// RIPEMD-160 digest of `data`.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// Derive the address for a compressed public key given as hex.
///
/// `address = hex(RIPEMD160(SHA256(pubkey bytes)))`. The pubkey is not
/// required to be a valid curve point here; address derivation is a pure
/// hash chain. Returns an error only when the hex itself is malformed.
pub fn address_for_pubkey(pub_key_hex: &str) -> Result<String, CryptoError> {
    let bytes = hex::decode(pub_key_hex).map_err(|_| CryptoError::InvalidPublicKey)?;
    Ok(hex::encode(ripemd160(&sha256(&bytes))))
}

/// Verify a DER-encoded ECDSA signature over a 32-byte digest.
///
/// `pub_key_hex` must decode to a SEC1 compressed secp256k1 point and
/// `sig_hex` to a DER signature; any decode or verification failure
/// returns `false`.
pub fn verify_signature(pub_key_hex: &str, digest: &[u8; 32], sig_hex: &str) -> bool {
    let Ok(key_bytes) = hex::decode(pub_key_hex) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_sec1_bytes(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(sig_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    key.verify_prehash(digest, &sig).is_ok()
}

/// secp256k1 keypair for producing spend signatures.
///
/// Used by tests and by external wallet tooling built on this crate; the
/// node itself only verifies.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Create a keypair from 32-byte secret scalar material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes(&bytes.into()).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { signing_key })
    }

    /// The compressed SEC1 public key, hex-encoded (66 chars).
    pub fn public_key_hex(&self) -> String {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        hex::encode(point.as_bytes())
    }

    /// The address paid by outputs this keypair can spend.
    pub fn address(&self) -> String {
        let point = self.signing_key.verifying_key().to_encoded_point(true);
        hex::encode(ripemd160(&sha256(point.as_bytes())))
    }

    /// Sign a 32-byte digest, returning the DER signature hex-encoded.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<String, CryptoError> {
        let sig: Signature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|_| CryptoError::SigningFailed)?;
        Ok(hex::encode(sig.to_der().as_bytes()))
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
