//! Content hashing and secp256k1 signatures.
//!
//! Addresses are the hex encoding of a compressed public key. Signatures are
//! hex encoded DER.

use crate::error::{LedgerError, Result};
use crate::Hash;
use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize through `serde_json::Value` so object keys come out sorted.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_value(value)
        .map(|v| v.to_string())
        .unwrap_or_default()
}

pub fn sha256(bytes: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

pub fn hash_hex(preimage: &str) -> String {
    hex::encode(sha256(preimage.as_bytes()))
}

/// SHA-256 of the canonical JSON encoding of `value`.
pub fn digest<T: Serialize + ?Sized>(value: &T) -> Hash {
    sha256(canonical_json(value).as_bytes())
}

pub fn id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Returns (secret key, address).
pub fn generate_keypair() -> (SecretKey, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    (sk, hex::encode(pk.serialize()))
}

pub fn sign(secret: &SecretKey, digest: &Hash) -> Result<String> {
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest_slice(digest).map_err(|e| LedgerError::Crypto(e.to_string()))?;
    let sig = secp.sign_ecdsa(&msg, secret);
    Ok(hex::encode(&*sig.serialize_der()))
}

/// False on any decoding failure as well as on a bad signature.
pub fn verify_signature(public_key: &str, signature: &str, digest: &Hash) -> bool {
    let secp = Secp256k1::verification_only();
    let Ok(pk_bytes) = hex::decode(public_key) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_slice(&pk_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    let Ok(msg) = Message::from_digest_slice(digest) else {
        return false;
    };
    secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
}
