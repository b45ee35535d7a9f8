use ed25519_dalek::{Signature as DalekSignature, Signer, Verifier};
use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;
use std::fmt;

use super::address::Address;
use super::keys::{PublicKey, SecretKey};
use crate::error::CoreError;

/// Ed25519 signature (64 bytes)
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sig(#[serde(with = "BigArray")] pub [u8; 64]);

impl Sig {
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; 64] = slice.try_into().ok()?;
        Some(Sig(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Default for Sig {
    fn default() -> Self {
        Sig([0u8; 64])
    }
}

impl fmt::Debug for Sig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({}...)", &self.to_hex()[..16])
    }
}

/// Sign a message with a secret key
pub fn sign(secret_key: &SecretKey, message: &[u8]) -> Sig {
    Sig(secret_key.signing_key().sign(message).to_bytes())
}

/// Verify a signature against a public key and message
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Sig) -> Result<(), CoreError> {
    let verifying_key = public_key.to_verifying_key()?;
    verifying_key
        .verify(message, &DalekSignature::from_bytes(&signature.0))
        .map_err(|_| CoreError::InvalidSignature)
}

/// A signature bundled with the key that produced it.
///
/// Ed25519 signatures do not allow key recovery, so the signer's address is
/// derived from the embedded public key once the signature checks out.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Seal {
    pub public_key: PublicKey,
    pub signature: Sig,
}

impl Seal {
    pub fn sign(secret_key: &SecretKey, message: &[u8]) -> Seal {
        Seal {
            public_key: secret_key.public_key(),
            signature: sign(secret_key, message),
        }
    }

    /// Verify the seal over `message` and return the signer's address
    pub fn recover(&self, message: &[u8]) -> Result<Address, CoreError> {
        verify(&self.public_key, message, &self.signature)?;
        Ok(self.public_key.address())
    }
}

impl fmt::Debug for Seal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seal({}, {:?})", self.public_key.address(), self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let sig = sign(&kp.secret, b"prepare");
        assert!(verify(&kp.public, b"prepare", &sig).is_ok());
        assert!(verify(&kp.public, b"commit", &sig).is_err());
    }

    #[test]
    fn test_seal_recovers_signer() {
        let kp = KeyPair::generate();
        let seal = Seal::sign(&kp.secret, b"header");
        assert_eq!(seal.recover(b"header").unwrap(), kp.address());
    }

    #[test]
    fn test_seal_with_swapped_key_rejected() {
        let signer = KeyPair::generate();
        let imposter = KeyPair::generate();
        let mut seal = Seal::sign(&signer.secret, b"header");
        seal.public_key = imposter.public;
        assert!(matches!(
            seal.recover(b"header"),
            Err(CoreError::InvalidSignature)
        ));
    }
}
