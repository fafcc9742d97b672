use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Represents an account identity (public key in base58 format)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        let bytes = public_key.as_bytes();
        let encoded = bs58::encode(bytes).into_string();
        Address(encoded)
    }

    /// Converts the address back to the public key it encodes
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key bytes".to_string())
        })?;

        VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Represents a digital signature (base58 encoded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(bs58::encode(signature.to_bytes()).into_string())
    }

    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature("Invalid signature length".to_string())
        })?;

        Ok(Signature::from_bytes(&signature_bytes))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Anything that can sign on behalf of an address.
pub trait SigningIdentity {
    /// The public identity this key signs for
    fn address(&self) -> &Address;

    /// Signs a message digest
    fn sign(&self, message: &[u8]) -> Result<DigitalSignature, CryptoError>;
}

/// Hash function and signature verifier used by transactions, blocks and the ledger.
///
/// Handed to every operation that hashes or verifies, so tests can substitute
/// their own primitives.
pub trait CryptoProvider {
    /// Digest of `data` as a lowercase hex string
    fn digest(&self, data: &[u8]) -> String;

    /// Verifies `signature` over `message` using `public_key`
    fn verify(
        &self,
        public_key: &Address,
        message: &[u8],
        signature: &DigitalSignature,
    ) -> Result<bool, CryptoError>;
}

/// SHA-256 digests with ed25519 signatures
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Sha256;

impl CryptoProvider for Ed25519Sha256 {
    fn digest(&self, data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    fn verify(
        &self,
        public_key: &Address,
        message: &[u8],
        signature: &DigitalSignature,
    ) -> Result<bool, CryptoError> {
        // Neither an undecodable address nor an undecodable signature can verify
        let public_key = match public_key.to_public_key() {
            Ok(key) => key,
            Err(_) => return Ok(false),
        };

        let signature = match signature.to_signature() {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };

        Ok(public_key.verify(message, &signature).is_ok())
    }
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Result<Self, CryptoError> {
        let mut csprng = OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        Ok(Self::from_signing_key(signing_key))
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_array: [u8; 32] = secret_key_bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("Invalid private key length".to_string())
        })?;

        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes_array)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::from_public_key(&signing_key.verifying_key());

        Wallet {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Signs a message with the wallet's private key
    pub fn sign(&self, message: &[u8]) -> Result<DigitalSignature, CryptoError> {
        let signature = self.signing_key.sign(message);
        Ok(DigitalSignature::from_signature(&signature))
    }

    /// Exports the wallet's secret key as bytes
    pub fn export_secret_key(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

impl SigningIdentity for Wallet {
    fn address(&self) -> &Address {
        Wallet::address(self)
    }

    fn sign(&self, message: &[u8]) -> Result<DigitalSignature, CryptoError> {
        Wallet::sign(self, message)
    }
}
