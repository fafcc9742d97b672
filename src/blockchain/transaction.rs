use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::crypto::{Address, CryptoError, CryptoProvider, DigitalSignature, SigningIdentity};

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Unauthorized signer: {signer} cannot sign for {from}")]
    UnauthorizedSigner { signer: String, from: String },

    #[error("Transaction has no signature")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// A value transfer recorded on the ledger.
///
/// System-minted rewards are a separate variant with no sender, so they never
/// carry a signature requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transaction {
    /// Value moved from one identity to another, authorised by the sender's signature
    Transfer {
        from: Address,
        to: Address,
        amount: f64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        signature: Option<DigitalSignature>,
    },

    /// Mining reward minted by the ledger itself
    Reward { to: Address, amount: f64 },
}

impl Transaction {
    /// Creates a new unsigned transfer
    pub fn transfer(from: Address, to: Address, amount: f64) -> Self {
        Transaction::Transfer {
            from,
            to,
            amount,
            signature: None,
        }
    }

    /// Creates a new reward transaction
    pub fn reward(to: Address, amount: f64) -> Self {
        Transaction::Reward { to, amount }
    }

    /// Sender, or `None` for system rewards
    pub fn from(&self) -> Option<&Address> {
        match self {
            Transaction::Transfer { from, .. } => Some(from),
            Transaction::Reward { .. } => None,
        }
    }

    pub fn to(&self) -> &Address {
        match self {
            Transaction::Transfer { to, .. } | Transaction::Reward { to, .. } => to,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Transaction::Transfer { amount, .. } | Transaction::Reward { amount, .. } => *amount,
        }
    }

    /// Overwrites the amount without touching the signature.
    ///
    /// Nothing stops a holder of the value from doing this; signature and
    /// chain validation are what catch it.
    pub fn set_amount(&mut self, new_amount: f64) {
        match self {
            Transaction::Transfer { amount, .. } | Transaction::Reward { amount, .. } => {
                *amount = new_amount
            }
        }
    }

    pub fn signature(&self) -> Option<&DigitalSignature> {
        match self {
            Transaction::Transfer { signature, .. } => signature.as_ref(),
            Transaction::Reward { .. } => None,
        }
    }

    pub fn is_reward(&self) -> bool {
        matches!(self, Transaction::Reward { .. })
    }

    /// Hash over `(from, to, amount)`; the signature is not part of it
    pub fn content_hash<C: CryptoProvider + ?Sized>(
        &self,
        crypto: &C,
    ) -> Result<String, TransactionError> {
        let data = serde_json::json!({
            "from": self.from().map(|address| address.0.as_str()),
            "to": self.to().0,
            "amount": self.amount(),
        });

        let bytes = serde_json::to_vec(&data)
            .map_err(|e| TransactionError::SerializationError(e.to_string()))?;

        Ok(crypto.digest(&bytes))
    }

    /// Signs the transaction with the sender's key.
    ///
    /// The signer's address must equal `from`. Rewards have no sender and
    /// cannot be signed by anyone.
    pub fn sign<S, C>(&mut self, signer: &S, crypto: &C) -> Result<(), TransactionError>
    where
        S: SigningIdentity + ?Sized,
        C: CryptoProvider + ?Sized,
    {
        let hash = self.content_hash(crypto)?;

        match self {
            Transaction::Transfer {
                from, signature, ..
            } => {
                if *signer.address() != *from {
                    return Err(TransactionError::UnauthorizedSigner {
                        signer: signer.address().to_string(),
                        from: from.to_string(),
                    });
                }

                *signature = Some(signer.sign(hash.as_bytes())?);
                Ok(())
            }
            Transaction::Reward { .. } => Err(TransactionError::UnauthorizedSigner {
                signer: signer.address().to_string(),
                from: "system".to_string(),
            }),
        }
    }

    /// Checks the transaction's authorisation.
    ///
    /// Rewards are always valid. A transfer without a signature is an error,
    /// not merely invalid. Amount bounds and balances are not checked here.
    pub fn is_valid<C: CryptoProvider + ?Sized>(&self, crypto: &C) -> Result<bool, TransactionError> {
        match self {
            Transaction::Reward { .. } => Ok(true),
            Transaction::Transfer {
                from, signature, ..
            } => {
                let signature = match signature {
                    Some(sig) if !sig.is_empty() => sig,
                    _ => return Err(TransactionError::MissingSignature),
                };

                let hash = self.content_hash(crypto)?;
                Ok(crypto.verify(from, hash.as_bytes(), signature)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::{Ed25519Sha256, Wallet};

    #[test]
    fn test_new_transfer() {
        let sender_wallet = Wallet::new().unwrap();
        let recipient_wallet = Wallet::new().unwrap();

        let transaction = Transaction::transfer(
            sender_wallet.address().clone(),
            recipient_wallet.address().clone(),
            10.5,
        );

        assert_eq!(transaction.from(), Some(sender_wallet.address()));
        assert_eq!(transaction.to(), recipient_wallet.address());
        assert_eq!(transaction.amount(), 10.5);
        assert!(transaction.signature().is_none());
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_sign_transaction() {
        let crypto = Ed25519Sha256;
        let sender_wallet = Wallet::new().unwrap();
        let recipient_wallet = Wallet::new().unwrap();

        let mut transaction = Transaction::transfer(
            sender_wallet.address().clone(),
            recipient_wallet.address().clone(),
            10.0,
        );

        transaction.sign(&sender_wallet, &crypto).unwrap();

        assert!(transaction.signature().is_some());
        assert!(transaction.is_valid(&crypto).unwrap());
    }

    #[test]
    fn test_sign_with_wrong_wallet_is_rejected() {
        let crypto = Ed25519Sha256;
        let sender_wallet = Wallet::new().unwrap();
        let intruder = Wallet::new().unwrap();

        let mut transaction = Transaction::transfer(
            sender_wallet.address().clone(),
            Address("recipient".to_string()),
            10.0,
        );

        let result = transaction.sign(&intruder, &crypto);

        assert!(matches!(
            result,
            Err(TransactionError::UnauthorizedSigner { .. })
        ));
        assert!(transaction.signature().is_none());
    }

    #[test]
    fn test_reward_cannot_be_signed() {
        let crypto = Ed25519Sha256;
        let wallet = Wallet::new().unwrap();
        let mut reward = Transaction::reward(wallet.address().clone(), 100.0);

        assert!(matches!(
            reward.sign(&wallet, &crypto),
            Err(TransactionError::UnauthorizedSigner { .. })
        ));
    }

    #[test]
    fn test_unsigned_transfer_is_missing_signature() {
        let crypto = Ed25519Sha256;
        let sender_wallet = Wallet::new().unwrap();

        let transaction = Transaction::transfer(
            sender_wallet.address().clone(),
            Address("recipient".to_string()),
            1.0,
        );

        assert!(matches!(
            transaction.is_valid(&crypto),
            Err(TransactionError::MissingSignature)
        ));
    }

    #[test]
    fn test_empty_signature_is_missing_signature() {
        let crypto = Ed25519Sha256;
        let transaction = Transaction::Transfer {
            from: Address("sender".to_string()),
            to: Address("recipient".to_string()),
            amount: 1.0,
            signature: Some(DigitalSignature(String::new())),
        };

        assert!(matches!(
            transaction.is_valid(&crypto),
            Err(TransactionError::MissingSignature)
        ));
    }

    #[test]
    fn test_tampered_amount_fails_verification() {
        let crypto = Ed25519Sha256;
        let sender_wallet = Wallet::new().unwrap();

        let mut transaction = Transaction::transfer(
            sender_wallet.address().clone(),
            Address("recipient".to_string()),
            10.0,
        );
        transaction.sign(&sender_wallet, &crypto).unwrap();

        transaction.set_amount(1.0);

        assert!(!transaction.is_valid(&crypto).unwrap());
    }

    #[test]
    fn test_reward_is_always_valid() {
        let crypto = Ed25519Sha256;
        let reward = Transaction::reward(Address("miner".to_string()), 100.0);

        assert!(reward.is_reward());
        assert_eq!(reward.from(), None);
        assert!(reward.is_valid(&crypto).unwrap());
    }

    #[test]
    fn test_content_hash_is_stable_and_ignores_signature() {
        let crypto = Ed25519Sha256;
        let sender_wallet = Wallet::new().unwrap();

        let mut transaction = Transaction::transfer(
            sender_wallet.address().clone(),
            Address("recipient".to_string()),
            10.0,
        );

        let before = transaction.content_hash(&crypto).unwrap();
        assert_eq!(before, transaction.content_hash(&crypto).unwrap());

        transaction.sign(&sender_wallet, &crypto).unwrap();
        assert_eq!(before, transaction.content_hash(&crypto).unwrap());

        transaction.set_amount(11.0);
        assert_ne!(before, transaction.content_hash(&crypto).unwrap());
    }
}
