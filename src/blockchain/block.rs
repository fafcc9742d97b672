use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::crypto::CryptoProvider;
use super::transaction::{Transaction, TransactionError};

/// Errors that can occur while hashing or mining a block
#[derive(Debug, Error)]
pub enum BlockError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Mining cancelled after {attempts} attempts")]
    MiningCancelled { attempts: u64 },
}

/// Shared flag used to stop an in-flight proof-of-work search
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Returns true if the first `difficulty` characters of `hash` are all `'0'`
pub fn meets_target(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

#[derive(Serialize)]
struct HashInput<'a> {
    previous_hash: &'a str,
    timestamp: &'a DateTime<Utc>,
    transactions: &'a [Transaction],
    nonce: u64,
}

fn hash_fields<C: CryptoProvider + ?Sized>(
    crypto: &C,
    input: &HashInput<'_>,
) -> Result<String, BlockError> {
    let bytes = serde_json::to_vec(input)
        .map_err(|e| BlockError::SerializationError(e.to_string()))?;

    Ok(crypto.digest(&bytes))
}

/// A block still being assembled or mined. Only the nonce search mutates it.
#[derive(Debug, Clone)]
pub struct BlockCandidate {
    timestamp: DateTime<Utc>,
    transactions: Vec<Transaction>,
    previous_hash: String,
    nonce: u64,
}

impl BlockCandidate {
    /// Creates a candidate stamped with the current time
    pub fn new(transactions: Vec<Transaction>, previous_hash: String) -> Self {
        BlockCandidate {
            timestamp: Utc::now(),
            transactions,
            previous_hash,
            nonce: 0,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn compute_hash<C: CryptoProvider + ?Sized>(&self, crypto: &C) -> Result<String, BlockError> {
        hash_fields(
            crypto,
            &HashInput {
                previous_hash: &self.previous_hash,
                timestamp: &self.timestamp,
                transactions: &self.transactions,
                nonce: self.nonce,
            },
        )
    }

    /// Seals the candidate at its current nonce without searching.
    /// Only the genesis block is committed this way.
    pub fn seal_unmined<C: CryptoProvider + ?Sized>(self, crypto: &C) -> Result<Block, BlockError> {
        let hash = self.compute_hash(crypto)?;
        Ok(self.seal(hash))
    }

    /// Searches nonces until the hash meets `difficulty`.
    ///
    /// There is no attempt cap; large difficulties block the caller for as
    /// long as the search takes.
    pub fn mine<C: CryptoProvider + ?Sized>(
        self,
        difficulty: usize,
        crypto: &C,
    ) -> Result<Block, BlockError> {
        self.mine_until_cancelled(difficulty, crypto, &CancellationToken::new())
    }

    /// Same search as [`BlockCandidate::mine`], abandoned once `token` is cancelled
    pub fn mine_until_cancelled<C: CryptoProvider + ?Sized>(
        mut self,
        difficulty: usize,
        crypto: &C,
        token: &CancellationToken,
    ) -> Result<Block, BlockError> {
        let mut attempts = 0u64;

        loop {
            if token.is_cancelled() {
                debug!("Mining cancelled at nonce {}", self.nonce);
                return Err(BlockError::MiningCancelled { attempts });
            }

            let hash = self.compute_hash(crypto)?;
            attempts += 1;

            if meets_target(&hash, difficulty) {
                info!("Block mined: {}", hash);
                debug!("Found nonce {} after {} attempts", self.nonce, attempts);
                return Ok(self.seal(hash));
            }

            self.nonce += 1;
        }
    }

    fn seal(self, hash: String) -> Block {
        Block {
            timestamp: self.timestamp,
            transactions: self.transactions,
            previous_hash: self.previous_hash,
            hash,
            nonce: self.nonce,
        }
    }
}

/// A sealed block as committed to the chain.
///
/// Nothing re-hashes a block after sealing, so edits made through
/// [`Block::transactions_mut`] stay in place; chain validation recomputes
/// everything it trusts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) transactions: Vec<Transaction>,
    pub(crate) previous_hash: String,
    pub(crate) hash: String,
    pub(crate) nonce: u64,
}

impl Block {
    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Raw access to the committed transactions.
    ///
    /// Edits here are not re-hashed or re-signed; [`Ledger::validate_chain`]
    /// reports them.
    ///
    /// [`Ledger::validate_chain`]: super::chain::Ledger::validate_chain
    pub fn transactions_mut(&mut self) -> &mut [Transaction] {
        &mut self.transactions
    }

    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// The hash stored when the block was sealed
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Recomputes the hash from the block's current fields
    pub fn compute_hash<C: CryptoProvider + ?Sized>(&self, crypto: &C) -> Result<String, BlockError> {
        hash_fields(
            crypto,
            &HashInput {
                previous_hash: &self.previous_hash,
                timestamp: &self.timestamp,
                transactions: &self.transactions,
                nonce: self.nonce,
            },
        )
    }

    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        meets_target(&self.hash, difficulty)
    }

    /// True iff every transaction is valid. Stops at the first invalid one and
    /// propagates validity errors such as a missing signature.
    pub fn has_valid_transactions<C: CryptoProvider + ?Sized>(
        &self,
        crypto: &C,
    ) -> Result<bool, TransactionError> {
        for transaction in &self.transactions {
            if !transaction.is_valid(crypto)? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}
