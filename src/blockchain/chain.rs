use chrono::{TimeZone, Utc};
use log::{debug, info, warn};
use thiserror::Error;

use std::fmt;

use super::block::{Block, BlockCandidate, BlockError, CancellationToken};
use super::config::LedgerConfig;
use super::crypto::{Address, CryptoProvider, Ed25519Sha256};
use super::transaction::{Transaction, TransactionError};

/// Genesis timestamp: 2017-01-01T00:00:00Z
const GENESIS_TIMESTAMP_SECS: i64 = 1_483_228_800;

/// Hash the genesis block links back to
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Why a committed block failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    /// A contained transaction failed signature verification
    InvalidTransactions,
    /// The stored hash differs from the recomputed one
    HashMismatch,
    /// `previous_hash` differs from the preceding block's hash
    BrokenLink,
    /// The stored hash does not meet the ledger difficulty
    InsufficientWork,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationReason::InvalidTransactions => write!(f, "invalid transactions"),
            ViolationReason::HashMismatch => write!(f, "hash mismatch"),
            ViolationReason::BrokenLink => write!(f, "broken link to previous block"),
            ViolationReason::InsufficientWork => write!(f, "insufficient proof of work"),
        }
    }
}

/// Errors that can occur during ledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Invalid transaction: signature verification failed")]
    InvalidTransaction,

    #[error("Chain integrity violation at block {index}: {reason}")]
    ChainIntegrityViolation {
        index: usize,
        reason: ViolationReason,
    },

    #[error("Chain is empty")]
    EmptyChain,

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Block error: {0}")]
    BlockError(#[from] BlockError),
}

/// The committed chain plus the pool of transactions waiting to be mined
#[derive(Debug, Clone)]
pub struct Ledger<C: CryptoProvider = Ed25519Sha256> {
    /// Committed blocks; index 0 is always the genesis block
    chain: Vec<Block>,

    /// Transactions waiting for the next block
    pending_transactions: Vec<Transaction>,

    /// Number of leading zeros required in a mined hash
    difficulty: usize,

    /// Amount minted to the miner of each block
    mining_reward: f64,

    crypto: C,
}

impl Ledger<Ed25519Sha256> {
    /// Creates a ledger with default parameters and SHA-256/ed25519 primitives
    pub fn new() -> Result<Self, LedgerError> {
        Self::with_config(LedgerConfig::default(), Ed25519Sha256)
    }
}

impl<C: CryptoProvider> Ledger<C> {
    /// Creates a ledger seeded with the genesis block
    pub fn with_config(config: LedgerConfig, crypto: C) -> Result<Self, LedgerError> {
        let genesis = Self::create_genesis_block(&crypto)?;

        info!(
            "Created ledger (difficulty {}, reward {}) with genesis {}",
            config.difficulty,
            config.mining_reward,
            genesis.hash()
        );

        Ok(Ledger {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            crypto,
        })
    }

    /// The fixed first block: sentinel link, no transactions, not mined
    pub fn create_genesis_block(crypto: &C) -> Result<Block, BlockError> {
        let timestamp = Utc
            .timestamp_opt(GENESIS_TIMESTAMP_SECS, 0)
            .single()
            .unwrap_or_default();

        BlockCandidate::new(Vec::new(), GENESIS_PREVIOUS_HASH.to_string())
            .with_timestamp(timestamp)
            .seal_unmined(crypto)
    }

    pub fn latest_block(&self) -> Result<&Block, LedgerError> {
        self.chain.last().ok_or(LedgerError::EmptyChain)
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Raw access to the committed blocks. Blocks can be edited in place but
    /// not added or removed; any edit shows up in [`Ledger::validate_chain`].
    pub fn chain_mut(&mut self) -> &mut [Block] {
        &mut self.chain
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    pub fn crypto(&self) -> &C {
        &self.crypto
    }

    /// Validates a submitted transfer and queues it for the next block.
    ///
    /// Sender balance is not checked; overspending is accepted.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), LedgerError> {
        if let Err(err) = self.check_submission(&transaction) {
            warn!("Rejected transaction: {}", err);
            return Err(err);
        }

        debug!(
            "Queued transfer of {} to {}",
            transaction.amount(),
            transaction.to()
        );
        self.pending_transactions.push(transaction);

        Ok(())
    }

    fn check_submission(&self, transaction: &Transaction) -> Result<(), LedgerError> {
        // Rewards are minted by the ledger, never submitted
        let from = transaction.from().ok_or_else(|| {
            LedgerError::MalformedTransaction("missing sender address".to_string())
        })?;

        if from.is_empty() {
            return Err(LedgerError::MalformedTransaction(
                "missing sender address".to_string(),
            ));
        }

        if transaction.to().is_empty() {
            return Err(LedgerError::MalformedTransaction(
                "missing recipient address".to_string(),
            ));
        }

        let amount = transaction.amount();
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::MalformedTransaction(format!(
                "invalid amount {}",
                amount
            )));
        }

        if !transaction.is_valid(&self.crypto)? {
            return Err(LedgerError::InvalidTransaction);
        }

        Ok(())
    }

    /// Mines all pending transactions plus a reward for `reward_address` into
    /// a new block and appends it.
    ///
    /// Afterwards the pool holds one fresh reward for the same address rather
    /// than being emptied, so that reward lands in the next block as well.
    pub fn mine_pending_transactions(
        &mut self,
        reward_address: &Address,
    ) -> Result<Block, LedgerError> {
        self.mine_with_token(reward_address, &CancellationToken::new())
    }

    /// Like [`Ledger::mine_pending_transactions`], but returns `Ok(None)` if
    /// `token` is cancelled first. A cancelled run leaves the chain and the
    /// pending pool untouched.
    pub fn mine_pending_transactions_until_cancelled(
        &mut self,
        reward_address: &Address,
        token: &CancellationToken,
    ) -> Result<Option<Block>, LedgerError> {
        match self.mine_with_token(reward_address, token) {
            Ok(block) => Ok(Some(block)),
            Err(LedgerError::BlockError(BlockError::MiningCancelled { attempts })) => {
                info!("Mining cancelled after {} attempts", attempts);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn mine_with_token(
        &mut self,
        reward_address: &Address,
        token: &CancellationToken,
    ) -> Result<Block, LedgerError> {
        let mut transactions = self.pending_transactions.clone();
        transactions.push(Transaction::reward(
            reward_address.clone(),
            self.mining_reward,
        ));

        let previous_hash = self.latest_block()?.hash().to_string();

        let block = BlockCandidate::new(transactions, previous_hash).mine_until_cancelled(
            self.difficulty,
            &self.crypto,
            token,
        )?;

        self.chain.push(block.clone());
        info!(
            "Block {} appended with {} transactions",
            self.chain.len() - 1,
            block.transactions().len()
        );

        self.pending_transactions = vec![Transaction::reward(
            reward_address.clone(),
            self.mining_reward,
        )];

        Ok(block)
    }

    /// Replays the committed chain: debits where `address` sent, credits where
    /// it received. Pending transactions are ignored.
    pub fn balance_of(&self, address: &Address) -> f64 {
        let mut balance = 0.0;

        for block in &self.chain {
            for transaction in block.transactions() {
                if transaction.from() == Some(address) {
                    balance -= transaction.amount();
                }

                if transaction.to() == address {
                    balance += transaction.amount();
                }
            }
        }

        balance
    }

    /// Re-verifies every block after genesis, reporting the first violation.
    ///
    /// Integrity failures come back as `ChainIntegrityViolation`; errors from
    /// the checks themselves, such as a transfer without a signature, are
    /// returned as they are.
    pub fn validate_chain(&self) -> Result<(), LedgerError> {
        for (offset, pair) in self.chain.windows(2).enumerate() {
            let (previous, current) = (&pair[0], &pair[1]);
            let index = offset + 1;

            let violation = |reason| LedgerError::ChainIntegrityViolation { index, reason };

            if !current.has_valid_transactions(&self.crypto)? {
                return Err(violation(ViolationReason::InvalidTransactions));
            }

            if current.hash() != current.compute_hash(&self.crypto)? {
                return Err(violation(ViolationReason::HashMismatch));
            }

            if current.previous_hash() != previous.hash() {
                return Err(violation(ViolationReason::BrokenLink));
            }

            if !current.meets_difficulty(self.difficulty) {
                return Err(violation(ViolationReason::InsufficientWork));
            }
        }

        Ok(())
    }

    /// Pass/fail view of [`Ledger::validate_chain`]
    pub fn is_chain_valid(&self) -> Result<bool, LedgerError> {
        match self.validate_chain() {
            Ok(()) => Ok(true),
            Err(LedgerError::ChainIntegrityViolation { index, reason }) => {
                warn!("Chain invalid at block {}: {}", index, reason);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }
}
