// Ledger engine
//
// - Cryptographic adapter (hashing, signing, verification)
// - Transactions (user transfers and mining rewards)
// - Blocks (hashing and proof of work)
// - Ledger (chain, pending pool, balances, validation)
// - Configuration

pub mod block;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod transaction;

pub use block::{Block, BlockCandidate, BlockError, CancellationToken};
pub use chain::{Ledger, LedgerError, ViolationReason};
pub use config::{ConfigError, LedgerConfig};
pub use crypto::{Address, CryptoProvider, DigitalSignature, Ed25519Sha256, SigningIdentity, Wallet};
pub use transaction::{Transaction, TransactionError};
