//! A minimal single-node proof-of-work ledger.

pub mod blockchain;

pub use blockchain::{Address, Block, Ledger, LedgerConfig, Transaction, Wallet};
