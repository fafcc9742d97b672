use anyhow::Context;
use log::{debug, info};

use pow_ledger::blockchain::{Ed25519Sha256, Ledger, LedgerConfig, Transaction, Wallet};

// Fixed demo key so repeated runs use the same wallet address
const DEMO_SECRET_KEY: &str = "60f1f04cb497169daf5b252e0b41205415a5056d5858e22e254f43369a54739e";

fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = LedgerConfig::from_env().context("failed to read ledger configuration")?;
    let mut ledger = Ledger::with_config(config, Ed25519Sha256)?;

    let secret = hex::decode(DEMO_SECRET_KEY).context("demo key is not valid hex")?;
    let wallet = Wallet::from_secret_key(&secret)?;
    info!("Wallet address: {}", wallet.address());
    debug!("Wallet secret key: {}", hex::encode(wallet.export_secret_key()));

    let recipient = Wallet::new()?;

    let mut transfer = Transaction::transfer(
        wallet.address().clone(),
        recipient.address().clone(),
        10.0,
    );
    transfer.sign(&wallet, ledger.crypto())?;
    ledger.add_transaction(transfer)?;

    info!("Starting the miner...");
    ledger.mine_pending_transactions(wallet.address())?;

    println!("Balance of {} is {}", wallet.address(), ledger.balance_of(wallet.address()));
    println!("Balance of {} is {}", recipient.address(), ledger.balance_of(recipient.address()));
    println!("Is chain valid? {}", ledger.is_chain_valid()?);

    // Rewrite the committed transfer behind the ledger's back
    if let Some(transaction) = ledger
        .chain_mut()
        .get_mut(1)
        .and_then(|block| block.transactions_mut().first_mut())
    {
        transaction.set_amount(1.0);
    }
    println!("Is chain valid after tampering? {}", ledger.is_chain_valid()?);

    Ok(())
}

