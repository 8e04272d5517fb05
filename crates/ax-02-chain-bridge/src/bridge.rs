//! # ChainBridge Port
//!
//! Outbound port implemented once per supported currency. Every method that
//! can touch the wallet RPC is async and may block for seconds or fail
//! transiently; the session layer routes such failures through the watchdog.

use crate::errors::BridgeError;
use crate::types::{
    CreatedDeposit, DepositCheck, SecretProbe, SignedTx, TxInput, TxOutput, UtxoInfo, WalletInfo,
};
use async_trait::async_trait;
use shared_crypto::{Hash160, KeyPair, PublicKey, SwapSecret};
use shared_types::{Amount, Currency, Role, UtxoEntry, XAddress};

/// Per-currency wallet driver.
#[async_trait]
pub trait ChainBridge: Send + Sync {
    /// Currency this driver serves.
    fn currency(&self) -> Currency;

    /// Render a 20-byte protocol address in the chain's string form.
    fn coin_address(&self, addr: &XAddress) -> String;

    /// Dust check, using the chain-supplied threshold.
    fn is_dust(&self, amount: Amount) -> bool;

    /// Fee for a transaction with the given input/output counts.
    fn min_tx_fee1(&self, inputs: usize, outputs: usize) -> Amount;

    /// Fee reserved for the follow-up spend of the deposit output.
    fn min_tx_fee2(&self, inputs: usize, outputs: usize) -> Amount;

    /// Conservative absolute locktime (block height) for the given role.
    ///
    /// The Maker's locktime must exceed the Taker's by a safe margin.
    async fn lock_time(&self, role: Role) -> Result<u32, BridgeError>;

    /// Validate a counterparty's claimed locktime against local policy.
    async fn acceptable_lock_time_drift(
        &self,
        role: Role,
        candidate: u32,
    ) -> Result<bool, BridgeError>;

    /// Build the HTLC redeem script for a deposit.
    fn create_deposit_unlock_script(
        &self,
        owner: &PublicKey,
        counterparty: &PublicKey,
        hashed_secret: &Hash160,
        lock_time: u32,
    ) -> Vec<u8>;

    /// P2SH address string for a redeem script.
    fn script_p2sh_address(&self, script: &[u8]) -> String;

    /// Request a fresh wallet address (refund destination).
    async fn get_new_address(&self) -> Result<String, BridgeError>;

    /// Chain status snapshot.
    async fn get_info(&self) -> Result<WalletInfo, BridgeError>;

    /// Query an unspent output; `None` when missing or already spent.
    async fn get_tx_out(&self, utxo: &UtxoEntry) -> Result<Option<UtxoInfo>, BridgeError>;

    /// Verify the wallet signature committing a UTXO to an order.
    async fn verify_utxo_signature(&self, utxo: &UtxoEntry) -> Result<bool, BridgeError>;

    /// Build and sign the deposit funding the HTLC P2SH output.
    async fn create_deposit_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
    ) -> Result<CreatedDeposit, BridgeError>;

    /// Pre-sign the refund spending the deposit after `lock_time`.
    async fn create_refund_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
        keypair: &KeyPair,
        lock_script: &[u8],
        lock_time: u32,
    ) -> Result<SignedTx, BridgeError>;

    /// Sign the redeem spending the counterparty deposit with the secret.
    async fn create_payment_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
        keypair: &KeyPair,
        secret: &SwapSecret,
        unlock_script: &[u8],
    ) -> Result<SignedTx, BridgeError>;

    /// Verify a counterparty deposit pays the expected HTLC.
    ///
    /// `Ok(None)` means the transaction is not visible on-chain yet and the
    /// caller should retry later.
    async fn check_deposit_transaction(
        &self,
        txid: &str,
        expected_amount: Amount,
        expected_p2sh: &str,
    ) -> Result<Option<DepositCheck>, BridgeError>;

    /// Extract the secret from the counterparty's spend of our deposit.
    async fn get_secret_from_payment_transaction(
        &self,
        pay_txid: &str,
        deposit_txid: &str,
        deposit_vout: u32,
        hashed_secret: &Hash160,
    ) -> Result<SecretProbe, BridgeError>;

    /// Scan for any spend of the given outpoint (watcher fallback path).
    async fn find_spend_of(
        &self,
        txid: &str,
        vout: u32,
        from_block: u32,
    ) -> Result<Option<String>, BridgeError>;

    /// Broadcast a raw transaction, returning its id.
    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, BridgeError>;
}
