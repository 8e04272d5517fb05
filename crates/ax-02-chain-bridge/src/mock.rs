//! # Mock Chain Backend
//!
//! An in-memory chain behind the [`ChainBridge`] port, with real outpoint
//! spend tracking and secret reveal. Deposits, refunds and redeems created
//! here behave like their on-chain counterparts: a transaction is invisible
//! until broadcast, spending an unknown outpoint fails with missing-inputs,
//! a refund is rejected while its locktime is in the future, and a repeated
//! broadcast reports already-in-chain.

use crate::bridge::ChainBridge;
use crate::errors::{BridgeError, RpcErrorCode};
use crate::htlc::{build_htlc_script, script_hash, HtlcScriptParams};
use crate::types::{
    CreatedDeposit, DepositCheck, SecretProbe, SignedTx, TxInput, TxOutput, UtxoInfo, WalletInfo,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_crypto::{hash160, sha256d, Hash160, KeyPair, PublicKey, SwapSecret};
use shared_types::{Amount, Currency, Role, UtxoEntry, XAddress};
use std::collections::HashMap;
use std::sync::Arc;

/// Tuning knobs for a mock chain.
#[derive(Clone, Debug)]
pub struct MockChainConfig {
    /// Starting block height.
    pub start_height: u32,
    /// Locktime margin granted to the Maker (role A).
    pub maker_locktime_delta: u32,
    /// Locktime margin granted to the Taker (role B).
    pub taker_locktime_delta: u32,
    /// Accepted deviation when validating a counterparty locktime.
    pub locktime_drift: u32,
    /// Dust threshold.
    pub dust_threshold: Amount,
    /// Fee units charged per input in `min_tx_fee1`.
    pub fee_per_input: u64,
    /// Flat fee reserved for the follow-up spend (`min_tx_fee2`).
    pub fee2_units: u64,
}

impl Default for MockChainConfig {
    fn default() -> Self {
        Self {
            start_height: 100,
            maker_locktime_delta: 200,
            taker_locktime_delta: 150,
            locktime_drift: 10,
            dust_threshold: Amount::from_units(5_460),
            fee_per_input: 2_000,
            fee2_units: 10_000,
        }
    }
}

#[derive(Clone, Debug)]
struct MockOutput {
    address: String,
    amount: Amount,
}

#[derive(Clone, Debug)]
struct MockTx {
    txid: String,
    inputs: Vec<TxInput>,
    outputs: Vec<MockOutput>,
    lock_time: u32,
    reveal: Option<SwapSecret>,
}

#[derive(Default)]
struct MockChainState {
    height: u32,
    /// Confirmed transactions by id.
    confirmed: HashMap<String, MockTx>,
    /// Signed but not yet broadcast transactions, keyed by raw form.
    staged: HashMap<String, MockTx>,
    /// Spent outpoints and their spending transaction.
    spent: HashMap<(String, u32), String>,
    /// Unspent outputs by outpoint.
    utxos: HashMap<(String, u32), MockOutput>,
    /// Wallet address counter.
    next_address: u32,
    /// Forced failure for the next broadcast.
    fail_next_send: Option<RpcErrorCode>,
    /// When true, all RPC-like calls report the wallet as unreachable.
    wallet_down: bool,
}

/// Deterministic pseudo-signature a mock wallet produces over a UTXO
/// commitment; [`MockChainBridge::verify_utxo_signature`] checks it.
pub fn mock_utxo_signature(txid: &str, vout: u32) -> Vec<u8> {
    let digest = sha256d(format!("{txid}:{vout}").as_bytes());
    let mut signature = Vec::with_capacity(65);
    signature.extend_from_slice(&digest);
    signature.extend_from_slice(&digest);
    signature.push(0);
    signature
}

/// In-memory [`ChainBridge`] implementation for one currency.
pub struct MockChainBridge {
    currency: Currency,
    config: MockChainConfig,
    state: Arc<Mutex<MockChainState>>,
}

impl MockChainBridge {
    /// Create a mock chain for `currency` with default tuning.
    pub fn new(currency: Currency) -> Self {
        Self::with_config(currency, MockChainConfig::default())
    }

    /// Create a mock chain with explicit tuning.
    pub fn with_config(currency: Currency, config: MockChainConfig) -> Self {
        let state = MockChainState {
            height: config.start_height,
            ..Default::default()
        };
        Self {
            currency,
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn raw_for(txid: &str) -> String {
        format!("raw:{txid}")
    }

    fn txid_for(payload: &str) -> String {
        hex::encode(sha256d(payload.as_bytes()))
    }

    fn ensure_up(state: &MockChainState) -> Result<(), BridgeError> {
        if state.wallet_down {
            return Err(BridgeError::Unavailable("mock wallet down".to_string()));
        }
        Ok(())
    }

    // -------------------------------------------------------------------
    // Test-harness controls
    // -------------------------------------------------------------------

    /// Current height.
    pub fn height(&self) -> u32 {
        self.state.lock().height
    }

    /// Mine `n` empty blocks.
    pub fn advance_blocks(&self, n: u32) {
        self.state.lock().height += n;
    }

    /// Force the next `send_raw_transaction` to fail with `code`.
    pub fn fail_next_send(&self, code: RpcErrorCode) {
        self.state.lock().fail_next_send = Some(code);
    }

    /// Toggle wallet reachability.
    pub fn set_wallet_down(&self, down: bool) {
        self.state.lock().wallet_down = down;
    }

    /// Seed a confirmed wallet UTXO and return its order commitment.
    pub fn fund(&self, owner: &XAddress, amount: Amount) -> UtxoEntry {
        let mut state = self.state.lock();
        state.next_address += 1;
        let txid = Self::txid_for(&format!(
            "fund:{}:{}:{}",
            self.currency,
            state.next_address,
            amount.units()
        ));
        let address = self.render_address(owner);
        state.utxos.insert(
            (txid.clone(), 0),
            MockOutput {
                address,
                amount,
            },
        );
        state.confirmed.insert(
            txid.clone(),
            MockTx {
                txid: txid.clone(),
                inputs: vec![],
                outputs: vec![MockOutput {
                    address: self.render_address(owner),
                    amount,
                }],
                lock_time: 0,
                reveal: None,
            },
        );
        UtxoEntry {
            signature: mock_utxo_signature(&txid, 0),
            txid,
            vout: 0,
            raw_address: *owner,
            amount,
        }
    }

    /// Remove a UTXO, as if its owner double-spent it elsewhere.
    pub fn spend_elsewhere(&self, utxo: &UtxoEntry) {
        let mut state = self.state.lock();
        state.utxos.remove(&(utxo.txid.clone(), utxo.vout));
        state
            .spent
            .insert((utxo.txid.clone(), utxo.vout), "external".to_string());
    }

    /// A raw fee transaction the mock will accept for broadcast.
    pub fn make_fee_tx(&self, payer: &XAddress, amount: Amount) -> String {
        let txid = Self::txid_for(&format!(
            "fee:{}:{}:{}",
            self.currency,
            hex::encode(payer),
            amount.units()
        ));
        let tx = MockTx {
            txid: txid.clone(),
            inputs: vec![],
            outputs: vec![MockOutput {
                address: format!("{}:feepool", self.currency),
                amount,
            }],
            lock_time: 0,
            reveal: None,
        };
        let raw = Self::raw_for(&txid);
        self.state.lock().staged.insert(raw.clone(), tx);
        raw
    }

    /// Whether a transaction id is confirmed on the mock chain.
    pub fn is_confirmed(&self, txid: &str) -> bool {
        self.state.lock().confirmed.contains_key(txid)
    }

    fn render_address(&self, addr: &XAddress) -> String {
        format!("{}:{}", self.currency, hex::encode(addr))
    }

    fn stage(&self, tx: MockTx) -> String {
        let raw = Self::raw_for(&tx.txid);
        self.state.lock().staged.insert(raw.clone(), tx);
        raw
    }
}

#[async_trait]
impl ChainBridge for MockChainBridge {
    fn currency(&self) -> Currency {
        self.currency
    }

    fn coin_address(&self, addr: &XAddress) -> String {
        self.render_address(addr)
    }

    fn is_dust(&self, amount: Amount) -> bool {
        amount < self.config.dust_threshold
    }

    fn min_tx_fee1(&self, inputs: usize, outputs: usize) -> Amount {
        Amount::from_units(self.config.fee_per_input * inputs as u64 + 500 * outputs as u64)
    }

    fn min_tx_fee2(&self, _inputs: usize, _outputs: usize) -> Amount {
        Amount::from_units(self.config.fee2_units)
    }

    async fn lock_time(&self, role: Role) -> Result<u32, BridgeError> {
        let state = self.state.lock();
        Self::ensure_up(&state)?;
        let delta = match role {
            Role::Maker => self.config.maker_locktime_delta,
            Role::Taker => self.config.taker_locktime_delta,
        };
        Ok(state.height + delta)
    }

    async fn acceptable_lock_time_drift(
        &self,
        role: Role,
        candidate: u32,
    ) -> Result<bool, BridgeError> {
        if candidate == 0 {
            return Ok(false);
        }
        let expected = self.lock_time(role).await?;
        let drift = self.config.locktime_drift;
        Ok(candidate + drift >= expected && candidate <= expected + drift)
    }

    fn create_deposit_unlock_script(
        &self,
        owner: &PublicKey,
        counterparty: &PublicKey,
        hashed_secret: &Hash160,
        lock_time: u32,
    ) -> Vec<u8> {
        build_htlc_script(&HtlcScriptParams {
            owner: *owner,
            counterparty: *counterparty,
            hashed_secret: *hashed_secret,
            lock_time,
        })
    }

    fn script_p2sh_address(&self, script: &[u8]) -> String {
        format!("{}:p2sh:{}", self.currency, hex::encode(script_hash(script)))
    }

    async fn get_new_address(&self) -> Result<String, BridgeError> {
        let mut state = self.state.lock();
        Self::ensure_up(&state)?;
        state.next_address += 1;
        Ok(format!("{}:fresh{}", self.currency, state.next_address))
    }

    async fn get_info(&self) -> Result<WalletInfo, BridgeError> {
        let state = self.state.lock();
        Self::ensure_up(&state)?;
        Ok(WalletInfo {
            blocks: state.height,
        })
    }

    async fn get_tx_out(&self, utxo: &UtxoEntry) -> Result<Option<UtxoInfo>, BridgeError> {
        let state = self.state.lock();
        Self::ensure_up(&state)?;
        Ok(state
            .utxos
            .get(&(utxo.txid.clone(), utxo.vout))
            .map(|out| UtxoInfo {
                amount: out.amount,
                address: out.address.clone(),
            }))
    }

    async fn verify_utxo_signature(&self, utxo: &UtxoEntry) -> Result<bool, BridgeError> {
        let state = self.state.lock();
        Self::ensure_up(&state)?;
        Ok(utxo.signature == mock_utxo_signature(&utxo.txid, utxo.vout))
    }

    async fn create_deposit_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
    ) -> Result<CreatedDeposit, BridgeError> {
        {
            let state = self.state.lock();
            Self::ensure_up(&state)?;
        }
        let payload = format!(
            "deposit:{}:{:?}:{:?}",
            self.currency,
            inputs
                .iter()
                .map(|i| (i.txid.as_str(), i.vout))
                .collect::<Vec<_>>(),
            outputs
                .iter()
                .map(|o| (o.address.as_str(), o.amount.units()))
                .collect::<Vec<_>>()
        );
        let txid = Self::txid_for(&payload);
        let tx = MockTx {
            txid: txid.clone(),
            inputs: inputs.to_vec(),
            outputs: outputs
                .iter()
                .map(|o| MockOutput {
                    address: o.address.clone(),
                    amount: o.amount,
                })
                .collect(),
            lock_time: 0,
            reveal: None,
        };
        let raw_tx = self.stage(tx);
        Ok(CreatedDeposit {
            txid,
            vout: 0,
            raw_tx,
        })
    }

    async fn create_refund_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
        _keypair: &KeyPair,
        _lock_script: &[u8],
        lock_time: u32,
    ) -> Result<SignedTx, BridgeError> {
        {
            let state = self.state.lock();
            Self::ensure_up(&state)?;
        }
        let payload = format!(
            "refund:{}:{:?}:{}",
            self.currency,
            inputs
                .iter()
                .map(|i| (i.txid.as_str(), i.vout))
                .collect::<Vec<_>>(),
            lock_time
        );
        let txid = Self::txid_for(&payload);
        let tx = MockTx {
            txid: txid.clone(),
            inputs: inputs.to_vec(),
            outputs: outputs
                .iter()
                .map(|o| MockOutput {
                    address: o.address.clone(),
                    amount: o.amount,
                })
                .collect(),
            lock_time,
            reveal: None,
        };
        let raw_tx = self.stage(tx);
        Ok(SignedTx { txid, raw_tx })
    }

    async fn create_payment_transaction(
        &self,
        inputs: &[TxInput],
        outputs: &[TxOutput],
        _keypair: &KeyPair,
        secret: &SwapSecret,
        _unlock_script: &[u8],
    ) -> Result<SignedTx, BridgeError> {
        {
            let state = self.state.lock();
            Self::ensure_up(&state)?;
        }
        let payload = format!(
            "payment:{}:{:?}",
            self.currency,
            inputs
                .iter()
                .map(|i| (i.txid.as_str(), i.vout))
                .collect::<Vec<_>>()
        );
        let txid = Self::txid_for(&payload);
        let tx = MockTx {
            txid: txid.clone(),
            inputs: inputs.to_vec(),
            outputs: outputs
                .iter()
                .map(|o| MockOutput {
                    address: o.address.clone(),
                    amount: o.amount,
                })
                .collect(),
            lock_time: 0,
            reveal: Some(secret.clone()),
        };
        let raw_tx = self.stage(tx);
        Ok(SignedTx { txid, raw_tx })
    }

    async fn check_deposit_transaction(
        &self,
        txid: &str,
        expected_amount: Amount,
        expected_p2sh: &str,
    ) -> Result<Option<DepositCheck>, BridgeError> {
        let state = self.state.lock();
        Self::ensure_up(&state)?;
        let Some(tx) = state.confirmed.get(txid) else {
            return Ok(None);
        };
        for (vout, out) in tx.outputs.iter().enumerate() {
            if out.address == expected_p2sh {
                return Ok(Some(DepositCheck {
                    vout: vout as u32,
                    overpayment: out.amount.saturating_sub(expected_amount),
                    is_good: out.amount >= expected_amount,
                }));
            }
        }
        // Visible on-chain but paying some other script.
        Ok(Some(DepositCheck {
            vout: 0,
            overpayment: Amount::ZERO,
            is_good: false,
        }))
    }

    async fn get_secret_from_payment_transaction(
        &self,
        pay_txid: &str,
        deposit_txid: &str,
        deposit_vout: u32,
        hashed_secret: &Hash160,
    ) -> Result<SecretProbe, BridgeError> {
        let state = self.state.lock();
        Self::ensure_up(&state)?;
        let Some(tx) = state.confirmed.get(pay_txid) else {
            return Ok(SecretProbe::NotFound);
        };
        let spends_deposit = tx
            .inputs
            .iter()
            .any(|i| i.txid == deposit_txid && i.vout == deposit_vout);
        if !spends_deposit {
            return Ok(SecretProbe::NotFound);
        }
        match &tx.reveal {
            Some(secret) if hash160(secret.expose()) == *hashed_secret => {
                Ok(SecretProbe::Found(secret.clone()))
            }
            _ => Ok(SecretProbe::Mismatch),
        }
    }

    async fn find_spend_of(
        &self,
        txid: &str,
        vout: u32,
        _from_block: u32,
    ) -> Result<Option<String>, BridgeError> {
        let state = self.state.lock();
        Self::ensure_up(&state)?;
        Ok(state.spent.get(&(txid.to_string(), vout)).cloned())
    }

    async fn send_raw_transaction(&self, raw_tx: &str) -> Result<String, BridgeError> {
        let mut state = self.state.lock();
        Self::ensure_up(&state)?;

        if let Some(code) = state.fail_next_send.take() {
            return Err(BridgeError::rpc(code, "forced failure"));
        }

        let Some(tx) = state.staged.get(raw_tx).cloned() else {
            return Err(BridgeError::rpc(
                RpcErrorCode::MiscError,
                "unknown raw transaction",
            ));
        };

        if state.confirmed.contains_key(&tx.txid) {
            return Err(BridgeError::rpc(
                RpcErrorCode::VerifyAlreadyInChain,
                "transaction already in chain",
            ));
        }

        if tx.lock_time > 0 && state.height < tx.lock_time {
            return Err(BridgeError::rpc(
                RpcErrorCode::VerifyRejected,
                format!("non-final until block {}", tx.lock_time),
            ));
        }

        for input in &tx.inputs {
            let key = (input.txid.clone(), input.vout);
            if !state.utxos.contains_key(&key) {
                return Err(BridgeError::rpc(RpcErrorCode::VerifyError, "missing inputs"));
            }
        }

        for input in &tx.inputs {
            let key = (input.txid.clone(), input.vout);
            state.utxos.remove(&key);
            state.spent.insert(key, tx.txid.clone());
        }
        for (vout, out) in tx.outputs.iter().enumerate() {
            state
                .utxos
                .insert((tx.txid.clone(), vout as u32), out.clone());
        }
        let txid = tx.txid.clone();
        state.confirmed.insert(txid.clone(), tx);
        Ok(txid)
    }
}
