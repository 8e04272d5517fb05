//! # Typed Payloads
//!
//! One struct per swap command, decoded exactly once at the codec boundary.
//! Handlers downstream match on [`Message`] instead of reading raw offsets,
//! which keeps the state machine exhaustive over the command set.
//!
//! Layout reference (all integers little endian):
//!
//! - hash: 32 bytes, addr: 20 bytes, pubkey: 33 bytes, sig: 65 bytes
//! - currency: 8 bytes, zero padded ASCII
//! - transaction ids inside UTXO records travel as raw 32 bytes; ids in
//!   later messages travel as zero-terminated hex strings

use crate::codec::{Reader, Writer};
use crate::command::Command;
use crate::errors::WireError;
use crate::packet::Packet;
use shared_crypto::{Hash160, PublicKey, SIGNATURE_SIZE};
use shared_types::{Amount, Currency, OrderId, TxCancelReason, UtxoEntry, XAddress, ADDRESS_SIZE};

/// Wire size of one UTXO record: txid32 + vout4 + addr20 + sig65.
pub const UTXO_RECORD_SIZE: usize = 32 + 4 + ADDRESS_SIZE + SIGNATURE_SIZE;

fn read_address(r: &mut Reader<'_>, what: &'static str) -> Result<XAddress, WireError> {
    r.array::<ADDRESS_SIZE>(what)
}

fn read_order_id(r: &mut Reader<'_>, what: &'static str) -> Result<OrderId, WireError> {
    Ok(OrderId::from_bytes(r.array::<32>(what)?))
}

fn read_pubkey(r: &mut Reader<'_>, what: &'static str) -> Result<PublicKey, WireError> {
    PublicKey::from_slice(r.take(33, what)?).map_err(|_| WireError::BadPublicKey)
}

fn read_utxos(r: &mut Reader<'_>) -> Result<Vec<UtxoEntry>, WireError> {
    let count = r.u32("utxo count")? as usize;
    let mut utxos = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        if r.remaining() < UTXO_RECORD_SIZE {
            return Err(WireError::OutOfBounds("utxo record"));
        }
        let txid = r.txid32("utxo txid")?;
        let vout = r.u32("utxo vout")?;
        let raw_address = read_address(r, "utxo address")?;
        let signature = r.take(SIGNATURE_SIZE, "utxo signature")?.to_vec();
        utxos.push(UtxoEntry {
            txid,
            vout,
            raw_address,
            amount: Amount::ZERO,
            signature,
        });
    }
    Ok(utxos)
}

fn write_utxos(w: &mut Writer, utxos: &[UtxoEntry]) -> Result<(), WireError> {
    w.u32(utxos.len() as u32);
    for utxo in utxos {
        w.txid32(&utxo.txid, "utxo txid")?;
        w.u32(utxo.vout);
        w.bytes(&utxo.raw_address);
        if utxo.signature.len() != SIGNATURE_SIZE {
            return Err(WireError::OutOfBounds("utxo signature"));
        }
        w.bytes(&utxo.signature);
    }
    Ok(())
}

/// `Transaction`: a Maker publishing a new order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionBody {
    /// Canonical order id.
    pub id: OrderId,
    /// Maker source address on the source chain.
    pub src_addr: XAddress,
    /// Source currency.
    pub src_currency: Currency,
    /// Amount offered.
    pub src_amount: Amount,
    /// Maker destination address on the destination chain.
    pub dst_addr: XAddress,
    /// Destination currency.
    pub dst_currency: Currency,
    /// Amount wanted.
    pub dst_amount: Amount,
    /// Creation timestamp (unix seconds).
    pub timestamp: u64,
    /// Source-chain tip hash at creation (anti-replay anchor).
    pub anchor: [u8; 32],
    /// UTXOs funding the order.
    pub utxos: Vec<UtxoEntry>,
}

impl TransactionBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = Writer::new();
        w.bytes(self.id.as_bytes())
            .bytes(&self.src_addr)
            .currency(self.src_currency)
            .amount(self.src_amount)
            .bytes(&self.dst_addr)
            .currency(self.dst_currency)
            .amount(self.dst_amount)
            .u64(self.timestamp)
            .bytes(&self.anchor);
        write_utxos(&mut w, &self.utxos)?;
        Ok(w.into_bytes())
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            id: read_order_id(&mut r, "order id")?,
            src_addr: read_address(&mut r, "src addr")?,
            src_currency: r.currency("src currency")?,
            src_amount: r.amount("src amount")?,
            dst_addr: read_address(&mut r, "dst addr")?,
            dst_currency: r.currency("dst currency")?,
            dst_amount: r.amount("dst amount")?,
            timestamp: r.u64("timestamp")?,
            anchor: r.array::<32>("anchor hash")?,
            utxos: read_utxos(&mut r)?,
        })
    }
}

/// `PendingTransaction`: hub re-broadcast of a validated order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingTransactionBody {
    /// Order id.
    pub id: OrderId,
    /// Source currency.
    pub src_currency: Currency,
    /// Amount offered.
    pub src_amount: Amount,
    /// Destination currency.
    pub dst_currency: Currency,
    /// Amount wanted.
    pub dst_amount: Amount,
    /// Hub session address for replies.
    pub hub_address: XAddress,
    /// Order creation timestamp.
    pub timestamp: u64,
    /// Anti-replay anchor hash.
    pub anchor: [u8; 32],
}

impl PendingTransactionBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(self.id.as_bytes())
            .currency(self.src_currency)
            .amount(self.src_amount)
            .currency(self.dst_currency)
            .amount(self.dst_amount)
            .bytes(&self.hub_address)
            .u64(self.timestamp)
            .bytes(&self.anchor);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            id: read_order_id(&mut r, "order id")?,
            src_currency: r.currency("src currency")?,
            src_amount: r.amount("src amount")?,
            dst_currency: r.currency("dst currency")?,
            dst_amount: r.amount("dst amount")?,
            hub_address: read_address(&mut r, "hub addr")?,
            timestamp: r.u64("timestamp")?,
            anchor: r.array::<32>("anchor hash")?,
        })
    }
}

/// `TransactionAccepting`: a Taker joining an order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptingBody {
    /// Hub session address this acceptance is directed at.
    pub hub_address: XAddress,
    /// Order id being accepted.
    pub id: OrderId,
    /// Taker source address.
    pub src_addr: XAddress,
    /// Taker source currency (the order's destination currency).
    pub src_currency: Currency,
    /// Amount the Taker pays.
    pub src_amount: Amount,
    /// Taker destination address.
    pub dst_addr: XAddress,
    /// Currency the Taker receives.
    pub dst_currency: Currency,
    /// Amount the Taker receives.
    pub dst_amount: Amount,
    /// UTXOs funding the acceptance.
    pub utxos: Vec<UtxoEntry>,
}

impl AcceptingBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .bytes(&self.src_addr)
            .currency(self.src_currency)
            .amount(self.src_amount)
            .bytes(&self.dst_addr)
            .currency(self.dst_currency)
            .amount(self.dst_amount);
        write_utxos(&mut w, &self.utxos)?;
        Ok(w.into_bytes())
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            src_addr: read_address(&mut r, "src addr")?,
            src_currency: r.currency("src currency")?,
            src_amount: r.amount("src amount")?,
            dst_addr: read_address(&mut r, "dst addr")?,
            dst_currency: r.currency("dst currency")?,
            dst_amount: r.amount("dst amount")?,
            utxos: read_utxos(&mut r)?,
        })
    }
}

/// `TransactionHold`: hub freezing an order pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoldBody {
    /// Hub session address.
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
}

impl HoldBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address).bytes(self.id.as_bytes());
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
        })
    }
}

/// `TransactionHoldApply`: trader acknowledging a hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoldApplyBody {
    /// Hub session address (routing prefix).
    pub hub_address: XAddress,
    /// The acknowledging trader's source address.
    pub from: XAddress,
    /// Order id.
    pub id: OrderId,
}

impl HoldApplyBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(&self.from)
            .bytes(self.id.as_bytes());
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            from: read_address(&mut r, "from addr")?,
            id: read_order_id(&mut r, "order id")?,
        })
    }
}

/// `TransactionInit`: hub sending swap parameters to one trader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitBody {
    /// Receiving trader's destination address (routing prefix).
    pub dest: XAddress,
    /// Hub session address.
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Trader's source address.
    pub from: XAddress,
    /// Trader's source currency.
    pub from_currency: Currency,
    /// Amount the trader pays.
    pub from_amount: Amount,
    /// Trader's destination address.
    pub to: XAddress,
    /// Currency the trader receives.
    pub to_currency: Currency,
    /// Amount the trader receives.
    pub to_amount: Amount,
}

impl InitBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.dest)
            .bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .bytes(&self.from)
            .currency(self.from_currency)
            .amount(self.from_amount)
            .bytes(&self.to)
            .currency(self.to_currency)
            .amount(self.to_amount);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            dest: read_address(&mut r, "dest addr")?,
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            from: read_address(&mut r, "from addr")?,
            from_currency: r.currency("from currency")?,
            from_amount: r.amount("from amount")?,
            to: read_address(&mut r, "to addr")?,
            to_currency: r.currency("to currency")?,
            to_amount: r.amount("to amount")?,
        })
    }
}

/// `TransactionInitialized`: trader acknowledging init.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitializedBody {
    /// Hub session address (routing prefix).
    pub hub_address: XAddress,
    /// The acknowledging trader's source address.
    pub from: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Service-fee transaction id (zero for the Maker).
    pub fee_txid: [u8; 32],
}

impl InitializedBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(&self.from)
            .bytes(self.id.as_bytes())
            .bytes(&self.fee_txid);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            from: read_address(&mut r, "from addr")?,
            id: read_order_id(&mut r, "order id")?,
            fee_txid: r.array::<32>("fee txid")?,
        })
    }
}

/// `TransactionCreateA`: hub instructing the Maker to deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateABody {
    /// Hub session address.
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Taker's per-order public key.
    pub counterparty_pubkey: PublicKey,
}

impl CreateABody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .bytes(self.counterparty_pubkey.as_bytes());
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            counterparty_pubkey: read_pubkey(&mut r, "counterparty pubkey")?,
        })
    }
}

/// `TransactionCreatedA`: Maker reporting its deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedABody {
    /// Hub session address (routing prefix).
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Maker deposit transaction id (hex).
    pub bin_txid: String,
    /// HASH-160 of the swap secret.
    pub hashed_secret: Hash160,
    /// Maker-side locktime (absolute block height).
    pub locktime_a: u32,
    /// Pre-signed refund transaction id (hex).
    pub ref_txid: String,
    /// Pre-signed refund transaction (raw hex).
    pub ref_tx: String,
}

impl CreatedABody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .cstring(&self.bin_txid)
            .bytes(&self.hashed_secret)
            .u32(self.locktime_a)
            .cstring(&self.ref_txid)
            .cstring(&self.ref_tx);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            bin_txid: r.cstring("bin txid")?,
            hashed_secret: r.array::<20>("hashed secret")?,
            locktime_a: r.u32("locktime a")?,
            ref_txid: r.cstring("ref txid")?,
            ref_tx: r.cstring("ref tx")?,
        })
    }
}

/// `TransactionCreateB`: hub instructing the Taker to deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateBBody {
    /// Hub session address.
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Maker's per-order public key.
    pub counterparty_pubkey: PublicKey,
    /// Maker deposit transaction id (hex).
    pub a_bin_txid: String,
    /// HASH-160 of the swap secret, fixed by the Maker's script.
    pub hashed_secret: Hash160,
    /// Maker-side locktime for drift validation.
    pub locktime_a: u32,
}

impl CreateBBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .bytes(self.counterparty_pubkey.as_bytes())
            .cstring(&self.a_bin_txid)
            .bytes(&self.hashed_secret)
            .u32(self.locktime_a);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            counterparty_pubkey: read_pubkey(&mut r, "counterparty pubkey")?,
            a_bin_txid: r.cstring("a bin txid")?,
            hashed_secret: r.array::<20>("hashed secret")?,
            locktime_a: r.u32("locktime a")?,
        })
    }
}

/// `TransactionCreatedB`: Taker reporting its deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedBBody {
    /// Hub session address (routing prefix).
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Taker deposit transaction id (hex).
    pub bin_txid: String,
    /// Taker-side locktime (absolute block height).
    pub locktime_b: u32,
    /// Pre-signed refund transaction id (hex).
    pub ref_txid: String,
    /// Pre-signed refund transaction (raw hex).
    pub ref_tx: String,
}

impl CreatedBBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .cstring(&self.bin_txid)
            .u32(self.locktime_b)
            .cstring(&self.ref_txid)
            .cstring(&self.ref_tx);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            bin_txid: r.cstring("bin txid")?,
            locktime_b: r.u32("locktime b")?,
            ref_txid: r.cstring("ref txid")?,
            ref_tx: r.cstring("ref tx")?,
        })
    }
}

/// `TransactionConfirmA`: hub instructing the Maker to redeem B's deposit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmABody {
    /// Hub session address.
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Taker deposit transaction id (hex).
    pub b_bin_txid: String,
    /// Taker-side locktime for drift validation.
    pub locktime_b: u32,
}

impl ConfirmABody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .cstring(&self.b_bin_txid)
            .u32(self.locktime_b);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            b_bin_txid: r.cstring("b bin txid")?,
            locktime_b: r.u32("locktime b")?,
        })
    }
}

/// `TransactionConfirmedA`: Maker reporting its redeem transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedABody {
    /// Hub session address (routing prefix).
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Maker redeem transaction id on chain B (hex).
    pub pay_txid: String,
}

impl ConfirmedABody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .cstring(&self.pay_txid);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            pay_txid: r.cstring("pay txid")?,
        })
    }
}

/// `TransactionConfirmB`: hub passing the Maker's redeem hint to the Taker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmBBody {
    /// Hub session address.
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Maker redeem transaction id on chain B (hex).
    pub a_pay_txid: String,
}

impl ConfirmBBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .cstring(&self.a_pay_txid);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            a_pay_txid: r.cstring("a pay txid")?,
        })
    }
}

/// `TransactionConfirmedB`: Taker reporting its redeem transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedBBody {
    /// Hub session address (routing prefix).
    pub hub_address: XAddress,
    /// Order id.
    pub id: OrderId,
    /// Taker redeem transaction id on chain A (hex).
    pub pay_txid: String,
}

impl ConfirmedBBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(&self.hub_address)
            .bytes(self.id.as_bytes())
            .cstring(&self.pay_txid);
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            hub_address: read_address(&mut r, "hub addr")?,
            id: read_order_id(&mut r, "order id")?,
            pay_txid: r.cstring("pay txid")?,
        })
    }
}

/// `TransactionCancel`: abort with a reason code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelBody {
    /// Order id.
    pub id: OrderId,
    /// Reason code.
    pub reason: TxCancelReason,
}

impl CancelBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.bytes(self.id.as_bytes()).u32(self.reason.code());
        w.into_bytes()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            id: read_order_id(&mut r, "order id")?,
            reason: TxCancelReason::from_code(r.u32("reason")?),
        })
    }
}

/// `TransactionFinished`: hub announcing a completed swap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinishedBody {
    /// Order id.
    pub id: OrderId,
}

impl FinishedBody {
    /// Encode to payload bytes.
    pub fn encode(&self) -> Vec<u8> {
        self.id.as_bytes().to_vec()
    }

    /// Decode from payload bytes.
    pub fn decode(body: &[u8]) -> Result<Self, WireError> {
        let mut r = Reader::new(body);
        Ok(Self {
            id: read_order_id(&mut r, "order id")?,
        })
    }
}

/// A decoded packet: command tag plus typed payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    /// No-op sink.
    Invalid,
    /// Opaque announcement (no-op handler).
    Announce,
    /// Opaque chat relay (no-op handler).
    XChatMessage,
    /// Opaque liveness ping (no-op handler).
    ServicesPing,
    /// New order from a Maker.
    Transaction(TransactionBody),
    /// Hub re-broadcast of a pending order.
    PendingTransaction(PendingTransactionBody),
    /// Taker acceptance.
    TransactionAccepting(AcceptingBody),
    /// Trader hold acknowledgement.
    TransactionHoldApply(HoldApplyBody),
    /// Hub hold.
    TransactionHold(HoldBody),
    /// Hub init parameters.
    TransactionInit(InitBody),
    /// Trader init acknowledgement.
    TransactionInitialized(InitializedBody),
    /// Hub create instruction to the Maker.
    TransactionCreateA(CreateABody),
    /// Hub create instruction to the Taker.
    TransactionCreateB(CreateBBody),
    /// Maker deposit report.
    TransactionCreatedA(CreatedABody),
    /// Taker deposit report.
    TransactionCreatedB(CreatedBBody),
    /// Hub confirm instruction to the Maker.
    TransactionConfirmA(ConfirmABody),
    /// Hub confirm instruction to the Taker.
    TransactionConfirmB(ConfirmBBody),
    /// Maker redeem report.
    TransactionConfirmedA(ConfirmedABody),
    /// Taker redeem report.
    TransactionConfirmedB(ConfirmedBBody),
    /// Abort with reason.
    TransactionCancel(CancelBody),
    /// Swap complete.
    TransactionFinished(FinishedBody),
}

impl Message {
    /// Decode a packet's payload, enforcing the command's size rule first.
    pub fn decode(packet: &Packet) -> Result<Self, WireError> {
        let command = packet.command();
        let body = packet.body();
        if !command.size_rule().allows(body.len()) {
            return Err(WireError::BadPayloadSize {
                command: command.name(),
                got: body.len(),
            });
        }
        Ok(match command {
            Command::Invalid => Self::Invalid,
            Command::Announce => Self::Announce,
            Command::XChatMessage => Self::XChatMessage,
            Command::ServicesPing => Self::ServicesPing,
            Command::Transaction => Self::Transaction(TransactionBody::decode(body)?),
            Command::PendingTransaction => {
                Self::PendingTransaction(PendingTransactionBody::decode(body)?)
            }
            Command::TransactionAccepting => {
                Self::TransactionAccepting(AcceptingBody::decode(body)?)
            }
            Command::TransactionHoldApply => {
                Self::TransactionHoldApply(HoldApplyBody::decode(body)?)
            }
            Command::TransactionHold => Self::TransactionHold(HoldBody::decode(body)?),
            Command::TransactionInit => Self::TransactionInit(InitBody::decode(body)?),
            Command::TransactionInitialized => {
                Self::TransactionInitialized(InitializedBody::decode(body)?)
            }
            Command::TransactionCreateA => Self::TransactionCreateA(CreateABody::decode(body)?),
            Command::TransactionCreateB => Self::TransactionCreateB(CreateBBody::decode(body)?),
            Command::TransactionCreatedA => {
                Self::TransactionCreatedA(CreatedABody::decode(body)?)
            }
            Command::TransactionCreatedB => {
                Self::TransactionCreatedB(CreatedBBody::decode(body)?)
            }
            Command::TransactionConfirmA => Self::TransactionConfirmA(ConfirmABody::decode(body)?),
            Command::TransactionConfirmB => Self::TransactionConfirmB(ConfirmBBody::decode(body)?),
            Command::TransactionConfirmedA => {
                Self::TransactionConfirmedA(ConfirmedABody::decode(body)?)
            }
            Command::TransactionConfirmedB => {
                Self::TransactionConfirmedB(ConfirmedBBody::decode(body)?)
            }
            Command::TransactionCancel => Self::TransactionCancel(CancelBody::decode(body)?),
            Command::TransactionFinished => Self::TransactionFinished(FinishedBody::decode(body)?),
        })
    }

    /// The order this message concerns, when it carries one.
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Self::Invalid | Self::Announce | Self::XChatMessage | Self::ServicesPing => None,
            Self::Transaction(b) => Some(b.id),
            Self::PendingTransaction(b) => Some(b.id),
            Self::TransactionAccepting(b) => Some(b.id),
            Self::TransactionHoldApply(b) => Some(b.id),
            Self::TransactionHold(b) => Some(b.id),
            Self::TransactionInit(b) => Some(b.id),
            Self::TransactionInitialized(b) => Some(b.id),
            Self::TransactionCreateA(b) => Some(b.id),
            Self::TransactionCreateB(b) => Some(b.id),
            Self::TransactionCreatedA(b) => Some(b.id),
            Self::TransactionCreatedB(b) => Some(b.id),
            Self::TransactionConfirmA(b) => Some(b.id),
            Self::TransactionConfirmB(b) => Some(b.id),
            Self::TransactionConfirmedA(b) => Some(b.id),
            Self::TransactionConfirmedB(b) => Some(b.id),
            Self::TransactionCancel(b) => Some(b.id),
            Self::TransactionFinished(b) => Some(b.id),
        }
    }

    /// The command this message travels under.
    pub fn command(&self) -> Command {
        match self {
            Self::Invalid => Command::Invalid,
            Self::Announce => Command::Announce,
            Self::XChatMessage => Command::XChatMessage,
            Self::ServicesPing => Command::ServicesPing,
            Self::Transaction(_) => Command::Transaction,
            Self::PendingTransaction(_) => Command::PendingTransaction,
            Self::TransactionAccepting(_) => Command::TransactionAccepting,
            Self::TransactionHoldApply(_) => Command::TransactionHoldApply,
            Self::TransactionHold(_) => Command::TransactionHold,
            Self::TransactionInit(_) => Command::TransactionInit,
            Self::TransactionInitialized(_) => Command::TransactionInitialized,
            Self::TransactionCreateA(_) => Command::TransactionCreateA,
            Self::TransactionCreateB(_) => Command::TransactionCreateB,
            Self::TransactionCreatedA(_) => Command::TransactionCreatedA,
            Self::TransactionCreatedB(_) => Command::TransactionCreatedB,
            Self::TransactionConfirmA(_) => Command::TransactionConfirmA,
            Self::TransactionConfirmB(_) => Command::TransactionConfirmB,
            Self::TransactionConfirmedA(_) => Command::TransactionConfirmedA,
            Self::TransactionConfirmedB(_) => Command::TransactionConfirmedB,
            Self::TransactionCancel(_) => Command::TransactionCancel,
            Self::TransactionFinished(_) => Command::TransactionFinished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::KeyPair;

    fn addr(byte: u8) -> XAddress {
        [byte; 20]
    }

    fn sample_utxo(seed: u8) -> UtxoEntry {
        UtxoEntry {
            txid: hex::encode([seed; 32]),
            vout: seed as u32,
            raw_address: addr(seed),
            amount: Amount::ZERO,
            signature: vec![seed; SIGNATURE_SIZE],
        }
    }

    fn sample_pubkey() -> PublicKey {
        KeyPair::generate().public_key()
    }

    fn roundtrip(command: Command, body: Vec<u8>) -> Message {
        let keypair = KeyPair::generate();
        let packet = Packet::signed(command, body, &keypair).unwrap();
        let reencoded = Packet::decode(&packet.encode()).unwrap();
        Message::decode(&reencoded).unwrap()
    }

    #[test]
    fn test_transaction_roundtrip() {
        let body = TransactionBody {
            id: OrderId::from_bytes([1; 32]),
            src_addr: addr(2),
            src_currency: Currency::new("BLOCK").unwrap(),
            src_amount: Amount::from_coins(10),
            dst_addr: addr(3),
            dst_currency: Currency::new("LTC").unwrap(),
            dst_amount: Amount::from_coins(1),
            timestamp: 1_700_000_000,
            anchor: [4; 32],
            utxos: vec![sample_utxo(5), sample_utxo(6)],
        };
        let msg = roundtrip(Command::Transaction, body.encode().unwrap());
        assert_eq!(msg, Message::Transaction(body));
    }

    #[test]
    fn test_pending_transaction_exact_size() {
        let body = PendingTransactionBody {
            id: OrderId::from_bytes([1; 32]),
            src_currency: Currency::new("BLOCK").unwrap(),
            src_amount: Amount::from_coins(10),
            dst_currency: Currency::new("LTC").unwrap(),
            dst_amount: Amount::from_coins(1),
            hub_address: addr(9),
            timestamp: 1_700_000_000,
            anchor: [4; 32],
        };
        let encoded = body.encode();
        assert_eq!(encoded.len(), 124);
        let msg = roundtrip(Command::PendingTransaction, encoded);
        assert_eq!(msg, Message::PendingTransaction(body));
    }

    #[test]
    fn test_accepting_roundtrip() {
        let body = AcceptingBody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            src_addr: addr(3),
            src_currency: Currency::new("LTC").unwrap(),
            src_amount: Amount::from_coins(1),
            dst_addr: addr(4),
            dst_currency: Currency::new("BLOCK").unwrap(),
            dst_amount: Amount::from_coins(10),
            utxos: vec![sample_utxo(5)],
        };
        let msg = roundtrip(Command::TransactionAccepting, body.encode().unwrap());
        assert_eq!(msg, Message::TransactionAccepting(body));
    }

    #[test]
    fn test_hold_exact_size_boundary() {
        let body = HoldBody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
        };
        let encoded = body.encode();
        assert_eq!(encoded.len(), 52);
        let msg = roundtrip(Command::TransactionHold, encoded.clone());
        assert_eq!(msg, Message::TransactionHold(body));

        // One byte fewer must fail the size rule.
        let keypair = KeyPair::generate();
        let short = Packet::signed(
            Command::TransactionHold,
            encoded[..51].to_vec(),
            &keypair,
        )
        .unwrap();
        assert!(matches!(
            Message::decode(&short),
            Err(WireError::BadPayloadSize { .. })
        ));
    }

    #[test]
    fn test_hold_apply_exact_size() {
        let body = HoldApplyBody {
            hub_address: addr(1),
            from: addr(2),
            id: OrderId::from_bytes([3; 32]),
        };
        assert_eq!(body.encode().len(), 72);
        let msg = roundtrip(Command::TransactionHoldApply, body.encode());
        assert_eq!(msg, Message::TransactionHoldApply(body));
    }

    #[test]
    fn test_init_exact_size() {
        let body = InitBody {
            dest: addr(1),
            hub_address: addr(2),
            id: OrderId::from_bytes([3; 32]),
            from: addr(4),
            from_currency: Currency::new("BLOCK").unwrap(),
            from_amount: Amount::from_coins(10),
            to: addr(5),
            to_currency: Currency::new("LTC").unwrap(),
            to_amount: Amount::from_coins(1),
        };
        assert_eq!(body.encode().len(), 144);
        let msg = roundtrip(Command::TransactionInit, body.encode());
        assert_eq!(msg, Message::TransactionInit(body));
    }

    #[test]
    fn test_initialized_exact_size() {
        let body = InitializedBody {
            hub_address: addr(1),
            from: addr(2),
            id: OrderId::from_bytes([3; 32]),
            fee_txid: [4; 32],
        };
        assert_eq!(body.encode().len(), 104);
        let msg = roundtrip(Command::TransactionInitialized, body.encode());
        assert_eq!(msg, Message::TransactionInitialized(body));
    }

    #[test]
    fn test_create_a_exact_size() {
        let body = CreateABody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            counterparty_pubkey: sample_pubkey(),
        };
        assert_eq!(body.encode().len(), 85);
        let msg = roundtrip(Command::TransactionCreateA, body.encode());
        assert_eq!(msg, Message::TransactionCreateA(body));
    }

    #[test]
    fn test_created_a_roundtrip() {
        let body = CreatedABody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            bin_txid: "ab".repeat(32),
            hashed_secret: [3; 20],
            locktime_a: 300,
            ref_txid: "cd".repeat(32),
            ref_tx: "0100beef".to_string(),
        };
        let msg = roundtrip(Command::TransactionCreatedA, body.encode());
        assert_eq!(msg, Message::TransactionCreatedA(body));
    }

    #[test]
    fn test_create_b_roundtrip() {
        let body = CreateBBody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            counterparty_pubkey: sample_pubkey(),
            a_bin_txid: "ab".repeat(32),
            hashed_secret: [3; 20],
            locktime_a: 300,
        };
        let msg = roundtrip(Command::TransactionCreateB, body.encode());
        assert_eq!(msg, Message::TransactionCreateB(body));
    }

    #[test]
    fn test_created_b_roundtrip() {
        let body = CreatedBBody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            bin_txid: "ab".repeat(32),
            locktime_b: 250,
            ref_txid: "cd".repeat(32),
            ref_tx: "0100beef".to_string(),
        };
        let msg = roundtrip(Command::TransactionCreatedB, body.encode());
        assert_eq!(msg, Message::TransactionCreatedB(body));
    }

    #[test]
    fn test_confirm_flow_roundtrips() {
        let confirm_a = ConfirmABody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            b_bin_txid: "ab".repeat(32),
            locktime_b: 250,
        };
        assert_eq!(
            roundtrip(Command::TransactionConfirmA, confirm_a.encode()),
            Message::TransactionConfirmA(confirm_a)
        );

        let confirmed_a = ConfirmedABody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            pay_txid: "ef".repeat(32),
        };
        assert_eq!(
            roundtrip(Command::TransactionConfirmedA, confirmed_a.encode()),
            Message::TransactionConfirmedA(confirmed_a)
        );

        let confirm_b = ConfirmBBody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            a_pay_txid: "ef".repeat(32),
        };
        assert_eq!(
            roundtrip(Command::TransactionConfirmB, confirm_b.encode()),
            Message::TransactionConfirmB(confirm_b)
        );

        let confirmed_b = ConfirmedBBody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            pay_txid: "0123".repeat(16),
        };
        assert_eq!(
            roundtrip(Command::TransactionConfirmedB, confirmed_b.encode()),
            Message::TransactionConfirmedB(confirmed_b)
        );
    }

    #[test]
    fn test_confirmed_a_size_window() {
        let keypair = KeyPair::generate();
        // 999 bytes is the largest allowed payload.
        let body = ConfirmedABody {
            hub_address: addr(1),
            id: OrderId::from_bytes([2; 32]),
            pay_txid: "a".repeat(946),
        };
        let encoded = body.encode();
        assert_eq!(encoded.len(), 999);
        let packet = Packet::signed(Command::TransactionConfirmedA, encoded, &keypair).unwrap();
        assert!(Message::decode(&packet).is_ok());

        let oversize = ConfirmedABody {
            pay_txid: "a".repeat(947),
            ..body
        };
        let packet =
            Packet::signed(Command::TransactionConfirmedA, oversize.encode(), &keypair).unwrap();
        assert!(matches!(
            Message::decode(&packet),
            Err(WireError::BadPayloadSize { .. })
        ));
    }

    #[test]
    fn test_cancel_exact_size() {
        let body = CancelBody {
            id: OrderId::from_bytes([1; 32]),
            reason: TxCancelReason::BadUtxo,
        };
        assert_eq!(body.encode().len(), 36);
        let msg = roundtrip(Command::TransactionCancel, body.encode());
        assert_eq!(msg, Message::TransactionCancel(body));
    }

    #[test]
    fn test_finished_exact_size() {
        let body = FinishedBody {
            id: OrderId::from_bytes([1; 32]),
        };
        assert_eq!(body.encode().len(), 32);
        let msg = roundtrip(Command::TransactionFinished, body.encode());
        assert_eq!(msg, Message::TransactionFinished(body));
    }

    #[test]
    fn test_transaction_zero_utxos_rejected_by_size_rule() {
        // A zero-utxo order encodes to 148 bytes, below the declared
        // 152-byte minimum, so it never reaches the handler.
        let body = TransactionBody {
            id: OrderId::from_bytes([1; 32]),
            src_addr: addr(2),
            src_currency: Currency::new("BLOCK").unwrap(),
            src_amount: Amount::from_coins(10),
            dst_addr: addr(3),
            dst_currency: Currency::new("LTC").unwrap(),
            dst_amount: Amount::from_coins(1),
            timestamp: 0,
            anchor: [4; 32],
            utxos: vec![],
        };
        let encoded = body.encode().unwrap();
        assert_eq!(encoded.len(), 148);

        let keypair = KeyPair::generate();
        let packet = Packet::signed(Command::Transaction, encoded, &keypair).unwrap();
        assert!(matches!(
            Message::decode(&packet),
            Err(WireError::BadPayloadSize { .. })
        ));
    }

    #[test]
    fn test_truncated_utxo_record_fails() {
        let body = TransactionBody {
            id: OrderId::from_bytes([1; 32]),
            src_addr: addr(2),
            src_currency: Currency::new("BLOCK").unwrap(),
            src_amount: Amount::from_coins(10),
            dst_addr: addr(3),
            dst_currency: Currency::new("LTC").unwrap(),
            dst_amount: Amount::from_coins(1),
            timestamp: 0,
            anchor: [4; 32],
            utxos: vec![sample_utxo(5)],
        };
        let mut encoded = body.encode().unwrap();
        encoded.truncate(encoded.len() - 1);
        assert!(TransactionBody::decode(&encoded).is_err());
    }

    #[test]
    fn test_message_command_tags() {
        let body = FinishedBody {
            id: OrderId::from_bytes([1; 32]),
        };
        let msg = Message::TransactionFinished(body);
        assert_eq!(msg.command(), Command::TransactionFinished);
    }
}
