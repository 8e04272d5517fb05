//! # Byte-Level Codec Helpers
//!
//! Bounds-checked cursor reads and append-only writes over the exact wire
//! layout: little-endian integers, fixed arrays, and zero-terminated strings.

use crate::errors::WireError;
use shared_types::{Amount, Currency};

/// Bounds-checked reader over a payload buffer.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Start reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Take `n` raw bytes.
    pub fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::OutOfBounds(what));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    /// Read a fixed-size array.
    pub fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], WireError> {
        let slice = self.take(N, what)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    /// Read a little-endian u32.
    pub fn u32(&mut self, what: &'static str) -> Result<u32, WireError> {
        Ok(u32::from_le_bytes(self.array::<4>(what)?))
    }

    /// Read a little-endian u64.
    pub fn u64(&mut self, what: &'static str) -> Result<u64, WireError> {
        Ok(u64::from_le_bytes(self.array::<8>(what)?))
    }

    /// Read an amount (little-endian u64 base units).
    pub fn amount(&mut self, what: &'static str) -> Result<Amount, WireError> {
        Ok(Amount::from_le_bytes(self.array::<8>(what)?))
    }

    /// Read an 8-byte zero-padded currency field.
    pub fn currency(&mut self, what: &'static str) -> Result<Currency, WireError> {
        Currency::from_wire(self.array::<8>(what)?).map_err(|_| WireError::BadCurrency)
    }

    /// Read a zero-terminated ASCII string (terminator consumed).
    pub fn cstring(&mut self, what: &'static str) -> Result<String, WireError> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(WireError::BadString(what))?;
        let s = std::str::from_utf8(&rest[..nul]).map_err(|_| WireError::BadString(what))?;
        self.pos += nul + 1;
        Ok(s.to_string())
    }

    /// Read a 32-byte transaction id, rendering it as lowercase hex.
    pub fn txid32(&mut self, what: &'static str) -> Result<String, WireError> {
        Ok(hex::encode(self.array::<32>(what)?))
    }
}

/// Append-only payload writer.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Start an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish and take the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Append raw bytes.
    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Append a little-endian u32.
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append a little-endian u64.
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append an amount.
    pub fn amount(&mut self, value: Amount) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Append the 8-byte zero-padded currency form.
    pub fn currency(&mut self, value: Currency) -> &mut Self {
        self.buf.extend_from_slice(&value.to_wire());
        self
    }

    /// Append a zero-terminated string.
    pub fn cstring(&mut self, value: &str) -> &mut Self {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self
    }

    /// Append a 32-byte transaction id given as hex.
    pub fn txid32(&mut self, txid: &str, what: &'static str) -> Result<&mut Self, WireError> {
        let raw = hex::decode(txid).map_err(|_| WireError::BadTxId(what))?;
        if raw.len() != 32 {
            return Err(WireError::BadTxId(what));
        }
        self.buf.extend_from_slice(&raw);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_take_out_of_bounds() {
        let mut r = Reader::new(&[1, 2, 3]);
        assert!(r.take(4, "field").is_err());
        assert_eq!(r.take(3, "field").unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn test_u32_u64_roundtrip() {
        let mut w = Writer::new();
        w.u32(0xDEAD_BEEF).u64(42);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.u32("a").unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.u64("b").unwrap(), 42);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_cstring_roundtrip() {
        let mut w = Writer::new();
        w.cstring("abc123").cstring("");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.cstring("a").unwrap(), "abc123");
        assert_eq!(r.cstring("b").unwrap(), "");
    }

    #[test]
    fn test_cstring_unterminated_fails() {
        let mut r = Reader::new(b"no-terminator");
        assert!(r.cstring("s").is_err());
    }

    #[test]
    fn test_txid_roundtrip() {
        let txid = "ab".repeat(32);
        let mut w = Writer::new();
        w.txid32(&txid, "txid").unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.txid32("txid").unwrap(), txid);
    }

    #[test]
    fn test_txid_bad_hex_fails() {
        let mut w = Writer::new();
        assert!(w.txid32("zz", "txid").is_err());
        assert!(w.txid32("abcd", "txid").is_err());
    }

    #[test]
    fn test_currency_roundtrip() {
        let cur = Currency::new("BLOCK").unwrap();
        let mut w = Writer::new();
        w.currency(cur);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.currency("cur").unwrap(), cur);
    }
}
