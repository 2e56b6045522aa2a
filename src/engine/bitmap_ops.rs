//! Bitmap commands: SETBIT/GETBIT/BITCOUNT/BITOP.
//!
//! Bitmaps aren't a distinct variant — they operate on `String` values at
//! the bit level. Bit ordering is big-endian within each byte: bit 0 is the
//! MSB (0x80), bit 7 the LSB (0x01).

use super::Engine;
use crate::data::{Entry, Value, SDS};
use crate::error::{EngineError, EngineResult};

/// 512 MiB * 8 bits = 2^32 bits.
const MAX_BIT_OFFSET: u64 = 512 * 1024 * 1024 * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl Engine {
    pub fn setbit(&self, key: Vec<u8>, offset: u64, value: u8) -> EngineResult<u8> {
        debug_assert!(value <= 1, "Precondition: bit value must be 0 or 1");
        if offset >= MAX_BIT_OFFSET {
            return Err(EngineError::IndexOutOfRange);
        }

        let byte_index = (offset / 8) as usize;
        let bit_mask: u8 = 0x80 >> (offset % 8);
        let required_len = byte_index.checked_add(1).expect("byte_index + 1 overflow");

        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);

        if !ks.entries.contains_key(&key) {
            ks.entries.insert(key.clone(), Entry::new(Value::String(SDS::new(vec![0u8; required_len]))));
        }

        let sds = ks.entries.get_mut(&key).expect("just ensured present").value.as_string_mut().ok_or(EngineError::WrongType)?;
        if sds.len() < required_len {
            sds.resize(required_len);
        }
        let bytes = sds.as_bytes_mut();

        let old_bit = if bytes[byte_index] & bit_mask != 0 { 1 } else { 0 };
        if value == 1 {
            bytes[byte_index] |= bit_mask;
        } else {
            bytes[byte_index] &= !bit_mask;
        }

        #[cfg(debug_assertions)]
        {
            let current_bit = if bytes[byte_index] & bit_mask != 0 { 1u8 } else { 0u8 };
            debug_assert_eq!(current_bit, value, "Postcondition: bit must equal requested value after setbit");
        }

        Ok(old_bit)
    }

    pub fn getbit(&self, key: &[u8], offset: u64) -> EngineResult<u8> {
        if offset >= MAX_BIT_OFFSET {
            return Err(EngineError::IndexOutOfRange);
        }

        let byte_index = (offset / 8) as usize;
        let bit_mask: u8 = 0x80 >> (offset % 8);

        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => {
                let sds = entry.value.as_string().ok_or(EngineError::WrongType)?;
                if byte_index >= sds.len() {
                    return Ok(0);
                }
                Ok(if sds.as_bytes()[byte_index] & bit_mask != 0 { 1 } else { 0 })
            }
        }
    }

    /// BITCOUNT over the whole string, or a byte range `[start, end]`
    /// (negative indices counted from the end, as with GETRANGE).
    pub fn bitcount(&self, key: &[u8], range: Option<(isize, isize)>) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let Some(entry) = ks.get(key, now) else {
            return Ok(0);
        };
        let bytes = entry.value.as_string().ok_or(EngineError::WrongType)?.as_bytes();
        let len = bytes.len() as isize;
        if len == 0 {
            return Ok(0);
        }

        let (start, end) = match range {
            None => (0, len - 1),
            Some((s, e)) => {
                let s = if s < 0 { (len + s).max(0) } else { s.min(len) };
                let e = if e < 0 { len + e } else { e.min(len - 1) };
                (s, e)
            }
        };
        if end < 0 || start > end || start >= len {
            return Ok(0);
        }

        Ok(bytes[start.max(0) as usize..=end.min(len - 1) as usize]
            .iter()
            .map(|b| b.count_ones() as usize)
            .sum())
    }

    /// BITOP: combine zero or more source strings with `op`, store into
    /// `dst`. NOT takes exactly one source. Shorter sources are treated as
    /// zero-padded to the result's length (the longest source).
    pub fn bitop(&self, op: BitOp, dst: Vec<u8>, srcs: &[Vec<u8>]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();

        let mut buffers: Vec<Vec<u8>> = Vec::with_capacity(srcs.len());
        for src in srcs {
            ks.evict_if_expired(src, now);
            match ks.entries.get(src) {
                None => buffers.push(Vec::new()),
                Some(entry) => buffers.push(entry.value.as_string().ok_or(EngineError::WrongType)?.as_bytes().to_vec()),
            }
        }

        let max_len = buffers.iter().map(|b| b.len()).max().unwrap_or(0);
        let mut result = vec![0u8; max_len];

        match op {
            BitOp::Not => {
                debug_assert_eq!(buffers.len(), 1, "Precondition: BITOP NOT takes exactly one source");
                for (i, b) in buffers[0].iter().enumerate() {
                    result[i] = !b;
                }
                for byte in result.iter_mut().skip(buffers[0].len()) {
                    *byte = 0xFF;
                }
            }
            BitOp::And => {
                result.fill(0xFF);
                for buf in &buffers {
                    for i in 0..max_len {
                        let b = buf.get(i).copied().unwrap_or(0);
                        result[i] &= b;
                    }
                }
                if buffers.is_empty() {
                    result.fill(0);
                }
            }
            BitOp::Or => {
                for buf in &buffers {
                    for (i, b) in buf.iter().enumerate() {
                        result[i] |= b;
                    }
                }
            }
            BitOp::Xor => {
                for buf in &buffers {
                    for (i, b) in buf.iter().enumerate() {
                        result[i] ^= b;
                    }
                }
            }
        }

        let len = result.len();
        if len == 0 {
            ks.entries.remove(&dst);
        } else {
            ks.entries.insert(dst, Entry::new(Value::String(SDS::new(result))));
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_engine;
    use super::BitOp;

    #[test]
    fn setbit_creates_zero_padded_key_and_returns_old_value() {
        let (engine, _clock) = test_engine();
        assert_eq!(engine.setbit(b"k".to_vec(), 7, 1).unwrap(), 0);
        assert_eq!(engine.get(b"k").unwrap(), Some(vec![0x01]));
        assert_eq!(engine.setbit(b"k".to_vec(), 7, 0).unwrap(), 1);
        assert_eq!(engine.get(b"k").unwrap(), Some(vec![0x00]));
    }

    #[test]
    fn getbit_out_of_range_is_zero() {
        let (engine, _clock) = test_engine();
        engine.set(b"k".to_vec(), vec![0xFF], None).unwrap();
        assert_eq!(engine.getbit(b"k", 100).unwrap(), 0);
    }

    #[test]
    fn bitcount_counts_set_bits() {
        let (engine, _clock) = test_engine();
        engine.set(b"k".to_vec(), b"foobar".to_vec(), None).unwrap();
        assert_eq!(engine.bitcount(b"k", None).unwrap(), 26);
    }

    #[test]
    fn bitop_and_combines_sources() {
        let (engine, _clock) = test_engine();
        engine.set(b"a".to_vec(), vec![0xFF], None).unwrap();
        engine.set(b"b".to_vec(), vec![0x0F], None).unwrap();
        let len = engine.bitop(BitOp::And, b"dst".to_vec(), &[b"a".to_vec(), b"b".to_vec()]).unwrap();
        assert_eq!(len, 1);
        assert_eq!(engine.get(b"dst").unwrap(), Some(vec![0x0F]));
    }

    #[test]
    fn bitop_not_inverts_single_source() {
        let (engine, _clock) = test_engine();
        engine.set(b"a".to_vec(), vec![0x00], None).unwrap();
        engine.bitop(BitOp::Not, b"dst".to_vec(), &[b"a".to_vec()]).unwrap();
        assert_eq!(engine.get(b"dst").unwrap(), Some(vec![0xFF]));
    }
}
