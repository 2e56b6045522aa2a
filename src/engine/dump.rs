//! DUMP/RESTORE binary codec.
//!
//! Layout (little-endian): a type tag byte, a one-byte expiration flag
//! (+ 8-byte i64 expiration if set), a variant-specific body, then a
//! trailing 4-byte CRC32 over everything preceding it.

use super::Engine;
use crate::data::{Entry, Hll, RedisHash, RedisList, RedisSet, RedisSortedSet, RedisStream, StreamId, Value, SDS};
use crate::error::{EngineError, EngineResult};

const TAG_STRING: u8 = 0x00;
const TAG_LIST: u8 = 0x01;
const TAG_SET: u8 = 0x02;
const TAG_ZSET: u8 = 0x03;
const TAG_HASH: u8 = 0x04;
const TAG_STREAM: u8 = 0xFE;
const TAG_HLL: u8 = 0xFD;

fn write_blob(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn read_blob(buf: &[u8], pos: &mut usize) -> Option<Vec<u8>> {
    let len = u32::from_le_bytes(buf.get(*pos..*pos + 4)?.try_into().ok()?) as usize;
    *pos += 4;
    let bytes = buf.get(*pos..*pos + len)?.to_vec();
    *pos += len;
    Some(bytes)
}

fn write_u32(out: &mut Vec<u8>, n: u32) {
    out.extend_from_slice(&n.to_le_bytes());
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Option<u32> {
    let n = u32::from_le_bytes(buf.get(*pos..*pos + 4)?.try_into().ok()?);
    *pos += 4;
    Some(n)
}

fn read_u64(buf: &[u8], pos: &mut usize) -> Option<u64> {
    let n = u64::from_le_bytes(buf.get(*pos..*pos + 8)?.try_into().ok()?);
    *pos += 8;
    Some(n)
}

fn encode_body(value: &Value) -> (u8, Vec<u8>) {
    let mut body = Vec::new();
    match value {
        Value::String(sds) => {
            write_blob(&mut body, sds.as_bytes());
            (TAG_STRING, body)
        }
        Value::List(list) => {
            let items = list.range(0, -1);
            write_u32(&mut body, items.len() as u32);
            for item in &items {
                write_blob(&mut body, item.as_bytes());
            }
            (TAG_LIST, body)
        }
        Value::Set(set) => {
            let members = set.members();
            write_u32(&mut body, members.len() as u32);
            for member in &members {
                write_blob(&mut body, member.as_bytes());
            }
            (TAG_SET, body)
        }
        Value::Hash(hash) => {
            let pairs = hash.get_all();
            write_u32(&mut body, pairs.len() as u32);
            for (field, value) in &pairs {
                write_blob(&mut body, field.as_bytes());
                write_blob(&mut body, value.as_bytes());
            }
            (TAG_HASH, body)
        }
        Value::SortedSet(zset) => {
            let members: Vec<(&str, f64)> = zset.iter().collect();
            write_u32(&mut body, members.len() as u32);
            for (member, score) in members {
                body.extend_from_slice(&score.to_bits().to_le_bytes());
                write_blob(&mut body, member.as_bytes());
            }
            (TAG_ZSET, body)
        }
        Value::Stream(stream) => {
            let entries = stream.range(StreamId::MIN, StreamId::MAX, None);
            write_u32(&mut body, entries.len() as u32);
            for entry in &entries {
                body.extend_from_slice(&entry.id.ms.to_le_bytes());
                body.extend_from_slice(&entry.id.seq.to_le_bytes());
                write_u32(&mut body, entry.fields.len() as u32);
                for (field, value) in &entry.fields {
                    write_blob(&mut body, field);
                    write_blob(&mut body, value);
                }
            }
            (TAG_STREAM, body)
        }
        Value::Hll(hll) => {
            write_blob(&mut body, hll.registers());
            (TAG_HLL, body)
        }
    }
}

fn decode_body(tag: u8, buf: &[u8]) -> EngineResult<Value> {
    let mut pos = 0usize;
    match tag {
        TAG_STRING => {
            let bytes = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
            Ok(Value::String(SDS::new(bytes)))
        }
        TAG_LIST => {
            let count = read_u32(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
            let mut list = RedisList::new();
            for _ in 0..count {
                let item = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                list.rpush(SDS::new(item));
            }
            Ok(Value::List(list))
        }
        TAG_SET => {
            let count = read_u32(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
            let mut set = RedisSet::new();
            for _ in 0..count {
                let member = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                set.add(SDS::new(member));
            }
            Ok(Value::Set(set))
        }
        TAG_HASH => {
            let count = read_u32(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
            let mut hash = RedisHash::new();
            for _ in 0..count {
                let field = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                let value = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                hash.set(SDS::new(field), SDS::new(value));
            }
            Ok(Value::Hash(hash))
        }
        TAG_ZSET => {
            let count = read_u32(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
            let mut zset = RedisSortedSet::new();
            for _ in 0..count {
                let score_bits = read_u64(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                let score = f64::from_bits(score_bits);
                let member = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                zset.add(SDS::new(member), score);
            }
            Ok(Value::SortedSet(zset))
        }
        TAG_STREAM => {
            let count = read_u32(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
            let mut stream = RedisStream::new();
            for _ in 0..count {
                let ms = read_u64(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                let seq = read_u64(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                let field_count = read_u32(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                let mut fields = Vec::with_capacity(field_count as usize);
                for _ in 0..field_count {
                    let field = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                    let value = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
                    fields.push((field, value));
                }
                stream.append(StreamId::new(ms, seq), fields).map_err(|_| EngineError::InvalidDumpPayload)?;
            }
            Ok(Value::Stream(stream))
        }
        TAG_HLL => {
            let registers = read_blob(buf, &mut pos).ok_or(EngineError::InvalidDumpPayload)?;
            Hll::from_registers(registers).map(Value::Hll).ok_or(EngineError::InvalidDumpPayload)
        }
        _ => Err(EngineError::UnknownDumpType),
    }
}

impl Engine {
    pub fn dump_value(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let Some(entry) = ks.get(key, now) else {
            return Ok(None);
        };

        let (tag, body) = encode_body(&entry.value);
        let mut blob = Vec::with_capacity(1 + 1 + 8 + body.len() + 4);
        blob.push(tag);
        match entry.expires_at {
            Some(at) => {
                blob.push(1);
                blob.extend_from_slice(&at.to_le_bytes());
            }
            None => blob.push(0),
        }
        blob.extend_from_slice(&body);

        let crc = crc32fast::hash(&blob);
        blob.extend_from_slice(&crc.to_le_bytes());
        Ok(Some(blob))
    }

    /// `ttl_ms`: positive sets expiration to `now + ttl_ms`; `0` keeps the
    /// expiration carried in the dump (or none, if it had none); negative is
    /// invalid.
    pub fn restore_value(&self, key: Vec<u8>, blob: &[u8], ttl_ms: i64, replace: bool) -> EngineResult<()> {
        if ttl_ms < 0 {
            return Err(EngineError::InvalidValue);
        }
        if blob.len() < 1 + 1 + 4 {
            return Err(EngineError::InvalidDumpPayload);
        }

        let (payload, crc_bytes) = blob.split_at(blob.len() - 4);
        let expected_crc = u32::from_le_bytes(crc_bytes.try_into().expect("4-byte slice"));
        if crc32fast::hash(payload) != expected_crc {
            return Err(EngineError::DumpChecksumMismatch);
        }

        let tag = payload[0];
        let has_expiry = payload[1];
        let mut pos = 2usize;
        let stored_expiry = match has_expiry {
            1 => {
                let bytes = payload.get(pos..pos + 8).ok_or(EngineError::InvalidDumpPayload)?;
                pos += 8;
                Some(i64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
            }
            0 => None,
            _ => return Err(EngineError::InvalidDumpPayload),
        };

        let value = decode_body(tag, &payload[pos..])?;

        let now = self.now_ms();
        let expires_at = if ttl_ms > 0 { Some(now + ttl_ms) } else { stored_expiry };

        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);
        if !replace && ks.entries.contains_key(&key) {
            return Err(EngineError::KeyAlreadyExists);
        }
        ks.entries.insert(key, Entry { value, expires_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::sorted_set_ops::ZAddOptions;
    use super::super::tests::test_engine;

    #[test]
    fn roundtrip_preserves_string_and_expiry() {
        let (engine, _clock) = test_engine();
        engine.set(b"k".to_vec(), b"hello".to_vec(), Some(5_000)).unwrap();
        let blob = engine.dump_value(b"k").unwrap().unwrap();
        engine.restore_value(b"k2".to_vec(), &blob, 0, true).unwrap();
        assert_eq!(engine.get(b"k2").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(engine.get_ttl_ms(b"k2"), engine.get_ttl_ms(b"k"));
    }

    #[test]
    fn roundtrip_preserves_list_order() {
        let (engine, _clock) = test_engine();
        engine.rpush(b"k".to_vec(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]).unwrap();
        let blob = engine.dump_value(b"k").unwrap().unwrap();
        engine.restore_value(b"k2".to_vec(), &blob, 0, true).unwrap();
        assert_eq!(engine.lrange(b"k2", 0, -1).unwrap(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn roundtrip_preserves_sorted_set_scores() {
        let (engine, _clock) = test_engine();
        engine
            .zadd(b"z".to_vec(), vec![(b"a".to_vec(), 1.5), (b"b".to_vec(), 2.5)], ZAddOptions::default())
            .unwrap();
        let blob = engine.dump_value(b"z").unwrap().unwrap();
        engine.restore_value(b"z2".to_vec(), &blob, 0, true).unwrap();
        assert_eq!(engine.zscore(b"z2", b"a").unwrap(), Some(1.5));
        assert_eq!(engine.zscore(b"z2", b"b").unwrap(), Some(2.5));
    }

    #[test]
    fn restore_rejects_corrupted_checksum() {
        let (engine, _clock) = test_engine();
        engine.set(b"k".to_vec(), b"hello".to_vec(), None).unwrap();
        let mut blob = engine.dump_value(b"k").unwrap().unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert_eq!(engine.restore_value(b"k2".to_vec(), &blob, 0, true), Err(crate::error::EngineError::DumpChecksumMismatch));
    }

    #[test]
    fn restore_refuses_live_destination_without_replace() {
        let (engine, _clock) = test_engine();
        engine.set(b"k".to_vec(), b"a".to_vec(), None).unwrap();
        let blob = engine.dump_value(b"k").unwrap().unwrap();
        engine.set(b"k2".to_vec(), b"already-here".to_vec(), None).unwrap();
        assert_eq!(engine.restore_value(b"k2".to_vec(), &blob, 0, false), Err(crate::error::EngineError::KeyAlreadyExists));
    }

    #[test]
    fn restore_with_positive_ttl_overrides_stored_expiry() {
        let (engine, _clock) = test_engine();
        engine.set(b"k".to_vec(), b"a".to_vec(), None).unwrap();
        let blob = engine.dump_value(b"k").unwrap().unwrap();
        engine.restore_value(b"k2".to_vec(), &blob, 2_000, true).unwrap();
        assert_eq!(engine.get_ttl_ms(b"k2"), 2_000);
    }

    #[test]
    fn dump_of_missing_key_is_none() {
        let (engine, _clock) = test_engine();
        assert_eq!(engine.dump_value(b"missing").unwrap(), None);
    }
}
