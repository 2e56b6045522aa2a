//! The storage engine: a single keyspace guarded by one coarse mutex.
//!
//! - `mod.rs` (this file): `Engine`/`Keyspace` core, lifecycle ops, glob matching
//! - `string_ops.rs`: GET/SET/INCR family, GETRANGE/SETRANGE
//! - `bitmap_ops.rs`: SETBIT/GETBIT/BITCOUNT/BITOP
//! - `list_ops.rs`: LPUSH..LMOVE
//! - `set_ops.rs`: SADD..SINTERCARD
//! - `hash_ops.rs`: HSET..HSETNX
//! - `sorted_set_ops.rs`: ZADD..ZRANDMEMBER
//! - `stream_ops.rs`: XADD..XINFO
//! - `hll_ops.rs`: PFADD/PFCOUNT/PFMERGE
//! - `dump.rs`: DUMP/RESTORE binary codec

mod bitmap_ops;
mod dump;
mod hash_ops;
mod hll_ops;
mod list_ops;
mod set_ops;
mod sorted_set_ops;
mod stream_ops;
mod string_ops;

pub use bitmap_ops::BitOp;
pub use list_ops::ListEnd;
pub use sorted_set_ops::ZAddOptions;

use crate::data::{Entry, Value};
use crate::error::{EngineError, EngineResult};
use crate::time::{Clock, SystemClock};
use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// The variant tag returned by `get_type`, matching the wire-level TYPE names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    List,
    Set,
    Hash,
    SortedSet,
    Stream,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::List => "list",
            TypeTag::Set => "set",
            TypeTag::Hash => "hash",
            TypeTag::SortedSet => "zset",
            TypeTag::Stream => "stream",
        }
    }
}

fn type_tag_of(value: &Value) -> TypeTag {
    match value {
        Value::String(_) | Value::Hll(_) => TypeTag::String,
        Value::List(_) => TypeTag::List,
        Value::Set(_) => TypeTag::Set,
        Value::Hash(_) => TypeTag::Hash,
        Value::SortedSet(_) => TypeTag::SortedSet,
        Value::Stream(_) => TypeTag::Stream,
    }
}

/// The keyed map at the heart of the engine. Not `pub` outside the crate —
/// every mutation goes through `Engine`'s lock.
pub(crate) struct Keyspace {
    entries: AHashMap<Vec<u8>, Entry>,
}

impl Keyspace {
    fn new() -> Self {
        Keyspace {
            entries: AHashMap::new(),
        }
    }

    /// Remove `key` if its entry is expired as of `now_ms`. Returns whether
    /// it was removed.
    fn evict_if_expired(&mut self, key: &[u8], now_ms: i64) -> bool {
        let expired = matches!(self.entries.get(key), Some(e) if e.is_expired(now_ms));
        if expired {
            self.entries.remove(key);
        }
        expired
    }

    /// Lazy-expiring read: look up `key`, evicting it first if expired.
    fn get(&mut self, key: &[u8], now_ms: i64) -> Option<&Entry> {
        self.evict_if_expired(key, now_ms);
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &[u8], now_ms: i64) -> Option<&mut Entry> {
        self.evict_if_expired(key, now_ms);
        self.entries.get_mut(key)
    }

    /// Remove the key if its value is an aggregate (list/set/hash/zset) left
    /// empty by the caller's mutation, per the auto-delete invariant.
    fn auto_delete_if_empty(&mut self, key: &[u8]) {
        if matches!(self.entries.get(key), Some(e) if e.value.is_empty_aggregate()) {
            self.entries.remove(key);
        }
    }
}

/// In-memory, thread-safe, multi-type keyspace with TTL semantics.
///
/// Every public method acquires the single internal mutex for the duration
/// of the call; no method blocks waiting on anything other than that lock.
pub struct Engine {
    pub(crate) keyspace: Mutex<Keyspace>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            keyspace: Mutex::new(Keyspace::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Construct with an injected clock, for deterministic expiration tests.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Engine {
            keyspace: Mutex::new(Keyspace::new()),
            clock,
        }
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    // -- Keyspace & lifecycle -------------------------------------------

    pub fn del(&self, keys: &[Vec<u8>]) -> usize {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let mut count = 0;
        for key in keys {
            ks.evict_if_expired(key, now);
            if ks.entries.remove(key.as_slice()).is_some() {
                count += 1;
            }
        }
        count
    }

    pub fn exists(&self, keys: &[Vec<u8>]) -> usize {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        keys.iter().filter(|k| ks.get(k, now).is_some()).count()
    }

    pub fn get_type(&self, key: &[u8]) -> Option<TypeTag> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.get(key, now).map(|e| type_tag_of(&e.value))
    }

    pub fn db_size(&self) -> usize {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let expired: Vec<Vec<u8>> = ks
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in expired {
            ks.entries.remove(&k);
        }
        ks.entries.len()
    }

    pub fn flush_all(&self) {
        let mut ks = self.keyspace.lock();
        ks.entries.clear();
    }

    /// Returns copies of every live key matching `pattern` (glob syntax:
    /// `*`, `?`, `[...]`).
    pub fn list_keys(&self, pattern: &[u8]) -> Vec<Vec<u8>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let expired: Vec<Vec<u8>> = ks
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &expired {
            ks.entries.remove(k);
        }
        ks.entries
            .keys()
            .filter(|k| glob_match(k, pattern))
            .cloned()
            .collect()
    }

    /// Two-phase active eviction: collect every currently expired key, then
    /// remove them, avoiding iterator invalidation.
    pub fn evict_expired(&self) -> usize {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let expired: Vec<Vec<u8>> = ks
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        let count = expired.len();
        for k in expired {
            ks.entries.remove(&k);
        }
        count
    }

    pub fn rename(&self, src: &[u8], dst: &[u8]) -> EngineResult<()> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(src, now);
        let entry = ks.entries.remove(src).ok_or(EngineError::NoSuchKey)?;
        ks.entries.insert(dst.to_vec(), entry);
        Ok(())
    }

    pub fn renamenx(&self, src: &[u8], dst: &[u8]) -> EngineResult<bool> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(src, now);
        if !ks.entries.contains_key(src) {
            return Err(EngineError::NoSuchKey);
        }
        ks.evict_if_expired(dst, now);
        if ks.entries.contains_key(dst) {
            return Ok(false);
        }
        let entry = ks.entries.remove(src).expect("checked present above");
        ks.entries.insert(dst.to_vec(), entry);
        Ok(true)
    }

    pub fn copy_key(&self, src: &[u8], dst: &[u8], replace: bool) -> bool {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(src, now);
        let Some(entry) = ks.entries.get(src).cloned() else {
            return false;
        };
        ks.evict_if_expired(dst, now);
        if !replace && ks.entries.contains_key(dst) {
            return false;
        }
        ks.entries.insert(dst.to_vec(), entry);
        true
    }

    /// Refresh LRU-style access bookkeeping for each key that exists.
    /// Returns the count of keys actually touched.
    pub fn touch(&self, keys: &[Vec<u8>]) -> usize {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        keys.iter().filter(|k| ks.get(k, now).is_some()).count()
    }

    /// `options` is a bitmask of `SetExpiryFlags`.
    pub fn set_expiry(&self, key: &[u8], expires_at: Option<i64>, options: u8) -> EngineResult<bool> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let entry = ks.get_mut(key, now).ok_or(EngineError::NoSuchKey)?;

        let nx = options & SET_EXPIRY_NX != 0;
        let xx = options & SET_EXPIRY_XX != 0;
        let gt = options & SET_EXPIRY_GT != 0;
        let lt = options & SET_EXPIRY_LT != 0;

        let current = entry.expires_at;
        if nx && current.is_some() {
            return Ok(false);
        }
        if xx && current.is_none() {
            return Ok(false);
        }
        if gt || lt {
            let Some(new) = expires_at else {
                return Ok(false);
            };
            // A null current expiration fails GT/LT — the stricter
            // "no expiry" reading rather than treating it as +-infinity.
            let Some(cur) = current else {
                return Ok(false);
            };
            if gt && new <= cur {
                return Ok(false);
            }
            if lt && new >= cur {
                return Ok(false);
            }
        }

        entry.expires_at = expires_at;
        Ok(true)
    }

    pub fn get_ttl_ms(&self, key: &[u8]) -> i64 {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => -2,
            Some(entry) => match entry.expires_at {
                None => -1,
                Some(at) => (at - now).max(0),
            },
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

pub const SET_EXPIRY_NX: u8 = 1;
pub const SET_EXPIRY_XX: u8 = 2;
pub const SET_EXPIRY_GT: u8 = 4;
pub const SET_EXPIRY_LT: u8 = 8;

/// Redis-style glob matching: `*` any run, `?` any one byte, `[...]`/`[^...]`
/// character classes with `a-z` ranges.
pub(crate) fn glob_match(key: &[u8], pattern: &[u8]) -> bool {
    glob_match_at(key, pattern, 0, 0)
}

fn glob_match_at(key: &[u8], pattern: &[u8], k_idx: usize, p_idx: usize) -> bool {
    if p_idx >= pattern.len() {
        return k_idx >= key.len();
    }

    match pattern[p_idx] {
        b'*' => (k_idx..=key.len()).any(|i| glob_match_at(key, pattern, i, p_idx + 1)),
        b'?' => k_idx < key.len() && glob_match_at(key, pattern, k_idx + 1, p_idx + 1),
        b'[' => {
            let Some(bracket_end) = pattern[p_idx + 1..].iter().position(|&b| b == b']').map(|i| i + p_idx + 1) else {
                return false;
            };
            if k_idx >= key.len() {
                return false;
            }

            let mut char_set = &pattern[p_idx + 1..bracket_end];
            let negate = char_set.first() == Some(&b'^');
            if negate {
                char_set = &char_set[1..];
            }

            let mut matched = false;
            let mut i = 0;
            while i < char_set.len() {
                if i + 2 < char_set.len() && char_set[i + 1] == b'-' {
                    if (char_set[i]..=char_set[i + 2]).contains(&key[k_idx]) {
                        matched = true;
                    }
                    i += 3;
                } else {
                    if char_set[i] == key[k_idx] {
                        matched = true;
                    }
                    i += 1;
                }
            }
            if negate {
                matched = !matched;
            }

            matched && glob_match_at(key, pattern, k_idx + 1, bracket_end + 1)
        }
        c => k_idx < key.len() && key[k_idx] == c && glob_match_at(key, pattern, k_idx + 1, p_idx + 1),
    }
}
