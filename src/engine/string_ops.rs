//! GET/SET family, counters, and range operations on the `String` variant.

use super::Engine;
use crate::data::{Entry, Value, SDS};
use crate::error::{EngineError, EngineResult};

impl Engine {
    pub fn set(&self, key: Vec<u8>, value: Vec<u8>, expires_at: Option<i64>) -> EngineResult<()> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);
        ks.entries.insert(key, Entry { value: Value::String(SDS::new(value)), expires_at });
        Ok(())
    }

    /// `nx`/`xx` gate whether the write happens at all; `keep_ttl` preserves
    /// any existing expiration instead of clearing it. Returns the previous
    /// value when `get_old` is set, regardless of whether the write occurred.
    pub fn set_with_options(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        expires_at: Option<i64>,
        nx: bool,
        xx: bool,
        keep_ttl: bool,
        get_old: bool,
    ) -> EngineResult<(bool, Option<Vec<u8>>)> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);

        let old = if get_old {
            match ks.entries.get(&key) {
                Some(e) => Some(e.value.as_string().ok_or(EngineError::WrongType)?.as_bytes().to_vec()),
                None => None,
            }
        } else {
            None
        };

        let exists = ks.entries.contains_key(&key);
        if (nx && exists) || (xx && !exists) {
            return Ok((false, old));
        }

        let final_expiry = if keep_ttl {
            ks.entries.get(&key).and_then(|e| e.expires_at)
        } else {
            expires_at
        };

        ks.entries.insert(key, Entry { value: Value::String(SDS::new(value)), expires_at: final_expiry });
        Ok((true, old))
    }

    pub fn get(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(None),
            Some(entry) => Ok(Some(entry.value.as_string().ok_or(EngineError::WrongType)?.as_bytes().to_vec())),
        }
    }

    pub fn getset(&self, key: Vec<u8>, value: Vec<u8>) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);
        let old = match ks.entries.get(&key) {
            Some(e) => Some(e.value.as_string().ok_or(EngineError::WrongType)?.as_bytes().to_vec()),
            None => None,
        };
        ks.entries.insert(key, Entry::new(Value::String(SDS::new(value))));
        Ok(old)
    }

    pub fn getdel(&self, key: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);
        match ks.entries.get(key) {
            None => Ok(None),
            Some(e) => {
                let bytes = e.value.as_string().ok_or(EngineError::WrongType)?.as_bytes().to_vec();
                ks.entries.remove(key);
                Ok(Some(bytes))
            }
        }
    }

    /// GETEX: read the string and optionally update its expiration.
    /// `persist` clears the TTL; otherwise `new_expiry` (if present)
    /// replaces it, else the current expiry is left untouched.
    pub fn getex(&self, key: &[u8], new_expiry: Option<Option<i64>>, persist: bool) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);
        let Some(entry) = ks.entries.get_mut(key) else {
            return Ok(None);
        };
        let bytes = entry.value.as_string().ok_or(EngineError::WrongType)?.as_bytes().to_vec();
        if persist {
            entry.expires_at = None;
        } else if let Some(expiry) = new_expiry {
            entry.expires_at = expiry;
        }
        Ok(Some(bytes))
    }

    pub fn strlen(&self, key: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => Ok(entry.value.as_string().ok_or(EngineError::WrongType)?.len()),
        }
    }

    pub fn append(&self, key: Vec<u8>, value: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);
        match ks.entries.get_mut(&key) {
            Some(entry) => {
                let sds = entry.value.as_string_mut().ok_or(EngineError::WrongType)?;
                sds.append(&SDS::new(value.to_vec()));
                Ok(sds.len())
            }
            None => {
                let sds = SDS::new(value.to_vec());
                let len = sds.len();
                ks.entries.insert(key, Entry::new(Value::String(sds)));
                Ok(len)
            }
        }
    }

    pub fn mget(&self, keys: &[Vec<u8>]) -> Vec<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        keys.iter()
            .map(|k| match ks.get(k, now) {
                Some(entry) => entry.value.as_string().map(|s| s.as_bytes().to_vec()),
                None => None,
            })
            .collect()
    }

    pub fn mset(&self, pairs: Vec<(Vec<u8>, Vec<u8>)>) {
        let mut ks = self.keyspace.lock();
        for (key, value) in pairs {
            ks.entries.insert(key, Entry::new(Value::String(SDS::new(value))));
        }
    }

    /// Numeric increment by an i64 delta. Creates the key at 0 if absent.
    pub fn incr_by(&self, key: Vec<u8>, delta: i64) -> EngineResult<i64> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);

        let current: i64 = match ks.entries.get(&key) {
            Some(entry) => {
                let sds = entry.value.as_string().ok_or(EngineError::WrongType)?;
                std::str::from_utf8(sds.as_bytes())
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(EngineError::NotInteger)?
            }
            None => 0,
        };

        let next = current.checked_add(delta).ok_or(EngineError::Overflow)?;
        let expires_at = ks.entries.get(&key).and_then(|e| e.expires_at);
        ks.entries.insert(key, Entry { value: Value::String(SDS::from_str(&next.to_string())), expires_at });

        debug_assert_eq!(next, current + delta, "incr_by postcondition: stored value must match computed delta");
        Ok(next)
    }

    /// Numeric increment by an f64 delta, formatted without trailing zeros.
    pub fn incr_by_float(&self, key: Vec<u8>, delta: f64) -> EngineResult<f64> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);

        let current: f64 = match ks.entries.get(&key) {
            Some(entry) => {
                let sds = entry.value.as_string().ok_or(EngineError::WrongType)?;
                std::str::from_utf8(sds.as_bytes())
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .ok_or(EngineError::NotFloat)?
            }
            None => 0.0,
        };

        let next = current + delta;
        if !next.is_finite() {
            return Err(EngineError::InvalidValue);
        }

        let formatted = format_float(next);
        let expires_at = ks.entries.get(&key).and_then(|e| e.expires_at);
        ks.entries.insert(key, Entry { value: Value::String(SDS::from_str(&formatted)), expires_at });
        Ok(next)
    }

    pub fn getrange(&self, key: &[u8], start: isize, end: isize) -> EngineResult<Vec<u8>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let Some(entry) = ks.get(key, now) else {
            return Ok(Vec::new());
        };
        let bytes = entry.value.as_string().ok_or(EngineError::WrongType)?.as_bytes();
        let len = bytes.len() as isize;
        if len == 0 {
            return Ok(Vec::new());
        }

        let mut start = if start < 0 { (len + start).max(0) } else { start.min(len) };
        let mut end = if end < 0 { len + end } else { end.min(len - 1) };
        if end < 0 || start > end || start >= len {
            return Ok(Vec::new());
        }
        start = start.max(0);
        end = end.min(len - 1);

        Ok(bytes[start as usize..=end as usize].to_vec())
    }

    pub fn setrange(&self, key: Vec<u8>, offset: usize, value: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);

        if value.is_empty() {
            return Ok(ks.entries.get(&key).map(|e| e.value.as_string().map(|s| s.len()).unwrap_or(0)).unwrap_or(0));
        }

        match ks.entries.get_mut(&key) {
            Some(entry) => {
                let sds = entry.value.as_string_mut().ok_or(EngineError::WrongType)?;
                sds.set_range(offset, value);
                Ok(sds.len())
            }
            None => {
                let mut sds = SDS::new(Vec::new());
                sds.set_range(offset, value);
                let len = sds.len();
                ks.entries.insert(key, Entry::new(Value::String(sds)));
                Ok(len)
            }
        }
    }
}

/// Format an f64 the way INCRBYFLOAT does: no trailing zeros, no exponent.
fn format_float(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e17 {
        format!("{}", value as i64)
    } else {
        let mut s = format!("{:.17}", value);
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
        s
    }
}
