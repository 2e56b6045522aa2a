//! PFADD/PFCOUNT/PFMERGE, wrapping the `Hll` data type. HLLs are exposed as
//! ordinary strings at the keyspace boundary (`Value::Hll` still reports
//! `type_name() == "string"`), but PF* commands address them directly.

use super::Engine;
use crate::data::{Entry, Hll, Value};
use crate::error::{EngineError, EngineResult};

impl Engine {
    fn with_hll_mut<F, R>(&self, key: &[u8], f: F) -> EngineResult<R>
    where
        F: FnOnce(&mut Hll) -> R,
    {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);

        if !ks.entries.contains_key(key) {
            ks.entries.insert(key.to_vec(), Entry::new(Value::Hll(Hll::new())));
        }

        let entry = ks.entries.get_mut(key).expect("just ensured present");
        let hll = entry.value.as_hll_mut().ok_or(EngineError::WrongType)?;
        Ok(f(hll))
    }

    /// Returns whether the approximated cardinality changed.
    pub fn pfadd(&self, key: Vec<u8>, elements: &[Vec<u8>]) -> EngineResult<bool> {
        self.with_hll_mut(&key, |hll| {
            let mut changed = false;
            for element in elements {
                changed |= hll.add(element);
            }
            changed
        })
    }

    pub fn pfcount(&self, keys: &[Vec<u8>]) -> EngineResult<u64> {
        if keys.len() == 1 {
            let now = self.now_ms();
            let mut ks = self.keyspace.lock();
            return match ks.get(&keys[0], now) {
                None => Ok(0),
                Some(entry) => Ok(entry.value.as_hll().ok_or(EngineError::WrongType)?.count()),
            };
        }

        let mut merged = Hll::new();
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        for key in keys {
            if let Some(entry) = ks.get(key, now) {
                merged.merge(entry.value.as_hll().ok_or(EngineError::WrongType)?);
            }
        }
        Ok(merged.count())
    }

    pub fn pfmerge(&self, dst: Vec<u8>, srcs: &[Vec<u8>]) -> EngineResult<()> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();

        let mut merged = match ks.get(&dst, now) {
            Some(entry) => entry.value.as_hll().ok_or(EngineError::WrongType)?.clone(),
            None => Hll::new(),
        };
        for src in srcs {
            if let Some(entry) = ks.get(src, now) {
                merged.merge(entry.value.as_hll().ok_or(EngineError::WrongType)?);
            }
        }
        ks.entries.insert(dst, Entry::new(Value::Hll(merged)));
        Ok(())
    }
}
