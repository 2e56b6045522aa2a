//! LPUSH..LMOVE operations on the `List` variant.

use super::Engine;
use crate::data::{Entry, RedisList, Value, SDS};
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Left,
    Right,
}

impl Engine {
    fn with_list_mut<F, R>(&self, key: &[u8], create: bool, f: F) -> EngineResult<Option<R>>
    where
        F: FnOnce(&mut RedisList) -> R,
    {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);

        if !ks.entries.contains_key(key) {
            if !create {
                return Ok(None);
            }
            ks.entries.insert(key.to_vec(), Entry::new(Value::List(RedisList::new())));
        }

        let entry = ks.entries.get_mut(key).expect("just inserted or already present");
        let list = entry.value.as_list_mut().ok_or(EngineError::WrongType)?;
        let result = f(list);
        ks.auto_delete_if_empty(key);
        Ok(Some(result))
    }

    pub fn lpush(&self, key: Vec<u8>, values: Vec<Vec<u8>>) -> EngineResult<usize> {
        let len = self
            .with_list_mut(&key, true, |list| {
                for v in values {
                    list.lpush(SDS::new(v));
                }
                list.len()
            })?
            .expect("create=true always yields Some");
        Ok(len)
    }

    pub fn rpush(&self, key: Vec<u8>, values: Vec<Vec<u8>>) -> EngineResult<usize> {
        let len = self
            .with_list_mut(&key, true, |list| {
                for v in values {
                    list.rpush(SDS::new(v));
                }
                list.len()
            })?
            .expect("create=true always yields Some");
        Ok(len)
    }

    pub fn lpushx(&self, key: Vec<u8>, values: Vec<Vec<u8>>) -> EngineResult<usize> {
        Ok(self
            .with_list_mut(&key, false, |list| {
                for v in values {
                    list.lpush(SDS::new(v));
                }
                list.len()
            })?
            .unwrap_or(0))
    }

    pub fn rpushx(&self, key: Vec<u8>, values: Vec<Vec<u8>>) -> EngineResult<usize> {
        Ok(self
            .with_list_mut(&key, false, |list| {
                for v in values {
                    list.rpush(SDS::new(v));
                }
                list.len()
            })?
            .unwrap_or(0))
    }

    pub fn lpop(&self, key: &[u8], count: Option<usize>) -> EngineResult<Vec<Vec<u8>>> {
        self.pop_end(key, ListEnd::Left, count)
    }

    pub fn rpop(&self, key: &[u8], count: Option<usize>) -> EngineResult<Vec<Vec<u8>>> {
        self.pop_end(key, ListEnd::Right, count)
    }

    fn pop_end(&self, key: &[u8], end: ListEnd, count: Option<usize>) -> EngineResult<Vec<Vec<u8>>> {
        let n = count.unwrap_or(1);
        Ok(self
            .with_list_mut(key, false, |list| {
                let mut out = Vec::with_capacity(n);
                for _ in 0..n {
                    let popped = match end {
                        ListEnd::Left => list.lpop(),
                        ListEnd::Right => list.rpop(),
                    };
                    match popped {
                        Some(v) => out.push(v.as_bytes().to_vec()),
                        None => break,
                    }
                }
                out
            })?
            .unwrap_or_default())
    }

    pub fn llen(&self, key: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => Ok(entry.value.as_list().ok_or(EngineError::WrongType)?.len()),
        }
    }

    pub fn lrange(&self, key: &[u8], start: isize, stop: isize) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_list()
                .ok_or(EngineError::WrongType)?
                .range(start, stop)
                .iter()
                .map(|s| s.as_bytes().to_vec())
                .collect()),
        }
    }

    pub fn lindex(&self, key: &[u8], index: isize) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(None),
            Some(entry) => Ok(entry
                .value
                .as_list()
                .ok_or(EngineError::WrongType)?
                .get(index)
                .map(|s| s.as_bytes().to_vec())),
        }
    }

    pub fn lset(&self, key: &[u8], index: isize, value: Vec<u8>) -> EngineResult<()> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);
        let entry = ks.entries.get_mut(key).ok_or(EngineError::NoSuchKey)?;
        let list = entry.value.as_list_mut().ok_or(EngineError::WrongType)?;
        list.set(index, SDS::new(value)).map_err(|_| EngineError::IndexOutOfRange)
    }

    pub fn ltrim(&self, key: &[u8], start: isize, stop: isize) -> EngineResult<()> {
        self.with_list_mut(key, false, |list| list.trim(start, stop))?;
        Ok(())
    }

    pub fn lrem(&self, key: &[u8], count: isize, value: Vec<u8>) -> EngineResult<usize> {
        Ok(self
            .with_list_mut(key, false, |list| list.remove_matching(count, &SDS::new(value)))?
            .unwrap_or(0))
    }

    pub fn linsert(&self, key: &[u8], before: bool, pivot: Vec<u8>, value: Vec<u8>) -> EngineResult<isize> {
        let pivot_sds = SDS::new(pivot);
        match self.with_list_mut(key, false, |list| {
            list.insert_relative(&pivot_sds, SDS::new(value), before).is_some()
        })? {
            None => Ok(0),
            Some(true) => Ok(self.llen(key)? as isize),
            Some(false) => Ok(-1),
        }
    }

    pub fn lpos(&self, key: &[u8], value: Vec<u8>, rank: isize, count: usize, maxlen: usize) -> EngineResult<Vec<usize>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_list()
                .ok_or(EngineError::WrongType)?
                .positions(&SDS::new(value), rank, count, maxlen)),
        }
    }

    /// LMOVE / RPOPLPUSH. Checks the destination's type *before* popping
    /// from the source, so a type mismatch never silently discards an
    /// element from `src`.
    pub fn lmove(&self, src: &[u8], dst: &[u8], from: ListEnd, to: ListEnd) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(src, now);
        ks.evict_if_expired(dst, now);

        if let Some(entry) = ks.entries.get(src) {
            entry.value.as_list().ok_or(EngineError::WrongType)?;
        } else {
            return Ok(None);
        }
        if let Some(entry) = ks.entries.get(dst) {
            entry.value.as_list().ok_or(EngineError::WrongType)?;
        }

        let popped = {
            let src_list = ks.entries.get_mut(src).expect("checked present above").value.as_list_mut().expect("checked type above");
            match from {
                ListEnd::Left => src_list.lpop(),
                ListEnd::Right => src_list.rpop(),
            }
        };
        let Some(value) = popped else {
            return Ok(None);
        };

        ks.auto_delete_if_empty(src);

        if !ks.entries.contains_key(dst) {
            ks.entries.insert(dst.to_vec(), Entry::new(Value::List(RedisList::new())));
        }
        let dst_list = ks.entries.get_mut(dst).expect("just ensured present").value.as_list_mut().expect("checked type above");
        match to {
            ListEnd::Left => dst_list.lpush(value.clone()),
            ListEnd::Right => dst_list.rpush(value.clone()),
        }

        Ok(Some(value.as_bytes().to_vec()))
    }
}
