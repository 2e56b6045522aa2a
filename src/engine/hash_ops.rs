//! HSET..HSETNX operations on the `Hash` variant.

use super::Engine;
use crate::data::{Entry, RedisHash, Value, SDS};
use crate::error::{EngineError, EngineResult};

impl Engine {
    fn with_hash_mut<F, R>(&self, key: &[u8], create: bool, f: F) -> EngineResult<Option<R>>
    where
        F: FnOnce(&mut RedisHash) -> R,
    {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);

        if !ks.entries.contains_key(key) {
            if !create {
                return Ok(None);
            }
            ks.entries.insert(key.to_vec(), Entry::new(Value::Hash(RedisHash::new())));
        }

        let entry = ks.entries.get_mut(key).expect("just inserted or already present");
        let hash = entry.value.as_hash_mut().ok_or(EngineError::WrongType)?;
        let result = f(hash);
        ks.auto_delete_if_empty(key);
        Ok(Some(result))
    }

    pub fn hset(&self, key: Vec<u8>, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> EngineResult<usize> {
        Ok(self
            .with_hash_mut(&key, true, |hash| {
                let mut added = 0;
                for (field, value) in pairs {
                    let field_sds = SDS::new(field);
                    if hash.get(&field_sds).is_none() {
                        added += 1;
                    }
                    hash.set(field_sds, SDS::new(value));
                }
                added
            })?
            .expect("create=true always yields Some"))
    }

    pub fn hsetnx(&self, key: Vec<u8>, field: Vec<u8>, value: Vec<u8>) -> EngineResult<bool> {
        Ok(self
            .with_hash_mut(&key, true, |hash| {
                let field_sds = SDS::new(field);
                if hash.get(&field_sds).is_some() {
                    false
                } else {
                    hash.set(field_sds, SDS::new(value));
                    true
                }
            })?
            .expect("create=true always yields Some"))
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> EngineResult<Option<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(None),
            Some(entry) => Ok(entry
                .value
                .as_hash()
                .ok_or(EngineError::WrongType)?
                .get(&SDS::new(field.to_vec()))
                .map(|v| v.as_bytes().to_vec())),
        }
    }

    pub fn hdel(&self, key: &[u8], fields: Vec<Vec<u8>>) -> EngineResult<usize> {
        Ok(self
            .with_hash_mut(key, false, |hash| fields.into_iter().filter(|f| hash.delete(&SDS::new(f.clone()))).count())?
            .unwrap_or(0))
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> EngineResult<bool> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(false),
            Some(entry) => Ok(entry.value.as_hash().ok_or(EngineError::WrongType)?.exists(&SDS::new(field.to_vec()))),
        }
    }

    pub fn hlen(&self, key: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => Ok(entry.value.as_hash().ok_or(EngineError::WrongType)?.len()),
        }
    }

    pub fn hgetall(&self, key: &[u8]) -> EngineResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_hash()
                .ok_or(EngineError::WrongType)?
                .get_all()
                .into_iter()
                .map(|(f, v)| (f.as_bytes().to_vec(), v.as_bytes().to_vec()))
                .collect()),
        }
    }

    pub fn hkeys(&self, key: &[u8]) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_hash()
                .ok_or(EngineError::WrongType)?
                .keys()
                .into_iter()
                .map(|k| k.as_bytes().to_vec())
                .collect()),
        }
    }

    pub fn hvals(&self, key: &[u8]) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_hash()
                .ok_or(EngineError::WrongType)?
                .values()
                .into_iter()
                .map(|v| v.as_bytes().to_vec())
                .collect()),
        }
    }

    pub fn hincrby(&self, key: Vec<u8>, field: Vec<u8>, delta: i64) -> EngineResult<i64> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);
        if !ks.entries.contains_key(&key) {
            ks.entries.insert(key.clone(), Entry::new(Value::Hash(RedisHash::new())));
        }
        let hash = ks.entries.get_mut(&key).expect("just ensured present").value.as_hash_mut().ok_or(EngineError::WrongType)?;

        let field_sds = SDS::new(field);
        let current: i64 = match hash.get(&field_sds) {
            Some(v) => std::str::from_utf8(v.as_bytes()).ok().and_then(|s| s.parse().ok()).ok_or(EngineError::NotInteger)?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or(EngineError::Overflow)?;
        hash.set(field_sds, SDS::from_str(&next.to_string()));
        Ok(next)
    }

    pub fn hincrbyfloat(&self, key: Vec<u8>, field: Vec<u8>, delta: f64) -> EngineResult<f64> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(&key, now);
        if !ks.entries.contains_key(&key) {
            ks.entries.insert(key.clone(), Entry::new(Value::Hash(RedisHash::new())));
        }
        let hash = ks.entries.get_mut(&key).expect("just ensured present").value.as_hash_mut().ok_or(EngineError::WrongType)?;

        let field_sds = SDS::new(field);
        let current: f64 = match hash.get(&field_sds) {
            Some(v) => std::str::from_utf8(v.as_bytes()).ok().and_then(|s| s.parse().ok()).ok_or(EngineError::NotFloat)?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err(EngineError::InvalidValue);
        }
        hash.set(field_sds, SDS::from_str(&format!("{}", next)));
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_engine;

    #[test]
    fn hset_reports_only_newly_added_fields() {
        let (engine, _clock) = test_engine();
        assert_eq!(engine.hset(b"k".to_vec(), vec![(b"a".to_vec(), b"1".to_vec())]).unwrap(), 1);
        assert_eq!(engine.hset(b"k".to_vec(), vec![(b"a".to_vec(), b"2".to_vec())]).unwrap(), 0);
        assert_eq!(engine.hget(b"k", b"a").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn hsetnx_refuses_existing_field() {
        let (engine, _clock) = test_engine();
        engine.hsetnx(b"k".to_vec(), b"a".to_vec(), b"1".to_vec()).unwrap();
        assert!(!engine.hsetnx(b"k".to_vec(), b"a".to_vec(), b"2".to_vec()).unwrap());
        assert_eq!(engine.hget(b"k", b"a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn hdel_auto_deletes_emptied_hash() {
        let (engine, _clock) = test_engine();
        engine.hset(b"k".to_vec(), vec![(b"a".to_vec(), b"1".to_vec())]).unwrap();
        engine.hdel(b"k", vec![b"a".to_vec()]).unwrap();
        assert_eq!(engine.exists(&[b"k".to_vec()]), 0);
    }

    #[test]
    fn hincrby_creates_hash_and_accumulates() {
        let (engine, _clock) = test_engine();
        assert_eq!(engine.hincrby(b"k".to_vec(), b"n".to_vec(), 5).unwrap(), 5);
        assert_eq!(engine.hincrby(b"k".to_vec(), b"n".to_vec(), -2).unwrap(), 3);
    }
}
