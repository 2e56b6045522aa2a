//! SADD..SINTERCARD operations on the `Set` variant.
//!
//! `sunionstore`/`sinterstore`/`sdiffstore` favor auto-deletion over storing
//! an empty set: when the computed result is empty, the destination key is
//! removed (and the operation reports 0) rather than left holding an empty
//! aggregate, preserving the invariant that empty aggregates never persist.

use super::{Engine, Keyspace};
use crate::data::{Entry, RedisSet, Value, SDS};
use crate::error::{EngineError, EngineResult};
use ahash::AHashSet;
use rand::Rng;

/// Read `key` as a set (treating absent/expired as empty), using an
/// already-locked keyspace so multi-key set algebra stays inside one
/// critical section.
fn read_set_from(ks: &mut Keyspace, key: &[u8], now: i64) -> EngineResult<AHashSet<Vec<u8>>> {
    match ks.get(key, now) {
        None => Ok(AHashSet::new()),
        Some(entry) => Ok(entry
            .value
            .as_set()
            .ok_or(EngineError::WrongType)?
            .members()
            .into_iter()
            .map(|s| s.as_bytes().to_vec())
            .collect()),
    }
}

fn union_locked(ks: &mut Keyspace, keys: &[Vec<u8>], now: i64) -> EngineResult<Vec<Vec<u8>>> {
    let mut acc: AHashSet<Vec<u8>> = AHashSet::new();
    for key in keys {
        acc.extend(read_set_from(ks, key, now)?);
    }
    Ok(acc.into_iter().collect())
}

fn inter_locked(ks: &mut Keyspace, keys: &[Vec<u8>], now: i64) -> EngineResult<Vec<Vec<u8>>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut acc = read_set_from(ks, &keys[0], now)?;
    for key in &keys[1..] {
        let other = read_set_from(ks, key, now)?;
        acc.retain(|m| other.contains(m));
        if acc.is_empty() {
            break;
        }
    }
    Ok(acc.into_iter().collect())
}

fn diff_locked(ks: &mut Keyspace, keys: &[Vec<u8>], now: i64) -> EngineResult<Vec<Vec<u8>>> {
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let mut acc = read_set_from(ks, &keys[0], now)?;
    for key in &keys[1..] {
        let other = read_set_from(ks, key, now)?;
        acc.retain(|m| !other.contains(m));
    }
    Ok(acc.into_iter().collect())
}

/// Store `result` at `dst`, on the same locked keyspace the result was
/// computed from. An empty result auto-deletes `dst` instead of storing an
/// empty set.
fn store_result(ks: &mut Keyspace, dst: &[u8], result: Vec<Vec<u8>>) -> usize {
    if result.is_empty() {
        ks.entries.remove(dst);
        return 0;
    }
    let mut set = RedisSet::new();
    for m in &result {
        set.add(SDS::new(m.clone()));
    }
    let len = set.len();
    ks.entries.insert(dst.to_vec(), Entry::new(Value::Set(set)));
    len
}

impl Engine {
    fn with_set_mut<F, R>(&self, key: &[u8], create: bool, f: F) -> EngineResult<Option<R>>
    where
        F: FnOnce(&mut RedisSet) -> R,
    {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);

        if !ks.entries.contains_key(key) {
            if !create {
                return Ok(None);
            }
            ks.entries.insert(key.to_vec(), Entry::new(Value::Set(RedisSet::new())));
        }

        let entry = ks.entries.get_mut(key).expect("just inserted or already present");
        let set = entry.value.as_set_mut().ok_or(EngineError::WrongType)?;
        let result = f(set);
        ks.auto_delete_if_empty(key);
        Ok(Some(result))
    }

    pub fn sadd(&self, key: Vec<u8>, members: Vec<Vec<u8>>) -> EngineResult<usize> {
        Ok(self
            .with_set_mut(&key, true, |set| members.into_iter().filter(|m| set.add(SDS::new(m.clone()))).count())?
            .expect("create=true always yields Some"))
    }

    pub fn srem(&self, key: &[u8], members: Vec<Vec<u8>>) -> EngineResult<usize> {
        Ok(self
            .with_set_mut(key, false, |set| members.into_iter().filter(|m| set.remove(&SDS::new(m.clone()))).count())?
            .unwrap_or(0))
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> EngineResult<bool> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(false),
            Some(entry) => Ok(entry.value.as_set().ok_or(EngineError::WrongType)?.contains(&SDS::new(member.to_vec()))),
        }
    }

    pub fn smismember(&self, key: &[u8], members: &[Vec<u8>]) -> EngineResult<Vec<bool>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(vec![false; members.len()]),
            Some(entry) => {
                let set = entry.value.as_set().ok_or(EngineError::WrongType)?;
                Ok(members.iter().map(|m| set.contains(&SDS::new(m.clone()))).collect())
            }
        }
    }

    pub fn smembers(&self, key: &[u8]) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_set()
                .ok_or(EngineError::WrongType)?
                .members()
                .into_iter()
                .map(|s| s.as_bytes().to_vec())
                .collect()),
        }
    }

    pub fn scard(&self, key: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => Ok(entry.value.as_set().ok_or(EngineError::WrongType)?.len()),
        }
    }

    pub fn spop(&self, key: &[u8], count: Option<usize>) -> EngineResult<Vec<Vec<u8>>> {
        Ok(self
            .with_set_mut(key, false, |set| match count {
                None => set.pop().into_iter().map(|s| s.as_bytes().to_vec()).collect(),
                Some(n) => set.pop_count(n).into_iter().map(|s| s.as_bytes().to_vec()).collect(),
            })?
            .unwrap_or_default())
    }

    /// SRANDMEMBER: a non-removing random peek. `count = None` returns 0 or
    /// 1 member; `Some(n) >= 0` returns up to `n` distinct members; `Some(n)
    /// < 0` returns exactly `|n|` members, possibly with repeats.
    pub fn srandmember(&self, key: &[u8], count: Option<isize>) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let members: Vec<Vec<u8>> = match ks.get(key, now) {
            None => return Ok(Vec::new()),
            Some(entry) => entry
                .value
                .as_set()
                .ok_or(EngineError::WrongType)?
                .members()
                .into_iter()
                .map(|s| s.as_bytes().to_vec())
                .collect(),
        };
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let mut rng = rand::thread_rng();
        match count {
            None => Ok(vec![members[rng.gen_range(0..members.len())].clone()]),
            Some(n) if n >= 0 => {
                let mut shuffled = members;
                shuffled.sort();
                for i in (1..shuffled.len()).rev() {
                    shuffled.swap(i, rng.gen_range(0..=i));
                }
                shuffled.truncate(n as usize);
                Ok(shuffled)
            }
            Some(n) => Ok((0..n.unsigned_abs()).map(|_| members[rng.gen_range(0..members.len())].clone()).collect()),
        }
    }

    pub fn smove(&self, src: &[u8], dst: &[u8], member: Vec<u8>) -> EngineResult<bool> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(src, now);
        ks.evict_if_expired(dst, now);

        if let Some(entry) = ks.entries.get(src) {
            entry.value.as_set().ok_or(EngineError::WrongType)?;
        } else {
            return Ok(false);
        }
        if let Some(entry) = ks.entries.get(dst) {
            entry.value.as_set().ok_or(EngineError::WrongType)?;
        }

        let member_sds = SDS::new(member);
        let removed = ks
            .entries
            .get_mut(src)
            .expect("checked present above")
            .value
            .as_set_mut()
            .expect("checked type above")
            .remove(&member_sds);
        if !removed {
            return Ok(false);
        }
        ks.auto_delete_if_empty(src);

        if !ks.entries.contains_key(dst) {
            ks.entries.insert(dst.to_vec(), Entry::new(Value::Set(RedisSet::new())));
        }
        ks.entries.get_mut(dst).expect("just ensured present").value.as_set_mut().expect("checked type above").add(member_sds);
        Ok(true)
    }

    pub fn sunion(&self, keys: &[Vec<u8>]) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        union_locked(&mut ks, keys, now)
    }

    pub fn sinter(&self, keys: &[Vec<u8>]) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        inter_locked(&mut ks, keys, now)
    }

    pub fn sdiff(&self, keys: &[Vec<u8>]) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        diff_locked(&mut ks, keys, now)
    }

    pub fn sintercard(&self, keys: &[Vec<u8>], limit: Option<usize>) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let result = inter_locked(&mut ks, keys, now)?;
        Ok(match limit {
            Some(l) if l > 0 => result.len().min(l),
            _ => result.len(),
        })
    }

    pub fn sunionstore(&self, dst: &[u8], keys: &[Vec<u8>]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let result = union_locked(&mut ks, keys, now)?;
        Ok(store_result(&mut ks, dst, result))
    }

    pub fn sinterstore(&self, dst: &[u8], keys: &[Vec<u8>]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let result = inter_locked(&mut ks, keys, now)?;
        Ok(store_result(&mut ks, dst, result))
    }

    pub fn sdiffstore(&self, dst: &[u8], keys: &[Vec<u8>]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let result = diff_locked(&mut ks, keys, now)?;
        Ok(store_result(&mut ks, dst, result))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_engine;

    #[test]
    fn sadd_reports_only_newly_inserted() {
        let (engine, _clock) = test_engine();
        assert_eq!(engine.sadd(b"k".to_vec(), vec![b"a".to_vec(), b"b".to_vec()]).unwrap(), 2);
        assert_eq!(engine.sadd(b"k".to_vec(), vec![b"a".to_vec(), b"c".to_vec()]).unwrap(), 1);
    }

    #[test]
    fn srem_auto_deletes_emptied_set() {
        let (engine, _clock) = test_engine();
        engine.sadd(b"k".to_vec(), vec![b"a".to_vec()]).unwrap();
        engine.srem(b"k", vec![b"a".to_vec()]).unwrap();
        assert_eq!(engine.exists(&[b"k".to_vec()]), 0);
    }

    #[test]
    fn sinterstore_with_empty_result_deletes_destination() {
        let (engine, _clock) = test_engine();
        engine.sadd(b"a".to_vec(), vec![b"x".to_vec()]).unwrap();
        engine.sadd(b"b".to_vec(), vec![b"y".to_vec()]).unwrap();
        engine.set(b"dst".to_vec(), b"stale".to_vec(), None).unwrap();

        let count = engine.sinterstore(b"dst", &[b"a".to_vec(), b"b".to_vec()]).unwrap();
        assert_eq!(count, 0);
        assert_eq!(engine.exists(&[b"dst".to_vec()]), 0);
    }

    #[test]
    fn sunionstore_with_nonempty_result_persists() {
        let (engine, _clock) = test_engine();
        engine.sadd(b"a".to_vec(), vec![b"x".to_vec()]).unwrap();
        engine.sadd(b"b".to_vec(), vec![b"y".to_vec()]).unwrap();
        let count = engine.sunionstore(b"dst", &[b"a".to_vec(), b"b".to_vec()]).unwrap();
        assert_eq!(count, 2);
        assert_eq!(engine.scard(b"dst").unwrap(), 2);
    }

    #[test]
    fn smove_moves_member_between_sets() {
        let (engine, _clock) = test_engine();
        engine.sadd(b"src".to_vec(), vec![b"a".to_vec()]).unwrap();
        assert!(engine.smove(b"src", b"dst", b"a".to_vec()).unwrap());
        assert_eq!(engine.exists(&[b"src".to_vec()]), 0);
        assert!(engine.sismember(b"dst", b"a").unwrap());
    }
}
