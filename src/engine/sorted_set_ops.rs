//! ZADD..ZRANDMEMBER operations on the `SortedSet` variant.

use super::Engine;
use crate::data::{Entry, RedisSortedSet, Value, SDS};
use crate::error::{EngineError, EngineResult};
use rand::Rng;

#[derive(Debug, Clone, Copy, Default)]
pub struct ZAddOptions {
    pub nx: bool,
    pub xx: bool,
    pub ch: bool,
}

impl Engine {
    fn with_zset_mut<F, R>(&self, key: &[u8], create: bool, f: F) -> EngineResult<Option<R>>
    where
        F: FnOnce(&mut RedisSortedSet) -> R,
    {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);

        if !ks.entries.contains_key(key) {
            if !create {
                return Ok(None);
            }
            ks.entries.insert(key.to_vec(), Entry::new(Value::SortedSet(RedisSortedSet::new())));
        }

        let entry = ks.entries.get_mut(key).expect("just inserted or already present");
        let zset = entry.value.as_sorted_set_mut().ok_or(EngineError::WrongType)?;
        let result = f(zset);
        ks.auto_delete_if_empty(key);
        Ok(Some(result))
    }

    /// Returns the number of members added (or changed, if `options.ch`).
    pub fn zadd(&self, key: Vec<u8>, members: Vec<(Vec<u8>, f64)>, options: ZAddOptions) -> EngineResult<usize> {
        Ok(self
            .with_zset_mut(&key, !options.xx, |zset| {
                let mut changed = 0;
                for (member, score) in members {
                    let sds = SDS::new(member);
                    let exists = zset.score(&sds).is_some();
                    if (options.nx && exists) || (options.xx && !exists) {
                        continue;
                    }
                    let score_changed = zset.score(&sds) != Some(score);
                    let inserted = zset.add(sds, score);
                    if inserted || (options.ch && score_changed) {
                        changed += 1;
                    }
                }
                changed
            })?
            .unwrap_or(0))
    }

    pub fn zrem(&self, key: &[u8], members: Vec<Vec<u8>>) -> EngineResult<usize> {
        Ok(self
            .with_zset_mut(key, false, |zset| members.into_iter().filter(|m| zset.remove(&SDS::new(m.clone()))).count())?
            .unwrap_or(0))
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> EngineResult<Option<f64>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(None),
            Some(entry) => Ok(entry.value.as_sorted_set().ok_or(EngineError::WrongType)?.score(&SDS::new(member.to_vec()))),
        }
    }

    pub fn zmscore(&self, key: &[u8], members: &[Vec<u8>]) -> EngineResult<Vec<Option<f64>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(vec![None; members.len()]),
            Some(entry) => {
                let zset = entry.value.as_sorted_set().ok_or(EngineError::WrongType)?;
                Ok(members.iter().map(|m| zset.score(&SDS::new(m.clone()))).collect())
            }
        }
    }

    pub fn zcard(&self, key: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => Ok(entry.value.as_sorted_set().ok_or(EngineError::WrongType)?.len()),
        }
    }

    pub fn zrank(&self, key: &[u8], member: &[u8]) -> EngineResult<Option<usize>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(None),
            Some(entry) => Ok(entry.value.as_sorted_set().ok_or(EngineError::WrongType)?.rank(&SDS::new(member.to_vec()))),
        }
    }

    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> EngineResult<Option<usize>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(None),
            Some(entry) => {
                let zset = entry.value.as_sorted_set().ok_or(EngineError::WrongType)?;
                Ok(zset.rank(&SDS::new(member.to_vec())).map(|r| zset.len() - 1 - r))
            }
        }
    }

    pub fn zrange(&self, key: &[u8], start: isize, stop: isize) -> EngineResult<Vec<(Vec<u8>, f64)>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_sorted_set()
                .ok_or(EngineError::WrongType)?
                .range(start, stop)
                .into_iter()
                .map(|(m, s)| (m.as_bytes().to_vec(), s))
                .collect()),
        }
    }

    pub fn zrevrange(&self, key: &[u8], start: isize, stop: isize) -> EngineResult<Vec<(Vec<u8>, f64)>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry
                .value
                .as_sorted_set()
                .ok_or(EngineError::WrongType)?
                .rev_range(start, stop)
                .into_iter()
                .map(|(m, s)| (m.as_bytes().to_vec(), s))
                .collect()),
        }
    }

    pub fn zrangebyscore(&self, key: &[u8], min: &str, max: &str, limit: Option<(isize, usize)>) -> EngineResult<Vec<(Vec<u8>, f64)>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => {
                let zset = entry.value.as_sorted_set().ok_or(EngineError::WrongType)?;
                let results = zset.range_by_score(min, max, true, limit).map_err(|_| EngineError::InvalidValue)?;
                Ok(results.into_iter().map(|(m, s)| (m.into_bytes(), s.expect("with_scores=true"))).collect())
            }
        }
    }

    pub fn zrevrangebyscore(&self, key: &[u8], max: &str, min: &str, limit: Option<(isize, usize)>) -> EngineResult<Vec<(Vec<u8>, f64)>> {
        let mut result = self.zrangebyscore(key, min, max, None)?;
        result.reverse();
        if let Some((offset, count)) = limit {
            let start = offset.max(0) as usize;
            result = result.into_iter().skip(start).take(count).collect();
        }
        Ok(result)
    }

    pub fn zcount(&self, key: &[u8], min: &str, max: &str) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => entry
                .value
                .as_sorted_set()
                .ok_or(EngineError::WrongType)?
                .count_in_range(min, max)
                .map_err(|_| EngineError::InvalidValue),
        }
    }

    pub fn zincrby(&self, key: Vec<u8>, member: Vec<u8>, delta: f64) -> EngineResult<f64> {
        self.with_zset_mut(&key, true, |zset| {
            let sds = SDS::new(member);
            let next = zset.score(&sds).unwrap_or(0.0) + delta;
            zset.add(sds, next);
            next
        })
        .map(|r| r.expect("create=true always yields Some"))
    }

    pub fn zpopmin(&self, key: &[u8], count: usize) -> EngineResult<Vec<(Vec<u8>, f64)>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .with_zset_mut(key, false, |zset| {
                let picked = zset.range(0, (count - 1) as isize);
                for (m, _) in &picked {
                    zset.remove(m);
                }
                picked.into_iter().map(|(m, s)| (m.as_bytes().to_vec(), s)).collect()
            })?
            .unwrap_or_default())
    }

    pub fn zpopmax(&self, key: &[u8], count: usize) -> EngineResult<Vec<(Vec<u8>, f64)>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .with_zset_mut(key, false, |zset| {
                let picked = zset.rev_range(0, (count - 1) as isize);
                for (m, _) in &picked {
                    zset.remove(m);
                }
                picked.into_iter().map(|(m, s)| (m.as_bytes().to_vec(), s)).collect()
            })?
            .unwrap_or_default())
    }

    pub fn zrandmember(&self, key: &[u8], count: Option<isize>) -> EngineResult<Vec<Vec<u8>>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        let members: Vec<Vec<u8>> = match ks.get(key, now) {
            None => return Ok(Vec::new()),
            Some(entry) => entry
                .value
                .as_sorted_set()
                .ok_or(EngineError::WrongType)?
                .iter()
                .map(|(m, _)| m.as_bytes().to_vec())
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
                for i in (1..shuffled.len()).rev() {
                    shuffled.swap(i, rng.gen_range(0..=i));
                }
                shuffled.truncate(n as usize);
                Ok(shuffled)
            }
            Some(n) => Ok((0..n.unsigned_abs()).map(|_| members[rng.gen_range(0..members.len())].clone()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_engine;
    use super::ZAddOptions;

    #[test]
    fn zadd_plain_reports_insert_count() {
        let (engine, _clock) = test_engine();
        let n = engine.zadd(b"k".to_vec(), vec![(b"a".to_vec(), 1.0), (b"b".to_vec(), 2.0)], ZAddOptions::default()).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn zadd_nx_skips_existing_members() {
        let (engine, _clock) = test_engine();
        engine.zadd(b"k".to_vec(), vec![(b"a".to_vec(), 1.0)], ZAddOptions::default()).unwrap();
        let opts = ZAddOptions { nx: true, ..Default::default() };
        engine.zadd(b"k".to_vec(), vec![(b"a".to_vec(), 99.0)], opts).unwrap();
        assert_eq!(engine.zscore(b"k", b"a").unwrap(), Some(1.0));
    }

    #[test]
    fn zadd_ch_counts_score_changes() {
        let (engine, _clock) = test_engine();
        engine.zadd(b"k".to_vec(), vec![(b"a".to_vec(), 1.0)], ZAddOptions::default()).unwrap();
        let opts = ZAddOptions { ch: true, ..Default::default() };
        let changed = engine.zadd(b"k".to_vec(), vec![(b"a".to_vec(), 2.0)], opts).unwrap();
        assert_eq!(changed, 1);
    }

    #[test]
    fn zpopmin_removes_lowest_scores() {
        let (engine, _clock) = test_engine();
        engine
            .zadd(b"k".to_vec(), vec![(b"a".to_vec(), 3.0), (b"b".to_vec(), 1.0), (b"c".to_vec(), 2.0)], ZAddOptions::default())
            .unwrap();
        let popped = engine.zpopmin(b"k", 2).unwrap();
        assert_eq!(popped, vec![(b"b".to_vec(), 1.0), (b"c".to_vec(), 2.0)]);
        assert_eq!(engine.zcard(b"k").unwrap(), 1);
    }

    #[test]
    fn zrank_and_zrevrank_are_mirror_images() {
        let (engine, _clock) = test_engine();
        engine
            .zadd(b"k".to_vec(), vec![(b"a".to_vec(), 1.0), (b"b".to_vec(), 2.0), (b"c".to_vec(), 3.0)], ZAddOptions::default())
            .unwrap();
        assert_eq!(engine.zrank(b"k", b"a").unwrap(), Some(0));
        assert_eq!(engine.zrevrank(b"k", b"a").unwrap(), Some(2));
    }
}
