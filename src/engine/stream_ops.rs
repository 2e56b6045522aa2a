//! XADD..XINFO operations on the `Stream` variant.

use super::Engine;
use crate::data::{Entry, RedisStream, StreamEntry, StreamId, Value};
use crate::error::{EngineError, EngineResult};

impl Engine {
    fn with_stream_mut<F, R>(&self, key: &[u8], create: bool, f: F) -> EngineResult<Option<R>>
    where
        F: FnOnce(&mut RedisStream) -> R,
    {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        ks.evict_if_expired(key, now);

        if !ks.entries.contains_key(key) {
            if !create {
                return Ok(None);
            }
            ks.entries.insert(key.to_vec(), Entry::new(Value::Stream(RedisStream::new())));
        }

        let entry = ks.entries.get_mut(key).expect("just inserted or already present");
        let stream = entry.value.as_stream_mut().ok_or(EngineError::WrongType)?;
        Ok(Some(f(stream)))
    }

    pub fn xadd(&self, key: Vec<u8>, id: Option<StreamId>, fields: Vec<(Vec<u8>, Vec<u8>)>, maxlen: Option<usize>) -> EngineResult<StreamId> {
        let now = self.now_ms();
        let result = self.with_stream_mut(&key, true, |stream| {
            let resolved = stream.resolve_id(id, now).map_err(|_| EngineError::StreamIdTooSmall)?;
            let appended = stream.append(resolved, fields).expect("resolve_id guarantees append succeeds");
            if let Some(maxlen) = maxlen {
                stream.trim_to_maxlen(maxlen);
            }
            Ok(appended)
        })?;
        result.expect("create=true always yields Some")
    }

    pub fn xlen(&self, key: &[u8]) -> EngineResult<usize> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(0),
            Some(entry) => Ok(entry.value.as_stream().ok_or(EngineError::WrongType)?.len()),
        }
    }

    pub fn xrange(&self, key: &[u8], start: StreamId, end: StreamId, count: Option<usize>) -> EngineResult<Vec<StreamEntry>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry.value.as_stream().ok_or(EngineError::WrongType)?.range(start, end, count)),
        }
    }

    pub fn xrevrange(&self, key: &[u8], end: StreamId, start: StreamId, count: Option<usize>) -> EngineResult<Vec<StreamEntry>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(Vec::new()),
            Some(entry) => Ok(entry.value.as_stream().ok_or(EngineError::WrongType)?.rev_range(end, start, count)),
        }
    }

    pub fn xdel(&self, key: &[u8], ids: &[StreamId]) -> EngineResult<u64> {
        Ok(self.with_stream_mut(key, false, |stream| stream.delete(ids))?.unwrap_or(0))
    }

    pub fn xtrim(&self, key: &[u8], maxlen: usize) -> EngineResult<u64> {
        Ok(self.with_stream_mut(key, false, |stream| stream.trim_to_maxlen(maxlen))?.unwrap_or(0))
    }

    pub fn xgroup_create(&self, key: Vec<u8>, group: &str, start_id: StreamId, mkstream: bool) -> EngineResult<bool> {
        Ok(self
            .with_stream_mut(&key, mkstream, |stream| stream.group_create(group, start_id))?
            .ok_or(EngineError::NoSuchKey)?)
    }

    pub fn xgroup_destroy(&self, key: &[u8], group: &str) -> EngineResult<bool> {
        Ok(self.with_stream_mut(key, false, |stream| stream.group_destroy(group))?.unwrap_or(false))
    }

    /// XREADGROUP. `id` of `None` means "new, undelivered entries"
    /// (the usual `>` id); `Some(after)` replays entries already pending
    /// for this consumer since `after` (the `0`/`0-0` id form), rather than
    /// advancing the group's delivery cursor.
    pub fn xreadgroup(
        &self,
        key: &[u8],
        group: &str,
        consumer: &str,
        count: usize,
        id: Option<StreamId>,
    ) -> EngineResult<Option<Vec<StreamEntry>>> {
        let now = self.now_ms();
        let result = self.with_stream_mut(key, false, |stream| match id {
            None => stream.group_read(group, consumer, count, now),
            Some(after) => Some(stream.group_read_pending(group, consumer, after)),
        })?;
        match result {
            None => Ok(None),
            Some(None) => Err(EngineError::NoGroup),
            Some(Some(entries)) => Ok(Some(entries)),
        }
    }

    pub fn xack(&self, key: &[u8], group: &str, ids: &[StreamId]) -> EngineResult<u64> {
        Ok(self.with_stream_mut(key, false, |stream| stream.ack(group, ids))?.unwrap_or(0))
    }

    pub fn xpending(&self, key: &[u8], group: &str) -> EngineResult<Option<usize>> {
        let now = self.now_ms();
        let mut ks = self.keyspace.lock();
        match ks.get(key, now) {
            None => Ok(None),
            Some(entry) => Ok(entry.value.as_stream().ok_or(EngineError::WrongType)?.pending_count(group)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_engine;
    use crate::data::StreamId;

    #[test]
    fn xadd_auto_id_and_xlen() {
        let (engine, _clock) = test_engine();
        let id = engine.xadd(b"s".to_vec(), None, vec![(b"field".to_vec(), b"value".to_vec())], None).unwrap();
        assert_eq!(id.ms, 1_000);
        assert_eq!(engine.xlen(b"s").unwrap(), 1);
    }

    #[test]
    fn xadd_explicit_id_must_increase() {
        let (engine, _clock) = test_engine();
        engine.xadd(b"s".to_vec(), Some(StreamId::new(5, 0)), vec![], None).unwrap();
        assert!(engine.xadd(b"s".to_vec(), Some(StreamId::new(5, 0)), vec![], None).is_err());
    }

    #[test]
    fn xreadgroup_new_then_replay_pending() {
        let (engine, _clock) = test_engine();
        engine.xadd(b"s".to_vec(), Some(StreamId::new(1, 0)), vec![], None).unwrap();
        engine.xgroup_create(b"s".to_vec(), "g", StreamId::MIN, false).unwrap();

        let delivered = engine.xreadgroup(b"s", "g", "c1", 10, None).unwrap().unwrap();
        assert_eq!(delivered.len(), 1);

        let replayed = engine.xreadgroup(b"s", "g", "c1", 10, Some(StreamId::MIN)).unwrap().unwrap();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].id, delivered[0].id);
    }

    #[test]
    fn xack_removes_from_pending() {
        let (engine, _clock) = test_engine();
        engine.xadd(b"s".to_vec(), Some(StreamId::new(1, 0)), vec![], None).unwrap();
        engine.xgroup_create(b"s".to_vec(), "g", StreamId::MIN, false).unwrap();
        engine.xreadgroup(b"s", "g", "c1", 10, None).unwrap();
        assert_eq!(engine.xack(b"s", "g", &[StreamId::new(1, 0)]).unwrap(), 1);
        assert_eq!(engine.xpending(b"s", "g").unwrap(), Some(0));
    }
}
