//! Append-only log type: entries addressed by strictly-increasing `(ms, seq)`
//! ids, with consumer-group fan-out and per-consumer pending-entries lists.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }

    /// The next id for a caller that supplied only a millisecond part
    /// (e.g. `XADD key 123-* ...`): same ms, seq bumped by one.
    pub fn next_seq(self) -> Option<StreamId> {
        self.seq.checked_add(1).map(|seq| StreamId { ms: self.ms, seq })
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingEntry {
    pub consumer: String,
    pub delivery_time_ms: i64,
    pub delivery_count: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub last_delivered_id: StreamId,
    pub pending: AHashMap<StreamId, PendingEntry>,
}

/// Stream value: an ordered, append-only vector of entries plus any number
/// of independently-tracked consumer groups.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RedisStream {
    entries: Vec<StreamEntry>,
    last_id: StreamId,
    groups: AHashMap<String, ConsumerGroup>,
}

impl RedisStream {
    #[cfg(debug_assertions)]
    fn verify_invariants(&self) {
        debug_assert!(
            self.entries.windows(2).all(|w| w[0].id < w[1].id),
            "Invariant violated: stream entries must be strictly increasing by id"
        );
        if let Some(last) = self.entries.last() {
            debug_assert!(
                last.id <= self.last_id,
                "Invariant violated: last_id must be >= the last stored entry id"
            );
        }
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn verify_invariants(&self) {}

    pub fn new() -> Self {
        RedisStream::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_id(&self) -> StreamId {
        self.last_id
    }

    /// Resolve a caller-supplied id against the current stream state:
    /// `*` means "auto-generate from wall clock", `ms-*` bumps the seq of
    /// the last entry sharing that millisecond.
    pub fn resolve_id(&self, requested: Option<StreamId>, now_ms: i64) -> Result<StreamId, ()> {
        let candidate = match requested {
            None => {
                let now = now_ms.max(0) as u64;
                if now > self.last_id.ms {
                    StreamId::new(now, 0)
                } else {
                    self.last_id.next_seq().ok_or(())?
                }
            }
            Some(id) => id,
        };

        if !self.entries.is_empty() && candidate <= self.last_id {
            return Err(());
        }
        if self.entries.is_empty() && candidate == StreamId::MIN {
            return Err(());
        }
        Ok(candidate)
    }

    /// Append an entry. `id` must already be resolved and strictly greater
    /// than `last_id()`; callers use `resolve_id` first.
    pub fn append(&mut self, id: StreamId, fields: Vec<(Vec<u8>, Vec<u8>)>) -> Result<StreamId, ()> {
        if id <= self.last_id && !self.entries.is_empty() {
            return Err(());
        }
        if self.entries.is_empty() && id == StreamId::MIN {
            return Err(());
        }

        self.entries.push(StreamEntry { id, fields });
        self.last_id = id;

        self.verify_invariants();
        Ok(id)
    }

    fn position_of(&self, id: StreamId) -> Result<usize, usize> {
        self.entries.binary_search_by(|entry| entry.id.cmp(&id))
    }

    /// Entries with `start <= id <= end`, ascending.
    pub fn range(&self, start: StreamId, end: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        if start > end {
            return Vec::new();
        }
        let lo = match self.position_of(start) {
            Ok(i) => i,
            Err(i) => i,
        };
        let iter = self.entries[lo..].iter().take_while(|e| e.id <= end).cloned();
        match count {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }

    /// Entries with `start <= id <= end`, descending (XREVRANGE).
    pub fn rev_range(&self, end: StreamId, start: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let mut v = self.range(start, end, None);
        v.reverse();
        if let Some(n) = count {
            v.truncate(n);
        }
        v
    }

    /// Entries strictly after `after`, ascending (XREAD).
    pub fn after(&self, after: StreamId, count: Option<usize>) -> Vec<StreamEntry> {
        let lo = match self.position_of(after) {
            Ok(i) => i + 1,
            Err(i) => i,
        };
        match count {
            Some(n) => self.entries[lo..].iter().take(n).cloned().collect(),
            None => self.entries[lo..].to_vec(),
        }
    }

    pub fn delete(&mut self, ids: &[StreamId]) -> u64 {
        let before = self.entries.len();
        let id_set: ahash::AHashSet<StreamId> = ids.iter().copied().collect();
        self.entries.retain(|e| !id_set.contains(&e.id));
        self.verify_invariants();
        (before - self.entries.len()) as u64
    }

    pub fn trim_to_maxlen(&mut self, maxlen: usize) -> u64 {
        if self.entries.len() <= maxlen {
            return 0;
        }
        let remove = self.entries.len() - maxlen;
        self.entries.drain(0..remove);
        self.verify_invariants();
        remove as u64
    }

    pub fn group_create(&mut self, name: &str, start_id: StreamId) -> bool {
        if self.groups.contains_key(name) {
            return false;
        }
        self.groups.insert(
            name.to_string(),
            ConsumerGroup {
                last_delivered_id: start_id,
                pending: AHashMap::new(),
            },
        );
        true
    }

    pub fn group_destroy(&mut self, name: &str) -> bool {
        self.groups.remove(name).is_some()
    }

    pub fn group(&self, name: &str) -> Option<&ConsumerGroup> {
        self.groups.get(name)
    }

    /// Deliver the next `count` undelivered entries to `consumer` under
    /// group `group_name`, advancing the group cursor and recording each
    /// delivered id as pending.
    pub fn group_read(
        &mut self,
        group_name: &str,
        consumer: &str,
        count: usize,
        now_ms: i64,
    ) -> Option<Vec<StreamEntry>> {
        let cursor = self.groups.get(group_name)?.last_delivered_id;
        let entries = self.after(cursor, Some(count));
        if entries.is_empty() {
            return Some(entries);
        }

        let group = self.groups.get_mut(group_name)?;
        for entry in &entries {
            group.last_delivered_id = entry.id;
            group.pending.insert(
                entry.id,
                PendingEntry {
                    consumer: consumer.to_string(),
                    delivery_time_ms: now_ms,
                    delivery_count: 1,
                },
            );
        }
        Some(entries)
    }

    /// Fetch entries already pending for `consumer` starting at `after_id`
    /// (used for `XREADGROUP ... 0`/id replays rather than new deliveries).
    pub fn group_read_pending(&self, group_name: &str, consumer: &str, after: StreamId) -> Vec<StreamEntry> {
        let Some(group) = self.groups.get(group_name) else {
            return Vec::new();
        };
        let mut ids: Vec<StreamId> = group
            .pending
            .iter()
            .filter(|(id, p)| p.consumer == consumer && **id > after)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| {
                self.entries
                    .get(self.position_of(id).ok()?)
                    .cloned()
            })
            .collect()
    }

    pub fn ack(&mut self, group_name: &str, ids: &[StreamId]) -> u64 {
        let Some(group) = self.groups.get_mut(group_name) else {
            return 0;
        };
        let mut acked = 0;
        for id in ids {
            if group.pending.remove(id).is_some() {
                acked += 1;
            }
        }
        acked
    }

    pub fn pending_count(&self, group_name: &str) -> Option<usize> {
        self.groups.get(group_name).map(|g| g.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_rejects_non_increasing_ids() {
        let mut s = RedisStream::new();
        s.append(StreamId::new(5, 0), vec![]).unwrap();
        assert!(s.append(StreamId::new(5, 0), vec![]).is_err());
        assert!(s.append(StreamId::new(4, 0), vec![]).is_err());
        assert!(s.append(StreamId::new(5, 1), vec![]).is_ok());
    }

    #[test]
    fn range_is_inclusive_both_ends() {
        let mut s = RedisStream::new();
        for ms in 1..=5u64 {
            s.append(StreamId::new(ms, 0), vec![]).unwrap();
        }
        let r = s.range(StreamId::new(2, 0), StreamId::new(4, 0), None);
        assert_eq!(r.len(), 3);
        assert_eq!(r[0].id.ms, 2);
        assert_eq!(r[2].id.ms, 4);
    }

    #[test]
    fn group_read_advances_cursor_and_tracks_pending() {
        let mut s = RedisStream::new();
        for ms in 1..=3u64 {
            s.append(StreamId::new(ms, 0), vec![]).unwrap();
        }
        s.group_create("g1", StreamId::MIN);
        let delivered = s.group_read("g1", "c1", 10, 1000).unwrap();
        assert_eq!(delivered.len(), 3);
        assert_eq!(s.pending_count("g1"), Some(3));

        let acked = s.ack("g1", &[StreamId::new(1, 0)]);
        assert_eq!(acked, 1);
        assert_eq!(s.pending_count("g1"), Some(2));
    }

    #[test]
    fn trim_to_maxlen_drops_oldest() {
        let mut s = RedisStream::new();
        for ms in 1..=5u64 {
            s.append(StreamId::new(ms, 0), vec![]).unwrap();
        }
        let removed = s.trim_to_maxlen(2);
        assert_eq!(removed, 3);
        assert_eq!(s.len(), 2);
        assert_eq!(s.after(StreamId::MIN, None)[0].id.ms, 4);
    }
}
