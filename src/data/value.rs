//! The value type stored in the keyspace, and the expiring wrapper around it.

use super::{Hll, RedisHash, RedisList, RedisSet, RedisSortedSet, RedisStream, SDS};

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(SDS),
    List(RedisList),
    Set(RedisSet),
    Hash(RedisHash),
    SortedSet(RedisSortedSet),
    Stream(RedisStream),
    Hll(Hll),
}

impl Value {
    /// The type name surfaced by the TYPE command.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
            Value::SortedSet(_) => "zset",
            Value::Stream(_) => "stream",
            // HLLs are Redis strings at the protocol boundary; the internal
            // tag just lets us avoid re-parsing the blob on every call.
            Value::Hll(_) => "string",
        }
    }

    pub fn as_string(&self) -> Option<&SDS> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut SDS> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&RedisList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut RedisList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&RedisSet> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut RedisSet> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<&RedisHash> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut RedisHash> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_sorted_set(&self) -> Option<&RedisSortedSet> {
        match self {
            Value::SortedSet(zs) => Some(zs),
            _ => None,
        }
    }

    pub fn as_sorted_set_mut(&mut self) -> Option<&mut RedisSortedSet> {
        match self {
            Value::SortedSet(zs) => Some(zs),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&RedisStream> {
        match self {
            Value::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_stream_mut(&mut self) -> Option<&mut RedisStream> {
        match self {
            Value::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_hll(&self) -> Option<&Hll> {
        match self {
            Value::Hll(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hll_mut(&mut self) -> Option<&mut Hll> {
        match self {
            Value::Hll(h) => Some(h),
            _ => None,
        }
    }

    /// Whether this variant is considered "empty" and should be deleted
    /// from the keyspace after a mutation drains it (lists, sets, hashes,
    /// sorted sets, streams all auto-delete; strings and HLLs never do).
    pub fn is_empty_aggregate(&self) -> bool {
        match self {
            Value::List(l) => l.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::Hash(h) => h.is_empty(),
            Value::SortedSet(zs) => zs.is_empty(),
            Value::Stream(_) => false,
            Value::String(_) | Value::Hll(_) => false,
        }
    }
}

/// A keyspace entry: the stored value plus its optional expiration time,
/// in Unix milliseconds. `None` means the key never expires.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub value: Value,
    pub expires_at: Option<i64>,
}

impl Entry {
    pub fn new(value: Value) -> Self {
        Entry {
            value,
            expires_at: None,
        }
    }

    pub fn with_expiry(value: Value, expires_at: i64) -> Self {
        Entry {
            value,
            expires_at: Some(expires_at),
        }
    }

    /// Whether this entry has passed its expiration as of `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        match self.expires_at {
            Some(at) => now_ms >= at,
            None => false,
        }
    }
}
