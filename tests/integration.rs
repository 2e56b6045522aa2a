//! End-to-end scenarios against the public `Engine` API, exercising whole
//! operations together rather than one method per test.

use cachecore::engine::{BitOp, ListEnd, ZAddOptions, SET_EXPIRY_GT, SET_EXPIRY_LT};
use cachecore::time::Clock;
use cachecore::Engine;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

struct FixedClock(AtomicI64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

fn engine_at(now_ms: i64) -> (Engine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock(AtomicI64::new(now_ms)));
    (Engine::with_clock(clock.clone()), clock)
}

#[test]
fn scenario_list_order_and_auto_delete() {
    let (engine, _clock) = engine_at(1_000);
    assert_eq!(engine.rpush(b"k".to_vec(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]).unwrap(), 3);
    assert_eq!(engine.lrange(b"k", 0, -1).unwrap(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    engine.lpush(b"k".to_vec(), vec![b"z".to_vec()]).unwrap();
    assert_eq!(engine.lrange(b"k", 0, -1).unwrap(), vec![b"z".to_vec(), b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    let popped = engine.lpop(b"k", Some(4)).unwrap();
    assert_eq!(popped, vec![b"z".to_vec(), b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    assert_eq!(engine.exists(&[b"k".to_vec()]), 0);
}

#[test]
fn scenario_sorted_set_tie_breaking() {
    let (engine, _clock) = engine_at(1_000);
    let members = vec![(b"charlie".to_vec(), 1.0), (b"alpha".to_vec(), 1.0), (b"beta".to_vec(), 1.0)];
    let added = engine.zadd(b"z".to_vec(), members, ZAddOptions::default()).unwrap();
    assert_eq!(added, 3);

    let range = engine.zrange(b"z", 0, -1).unwrap();
    let names: Vec<Vec<u8>> = range.into_iter().map(|(m, _)| m).collect();
    assert_eq!(names, vec![b"alpha".to_vec(), b"beta".to_vec(), b"charlie".to_vec()]);

    assert_eq!(engine.zrangebyscore(b"z", "(1", "1", None).unwrap(), Vec::new());

    let inclusive = engine.zrangebyscore(b"z", "1", "1", None).unwrap();
    let inclusive_names: Vec<Vec<u8>> = inclusive.into_iter().map(|(m, _)| m).collect();
    assert_eq!(inclusive_names, vec![b"alpha".to_vec(), b"beta".to_vec(), b"charlie".to_vec()]);
}

#[test]
fn scenario_expiration_laziness() {
    let (engine, clock) = engine_at(1_000);
    engine.set(b"k".to_vec(), b"v".to_vec(), Some(1_500)).unwrap();
    assert_eq!(engine.db_size(), 1);

    clock.0.store(2_000, Ordering::SeqCst);
    assert_eq!(engine.get(b"k").unwrap(), None);
    assert_eq!(engine.db_size(), 0);
}

#[test]
fn scenario_incr_wrong_type_and_overflow() {
    let (engine, _clock) = engine_at(1_000);
    engine.lpush(b"k".to_vec(), vec![b"a".to_vec()]).unwrap();
    assert!(engine.incr_by(b"k".to_vec(), 1).is_err());

    engine.set(b"n".to_vec(), b"9223372036854775806".to_vec(), None).unwrap();
    assert!(engine.incr_by(b"n".to_vec(), 2).is_err());
    assert_eq!(engine.get(b"n").unwrap(), Some(b"9223372036854775806".to_vec()));
}

#[test]
fn scenario_zadd_nx_xx_ch() {
    let (engine, _clock) = engine_at(1_000);
    let added = engine.zadd(b"z".to_vec(), vec![(b"a".to_vec(), 1.0), (b"b".to_vec(), 2.0)], ZAddOptions::default()).unwrap();
    assert_eq!(added, 2);

    let nx = ZAddOptions { nx: true, ..Default::default() };
    let added_nx = engine.zadd(b"z".to_vec(), vec![(b"a".to_vec(), 9.0), (b"c".to_vec(), 9.0)], nx).unwrap();
    assert_eq!(added_nx, 1);
    assert_eq!(engine.zscore(b"z", b"a").unwrap(), Some(1.0));

    let xx_ch = ZAddOptions { xx: true, ch: true, ..Default::default() };
    let changed = engine.zadd(b"z".to_vec(), vec![(b"a".to_vec(), 5.0), (b"nonexistent".to_vec(), 5.0)], xx_ch).unwrap();
    assert_eq!(changed, 1);
}

#[test]
fn scenario_dump_restore_roundtrip_with_ttl() {
    let (engine, clock) = engine_at(1_000);
    engine.hset(b"h".to_vec(), vec![(b"f1".to_vec(), b"v1".to_vec()), (b"f2".to_vec(), b"v2".to_vec())]).unwrap();
    engine.set_expiry(b"h", Some(101_000), 0).unwrap();

    let blob = engine.dump_value(b"h").unwrap().expect("key exists");
    engine.restore_value(b"h2".to_vec(), &blob, 500, false).unwrap();

    let mut pairs = engine.hgetall(b"h2").unwrap();
    pairs.sort();
    let mut expected = vec![(b"f1".to_vec(), b"v1".to_vec()), (b"f2".to_vec(), b"v2".to_vec())];
    expected.sort();
    assert_eq!(pairs, expected);

    let ttl = engine.get_ttl_ms(b"h2");
    assert!((0..=500).contains(&ttl), "ttl {ttl} out of range");
    let _ = clock;
}

#[test]
fn scenario_lmove_rotation_keeps_key_present() {
    let (engine, _clock) = engine_at(1_000);
    engine.rpush(b"k".to_vec(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]).unwrap();
    let moved = engine.lmove(b"k", b"k", ListEnd::Left, ListEnd::Right).unwrap();
    assert_eq!(moved, Some(b"a".to_vec()));
    assert_eq!(engine.lrange(b"k", 0, -1).unwrap(), vec![b"b".to_vec(), b"c".to_vec(), b"a".to_vec()]);
    assert_eq!(engine.exists(&[b"k".to_vec()]), 1);
}

#[test]
fn scenario_bitcount_and_bitop_not() {
    let (engine, _clock) = engine_at(1_000);
    engine.set(b"k".to_vec(), vec![0xff, 0x00, 0xff], None).unwrap();
    assert_eq!(engine.bitcount(b"k", None).unwrap(), 16);

    engine.bitop(BitOp::Not, b"d".to_vec(), &[b"k".to_vec()]).unwrap();
    assert_eq!(engine.get(b"d").unwrap(), Some(vec![0x00, 0xff, 0x00]));
}

#[test]
fn universal_invariant_bitop_xor_with_itself_is_zero() {
    let (engine, _clock) = engine_at(1_000);
    engine.set(b"a".to_vec(), b"whatever bytes".to_vec(), None).unwrap();
    engine.bitop(BitOp::Xor, b"d".to_vec(), &[b"a".to_vec(), b"a".to_vec()]).unwrap();
    assert_eq!(engine.bitcount(b"d", None).unwrap(), 0);
}

#[test]
fn universal_invariant_lindex_matches_single_element_lrange() {
    let (engine, _clock) = engine_at(1_000);
    engine.rpush(b"k".to_vec(), vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]).unwrap();
    for i in 0..3isize {
        let one = engine.lrange(b"k", i, i).unwrap();
        assert_eq!(engine.lindex(b"k", i).unwrap(), Some(one[0].clone()));
    }
}

#[test]
fn universal_invariant_setexpiry_gt_lt_fail_without_current_expiry() {
    let (engine, _clock) = engine_at(1_000);
    engine.set(b"k".to_vec(), b"v".to_vec(), None).unwrap();
    assert!(!engine.set_expiry(b"k", Some(5_000), SET_EXPIRY_GT).unwrap());
    assert!(!engine.set_expiry(b"k", Some(5_000), SET_EXPIRY_LT).unwrap());
}
