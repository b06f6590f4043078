use std::collections::HashMap;
use std::thread;

use index::{LinearProbeHashTable, Rid, SipKeyHasher};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use storage::{BufferPoolManager, FileDiskManager, MemoryDiskManager};
use tempfile::TempDir;

type RidIndex = LinearProbeHashTable<i64, Rid>;

#[test]
fn test_index_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("index.db");

    let header_page_id = {
        let bpm = BufferPoolManager::new(FileDiskManager::open(&path).unwrap(), 8);
        let index = RidIndex::new(bpm.clone(), 64, SipKeyHasher).unwrap();
        for key in 0..500i64 {
            assert!(index.insert(&key, &Rid::new(key as u64 + 1, 7)).unwrap());
        }
        // 64 -> 128 -> 256 -> 512
        assert_eq!(index.size().unwrap(), 512);
        bpm.flush_all_pages();
        index.header_page_id()
    };

    let bpm = BufferPoolManager::new(FileDiskManager::open(&path).unwrap(), 8);
    let index = RidIndex::open(bpm, header_page_id, SipKeyHasher).unwrap();
    assert_eq!(index.size().unwrap(), 512);
    for key in 0..500i64 {
        assert_eq!(
            index.get_value(&key).unwrap(),
            vec![Rid::new(key as u64 + 1, 7)]
        );
    }
    assert!(index.get_value(&500).unwrap().is_empty());
}

#[test]
fn test_random_workload_matches_model() {
    let bpm = BufferPoolManager::new(MemoryDiskManager::new(), 6);
    let index = RidIndex::new(bpm.clone(), 16, SipKeyHasher).unwrap();
    let mut rng = StdRng::seed_from_u64(0xC10C);
    let mut model: HashMap<i64, Vec<Rid>> = HashMap::new();

    for _ in 0..3_000 {
        let key = rng.gen_range(0..200i64);
        let rid = Rid::new(rng.gen_range(1..4), rng.gen_range(0..4));
        let values = model.entry(key).or_default();
        if rng.gen_bool(0.7) {
            let fresh = !values.contains(&rid);
            // Tombstone reuse can hide an identical pair further down the
            // chain, so only fresh pairs are checked for acceptance.
            if fresh {
                assert!(index.insert(&key, &rid).unwrap());
                values.push(rid);
            }
        } else {
            let present = values.iter().position(|v| *v == rid);
            assert_eq!(index.remove(&key, &rid).unwrap(), present.is_some());
            if let Some(position) = present {
                values.swap_remove(position);
            }
        }
    }

    for (key, expected) in &model {
        let mut found = index.get_value(key).unwrap();
        let mut expected = expected.clone();
        found.sort();
        expected.sort();
        assert_eq!(found, expected, "key {}", key);
    }
    assert_eq!(bpm.evictable_count(), bpm.resident_page_count());
}

#[test]
fn test_concurrent_inserts_and_lookups() {
    let bpm = BufferPoolManager::new(MemoryDiskManager::new(), 16);
    let index = RidIndex::new(bpm.clone(), 32, SipKeyHasher).unwrap();

    thread::scope(|scope| {
        for worker in 0..4i64 {
            let index = &index;
            scope.spawn(move || {
                for n in 0..500i64 {
                    let key = worker * 1_000 + n;
                    assert!(index.insert(&key, &Rid::new(worker as u64, n as u32)).unwrap());
                    assert!(!index.get_value(&key).unwrap().is_empty());
                }
            });
        }
    });

    assert!(index.size().unwrap() >= 2_000);
    for worker in 0..4i64 {
        for n in 0..500i64 {
            assert_eq!(
                index.get_value(&(worker * 1_000 + n)).unwrap(),
                vec![Rid::new(worker as u64, n as u32)]
            );
        }
    }
    assert_eq!(bpm.evictable_count(), bpm.resident_page_count());
}
