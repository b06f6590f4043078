use db::engine::{Engine, INDEX_HEADER_PAGE_ID};
use index::Rid;
use storage::BufferPoolConfig;
use tempfile::TempDir;

#[test]
fn test_entries_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    {
        let engine = Engine::open(&db_path, &BufferPoolConfig::new(4), 16).unwrap();
        for key in 0..100 {
            assert!(engine.insert(key, Rid::new(key as u64 + 10, 1)).unwrap());
        }
        assert!(engine.remove(50, Rid::new(60, 1)).unwrap());
        // Dropping the engine flushes the dirty pages.
    }

    let engine = Engine::open(&db_path, &BufferPoolConfig::new(4), 16).unwrap();
    assert_eq!(engine.size().unwrap(), 128);
    for key in 0..100 {
        let expected = if key == 50 {
            Vec::new()
        } else {
            vec![Rid::new(key as u64 + 10, 1)]
        };
        assert_eq!(engine.get(key).unwrap(), expected);
    }
}

#[test]
fn test_buckets_only_apply_to_new_files() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    drop(Engine::open(&db_path, &BufferPoolConfig::default(), 32).unwrap());
    let engine = Engine::open(&db_path, &BufferPoolConfig::default(), 1024).unwrap();
    assert_eq!(engine.size().unwrap(), 32);
    assert_eq!(INDEX_HEADER_PAGE_ID, 1);
}

#[test]
fn test_explicit_flush_writes_dirty_pages() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    let engine = Engine::new(&db_path).unwrap();
    assert!(engine.insert(5, Rid::new(1, 2)).unwrap());
    assert!(engine.flush() >= 1);
    assert_eq!(engine.flush(), 0);
    assert!(engine.stats().flushes >= 1);
}

#[test]
fn test_zero_pool_size_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let err = Engine::open(&db_path, &BufferPoolConfig::new(0), 16)
        .err()
        .expect("zero frames must fail");
    assert!(format!("{:#}", err).contains("pool_size"));
}
