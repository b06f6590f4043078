use db::commands::{Statement, parse_statement};
use db::engine::Engine;
use db::printer::ReplOutput;
use index::Rid;
use tempfile::TempDir;

fn create_test_engine() -> (Engine, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let engine = Engine::new(&db_path).unwrap();
    (engine, temp_dir)
}

fn run(engine: &Engine, input: &str) -> ReplOutput {
    let statement = parse_statement(input).unwrap().unwrap();
    engine.execute(&statement).unwrap()
}

#[test]
fn test_insert_get_remove_statements() {
    let (engine, _temp_dir) = create_test_engine();

    assert_eq!(run(&engine, "insert 7 3 1"), ReplOutput::message("INSERT 1"));
    assert_eq!(run(&engine, "insert 7 3 2"), ReplOutput::message("INSERT 1"));
    assert_eq!(engine.get(7).unwrap(), vec![Rid::new(3, 1), Rid::new(3, 2)]);

    let output = run(&engine, "get 7").to_string();
    assert!(output.contains("(2 rows)"), "{}", output);

    assert_eq!(run(&engine, "remove 7 3 1"), ReplOutput::message("REMOVE 1"));
    assert_eq!(run(&engine, "remove 7 3 1"), ReplOutput::message("REMOVE 0"));
    assert_eq!(engine.get(7).unwrap(), vec![Rid::new(3, 2)]);
}

#[test]
fn test_duplicate_pair_is_reported() {
    let (engine, _temp_dir) = create_test_engine();
    assert!(engine.insert(1, Rid::new(1, 1)).unwrap());

    match run(&engine, "insert 1 1 1") {
        ReplOutput::Message(msg) => assert!(msg.starts_with("INSERT 0"), "{}", msg),
        other => panic!("Expected Message output, got {:?}", other),
    }
    assert_eq!(engine.get(1).unwrap().len(), 1);
}

#[test]
fn test_size_grows_past_initial_buckets() {
    let (engine, _temp_dir) = create_test_engine();
    assert_eq!(
        run(&engine, "size"),
        ReplOutput::rows(["slots", "blocks"], vec![vec!["256".into(), "2".into()]])
    );

    for key in 0..300 {
        assert!(engine.insert(key, Rid::new(key as u64, 0)).unwrap());
    }
    assert_eq!(engine.size().unwrap(), 512);
    assert!(matches!(
        parse_statement("size").unwrap(),
        Some(Statement::Size)
    ));
}
