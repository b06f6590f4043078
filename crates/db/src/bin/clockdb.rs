use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use db::engine::{DEFAULT_BUCKETS, Engine};
use db::repl::run_repl;
use storage::{BufferPoolConfig, DEFAULT_POOL_SIZE};

#[derive(Parser, Debug)]
#[command(name = "clockdb", version, about = "Interactive shell over a persistent hash index")]
struct Args {
    /// Database file path
    #[arg(long, value_name = "PATH", default_value = "clock.db")]
    db: PathBuf,

    /// Number of buffer pool frames
    #[arg(long, value_name = "N", default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Slots of the index created for a new database file
    #[arg(long, value_name = "N", default_value_t = DEFAULT_BUCKETS)]
    buckets: usize,
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Environment variables override CLI args
    let db_path: PathBuf = if let Ok(path) = env::var("CLOCKDB_PATH") {
        path.into()
    } else {
        args.db
    };

    let pool_size = if let Ok(value) = env::var("CLOCKDB_POOL_SIZE") {
        value.parse().context("invalid CLOCKDB_POOL_SIZE value")?
    } else {
        args.pool_size
    };

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("create db directory")?;
    }

    println!("clockdb v{}", env!("CARGO_PKG_VERSION"));
    println!("Using database file: {}", db_path.display());

    let engine = Engine::open(&db_path, &BufferPoolConfig::new(pool_size), args.buckets)?;
    run_repl(&engine)
}
