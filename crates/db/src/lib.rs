pub mod commands;
pub mod engine;
pub mod history;
pub mod printer;
pub mod repl;
