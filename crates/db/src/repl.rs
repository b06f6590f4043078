use std::fs;

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::commands::{MetaCommand, parse_meta_command, parse_statement};
use crate::engine::{Engine, stats_to_output};
use crate::history::resolve_history_path;
use crate::printer::{ReplOutput, print_output};

const PROMPT: &str = "clockdb> ";

pub fn run_repl(engine: &Engine) -> Result<()> {
    let history_path = resolve_history_path();
    if let Some(parent) = history_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context("create history directory")?;
    }

    let mut editor = DefaultEditor::new().context("initialize line editor")?;
    let _ = editor.load_history(&history_path);

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        if let Some(command) = parse_meta_command(input) {
            if handle_meta_command(engine, command) {
                break;
            }
            continue;
        }

        let result = parse_statement(input).and_then(|statement| match statement {
            Some(statement) => engine.execute(&statement).map(Some),
            None => Ok(None),
        });
        match result {
            Ok(Some(output)) => print_output(&output),
            Ok(None) => {}
            Err(err) => eprintln!("Error: {:#}", err),
        }
    }

    let _ = editor.save_history(&history_path);
    Ok(())
}

/// Runs a meta command; returns true when the shell should exit.
fn handle_meta_command(engine: &Engine, command: MetaCommand) -> bool {
    match command {
        MetaCommand::Quit => true,
        MetaCommand::Help => {
            print_help();
            false
        }
        MetaCommand::Flush => {
            let flushed = engine.flush();
            print_output(&ReplOutput::message(format!("flushed {} pages", flushed)));
            false
        }
        MetaCommand::Stats => {
            print_output(&stats_to_output(engine.buffer_pool()));
            false
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  insert <key> <page> <slot>  Map key to a record id");
    println!("  get <key>                   List record ids stored under key");
    println!("  remove <key> <page> <slot>  Remove one key/record id pair");
    println!("  size                        Show the index size in slots");
    println!("  flush                       Write dirty pages to disk");
    println!("  stats                       Show buffer pool counters");
    println!("  help                        Show this message");
    println!("  quit, exit, \\q              Exit the shell");
}
