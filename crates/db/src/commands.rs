//! Parsing of shell input.
//!
//! Meta commands act on the shell and the buffer pool (`help`, `quit`,
//! `flush`, `stats`). Statements read or change the index.

use std::fmt;

use anyhow::{Context, Result, bail};
use index::Rid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaCommand {
    Quit,
    Help,
    Flush,
    Stats,
}

impl fmt::Display for MetaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaCommand::Quit => write!(f, "quit"),
            MetaCommand::Help => write!(f, "help"),
            MetaCommand::Flush => write!(f, "flush"),
            MetaCommand::Stats => write!(f, "stats"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert { key: i64, rid: Rid },
    Get { key: i64 },
    Remove { key: i64, rid: Rid },
    Size,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Insert { key, rid } => {
                write!(f, "insert {} {} {}", key, rid.page_id, rid.slot_id)
            }
            Statement::Get { key } => write!(f, "get {}", key),
            Statement::Remove { key, rid } => {
                write!(f, "remove {} {} {}", key, rid.page_id, rid.slot_id)
            }
            Statement::Size => write!(f, "size"),
        }
    }
}

fn normalize(input: &str) -> String {
    input.trim().trim_end_matches(';').trim().to_lowercase()
}

pub fn parse_meta_command(input: &str) -> Option<MetaCommand> {
    match normalize(input).as_str() {
        "\\q" | "\\quit" | ".quit" | ".exit" | "quit" | "exit" => Some(MetaCommand::Quit),
        "\\help" | ".help" | "help" => Some(MetaCommand::Help),
        "\\flush" | ".flush" | "flush" => Some(MetaCommand::Flush),
        "\\stats" | ".stats" | "stats" => Some(MetaCommand::Stats),
        _ => None,
    }
}

/// Parses an index statement.
///
/// Returns `Ok(None)` for blank input.
pub fn parse_statement(input: &str) -> Result<Option<Statement>> {
    let normalized = normalize(input);
    let mut words = normalized.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let statement = match (verb, args.as_slice()) {
        ("insert", [key, page, slot]) => Statement::Insert {
            key: parse_key(key)?,
            rid: parse_rid(page, slot)?,
        },
        ("insert", _) => bail!("usage: insert <key> <page> <slot>"),
        ("get", [key]) => Statement::Get {
            key: parse_key(key)?,
        },
        ("get", _) => bail!("usage: get <key>"),
        ("remove", [key, page, slot]) => Statement::Remove {
            key: parse_key(key)?,
            rid: parse_rid(page, slot)?,
        },
        ("remove", _) => bail!("usage: remove <key> <page> <slot>"),
        ("size", []) => Statement::Size,
        ("size", _) => bail!("usage: size"),
        _ => bail!("unknown command '{}', try help", verb),
    };
    Ok(Some(statement))
}

fn parse_key(word: &str) -> Result<i64> {
    word.parse()
        .with_context(|| format!("key must be an integer, got '{}'", word))
}

fn parse_rid(page: &str, slot: &str) -> Result<Rid> {
    let page_id = page
        .parse()
        .with_context(|| format!("page must be a non-negative integer, got '{}'", page))?;
    let slot_id = slot
        .parse()
        .with_context(|| format!("slot must be a non-negative integer, got '{}'", slot))?;
    Ok(Rid::new(page_id, slot_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_meta_commands() {
        assert_eq!(parse_meta_command("\\q"), Some(MetaCommand::Quit));
        assert_eq!(parse_meta_command(".exit"), Some(MetaCommand::Quit));
        assert_eq!(parse_meta_command("EXIT;"), Some(MetaCommand::Quit));
        assert_eq!(parse_meta_command("help"), Some(MetaCommand::Help));
        assert_eq!(parse_meta_command("flush"), Some(MetaCommand::Flush));
        assert_eq!(parse_meta_command(" stats "), Some(MetaCommand::Stats));
        assert_eq!(parse_meta_command("get 1"), None);
    }

    #[test]
    fn parses_statements() {
        assert_eq!(
            parse_statement("insert -5 3 7").unwrap(),
            Some(Statement::Insert {
                key: -5,
                rid: Rid::new(3, 7)
            })
        );
        assert_eq!(
            parse_statement("GET 42;").unwrap(),
            Some(Statement::Get { key: 42 })
        );
        assert_eq!(
            parse_statement("remove 1 2 3").unwrap(),
            Some(Statement::Remove {
                key: 1,
                rid: Rid::new(2, 3)
            })
        );
        assert_eq!(parse_statement("size").unwrap(), Some(Statement::Size));
        assert_eq!(parse_statement("   ").unwrap(), None);
    }

    #[test]
    fn rejects_malformed_statements() {
        let err = parse_statement("insert 1 2").unwrap_err();
        assert!(err.to_string().contains("usage: insert"));
        let err = parse_statement("get abc").unwrap_err();
        assert!(err.to_string().contains("key must be an integer"));
        assert!(parse_statement("insert 1 -2 3").is_err());
        assert!(parse_statement("drop table").is_err());
    }

    #[test]
    fn statements_display_as_input() {
        let statement = Statement::Remove {
            key: 9,
            rid: Rid::new(4, 1),
        };
        assert_eq!(statement.to_string(), "remove 9 4 1");
        assert_eq!(parse_statement(&statement.to_string()).unwrap(), Some(statement));
    }
}
