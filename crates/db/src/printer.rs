use std::fmt;

use comfy_table::{Cell, Table};

const MAX_DISPLAY_ROWS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplOutput {
    Rows {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Message(String),
}

impl ReplOutput {
    pub fn rows<I>(headers: I, rows: Vec<Vec<String>>) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        ReplOutput::Rows {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        ReplOutput::Message(message.into())
    }
}

impl fmt::Display for ReplOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_output(self))
    }
}

pub fn format_output(output: &ReplOutput) -> String {
    match output {
        ReplOutput::Rows { headers, rows } => format_table(headers, rows),
        ReplOutput::Message(message) => message.to_string(),
    }
}

pub fn print_output(output: &ReplOutput) {
    println!("{}", format_output(output));
}

fn format_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let total_rows = rows.len();
    let mut table = Table::new();
    table.set_header(headers.iter().map(Cell::new).collect::<Vec<_>>());

    for row in rows.iter().take(MAX_DISPLAY_ROWS) {
        table.add_row(row.iter().map(Cell::new).collect::<Vec<_>>());
    }

    let mut output = table.to_string();
    output.push('\n');
    output.push_str(&format!("({} rows)", total_rows));

    let hidden_rows = total_rows.saturating_sub(MAX_DISPLAY_ROWS);
    if hidden_rows > 0 {
        output.push('\n');
        output.push_str(&format!("... ({} rows hidden)", hidden_rows));
    }

    output
}
