//! JSON I/O handling for CLI
//!
//! - Input: JSON objects on stdin, one per line
//! - Output: a single JSON envelope on stdout
//! - UTF-8 only

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read JSON objects from `reader`, one per non-blank line
pub fn read_documents<R: BufRead>(reader: R) -> CliResult<Vec<Value>> {
    let mut documents = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| {
            CliError::invalid_input(format!("line {}: invalid JSON: {}", index + 1, e))
        })?;
        documents.push(value);
    }

    if documents.is_empty() {
        return Err(CliError::invalid_input("Empty input"));
    }
    Ok(documents)
}

fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(&serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_documents_skips_blank_lines() {
        let input = "{\"_id\": \"a\"}\n\n{\"_id\": \"b\"}\n";
        let docs = read_documents(Cursor::new(input)).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1]["_id"], "b");
    }

    #[test]
    fn test_read_documents_reports_line() {
        let input = "{\"_id\": \"a\"}\nnot json\n";
        let err = read_documents(Cursor::new(input)).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_INVALID_INPUT");
        assert!(err.message().contains("line 2"));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(read_documents(Cursor::new("\n  \n")).is_err());
    }
}
