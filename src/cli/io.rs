//! JSON I/O handling for CLI
//!
//! - Input: one JSON object per line on stdin
//! - Output: one JSON object per line on stdout
//! - UTF-8 only

use std::io::{self, BufRead, Write};

use serde_json::{json, Value};

use super::errors::{CliError, CliResult};

/// Parse one JSON value per non-blank line.
///
/// A line that is not UTF-8 or not JSON is an invalid request; only a
/// failing reader is an I/O error.
pub fn parse_lines<R: BufRead>(reader: R) -> impl Iterator<Item = CliResult<Value>> {
    reader.split(b'\n').filter_map(|line| {
        let bytes = match line {
            Ok(bytes) => bytes,
            Err(e) => return Some(Err(CliError::from(e))),
        };

        let line = match String::from_utf8(bytes) {
            Ok(line) => line,
            Err(e) => {
                return Some(Err(CliError::invalid_request(format!(
                    "Request is not valid UTF-8: {}",
                    e
                ))))
            }
        };
        if line.trim().is_empty() {
            return None;
        }

        Some(
            serde_json::from_str(&line)
                .map_err(|e| CliError::invalid_request(format!("Invalid JSON: {}", e))),
        )
    })
}

/// Success response body
pub fn ok_response(data: Value) -> Value {
    json!({
        "status": "ok",
        "data": data
    })
}

/// Error response body
pub fn error_response(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write one response line
pub fn write_line<W: Write>(out: &mut W, response: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut *out, response)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(&mut io::stdout(), &ok_response(data))
}

/// Write raw text to stdout
pub fn write_text(text: &str) -> CliResult<()> {
    let mut stdout = io::stdout();
    writeln!(stdout, "{}", text)?;
    stdout.flush()?;

    Ok(())
}
