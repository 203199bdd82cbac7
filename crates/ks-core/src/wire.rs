//! The request/response line format carried inside ring slots (§4.1, §6).
//!
//! A request is `kernel_type|request_id|source_tag[|unique_id]`, optionally
//! terminated by `\r\n` or `\n`. A response is
//! `request_id|allowed(0 or 1)|reason\n`.

use crate::error::WireError;

/// A parsed admission request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub kernel_type: String,
    pub request_id: String,
    pub source_tag: String,
    pub unique_id: Option<String>,
}

/// Parses one request line. The line may carry a trailing `\r\n`, `\n`, or
/// neither. The first three `|`-delimited fields are mandatory; a fourth
/// (`unique_id`) is optional. `splitn(4, ...)` caps the split at four
/// fields, so any `|` bytes inside the final field are preserved verbatim
/// rather than producing a fifth field.
pub fn parse_request(line: &str) -> Result<Request, WireError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = trimmed.splitn(4, '|').collect();
    if fields.len() < 3 {
        return Err(WireError::MalformedRequest {
            found: fields.len(),
        });
    }
    Ok(Request {
        kernel_type: fields[0].to_string(),
        request_id: fields[1].to_string(),
        source_tag: fields[2].to_string(),
        unique_id: fields.get(3).map(|s| (*s).to_string()),
    })
}

/// Formats a response line, including the trailing `\n`.
pub fn format_response(request_id: &str, allowed: bool, reason: &str) -> String {
    format!("{request_id}|{}|{reason}\n", i32::from(allowed))
}
