//! Permissive CSV tokenizer for quote feed payloads
//!
//! Character-scanning state machine:
//! - `FieldStart`: nothing consumed for the current field yet
//! - `Unquoted`: runs until delimiter, CR, LF or end of input
//! - `Quoted`: inside `"…"`, delimiters and line breaks are literal
//! - `QuotedSawQuote`: a `"` inside a quoted field, either `""` or the close
//!
//! Rows may be ragged; column validation happens during reconciliation.
//! An unterminated quote captures everything up to the end of input.

/// One decoded record, cells in column order
pub type Row = Vec<String>;

pub const DEFAULT_DELIMITER: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    QuotedSawQuote,
}

/// Decode with the default `,` delimiter
#[inline]
pub fn decode(raw: &str) -> Vec<Row> {
    decode_with(raw, DEFAULT_DELIMITER)
}

/// Decode `raw` into rows of fields. Never fails and always returns at least
/// one (possibly empty) row.
pub fn decode_with(raw: &str, delimiter: char) -> Vec<Row> {
    let mut rows: Vec<Row> = Vec::new();
    let mut row: Row = Vec::new();
    let mut field = String::new();
    let mut state = State::FieldStart;
    // True once anything of the current row has been consumed
    let mut row_open = false;

    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        row_open = true;
        match state {
            State::FieldStart | State::Unquoted => {
                if c == delimiter {
                    row.push(std::mem::take(&mut field));
                    state = State::FieldStart;
                } else if c == '\r' || c == '\n' {
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                    state = State::FieldStart;
                    row_open = false;
                } else if c == '"' && state == State::FieldStart {
                    state = State::Quoted;
                } else {
                    field.push(c);
                    state = State::Unquoted;
                }
            }
            State::Quoted => {
                if c == '"' {
                    state = State::QuotedSawQuote;
                } else {
                    field.push(c);
                }
            }
            State::QuotedSawQuote => {
                if c == '"' {
                    field.push('"');
                    state = State::Quoted;
                } else if c == delimiter {
                    row.push(std::mem::take(&mut field));
                    state = State::FieldStart;
                } else if c == '\r' || c == '\n' {
                    if c == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                    state = State::FieldStart;
                    row_open = false;
                } else {
                    // Text after a closing quote is kept as part of the field.
                    field.push(c);
                    state = State::Unquoted;
                }
            }
        }
    }

    if row_open {
        row.push(field);
        rows.push(row);
    }
    if rows.is_empty() {
        rows.push(Vec::new());
    }
    rows
}

/// Decode a transport payload, rejecting content that is not text at all.
pub fn decode_payload(raw: &str, delimiter: char) -> Result<Vec<Row>, DecodeError> {
    if let Some(offset) = raw.find('\0') {
        return Err(DecodeError::Binary { offset });
    }
    Ok(decode_with(raw, delimiter))
}

/// Decode raw bytes, failing on invalid UTF-8 or binary content.
pub fn decode_bytes(raw: &[u8], delimiter: char) -> Result<Vec<Row>, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|e| DecodeError::InvalidUtf8 {
        offset: e.valid_up_to(),
    })?;
    decode_payload(text, delimiter)
}

/// Encode one row, quoting cells that need it. Empty cells are always
/// quoted so a lone empty cell survives a decode.
pub fn encode_row(row: &[String], delimiter: char) -> String {
    let mut out = String::new();
    for (i, cell) in row.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        let needs_quotes = cell.is_empty()
            || cell.starts_with('"')
            || cell.contains(|c| c == delimiter || c == '"' || c == '\r' || c == '\n');
        if needs_quotes {
            out.push('"');
            out.push_str(&cell.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out
}

/// Payload is not delimited text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload is not valid UTF-8 (at byte {offset})")]
    InvalidUtf8 { offset: usize },

    #[error("Payload contains binary data (NUL at byte {offset})")]
    Binary { offset: usize },
}
