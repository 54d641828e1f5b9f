use std::sync::Arc;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::error::{reader_error, Mark, YamlResult};

/// Detected encoding information for a byte stream
#[derive(Debug, Clone)]
pub struct EncodingInfo {
    pub encoding: &'static Encoding,
    pub has_bom: bool,
    pub bom_length: usize,
}

/// Character reader with automatic encoding detection and mark tracking.
///
/// The whole document is decoded up front (the core assumes documents fit in
/// memory); the scanner pulls characters through `peek`/`prefix`/`forward`.
pub struct Reader {
    name: Arc<str>,
    buffer: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    encoding_info: Option<EncodingInfo>,
}

impl Reader {
    pub fn from_str(name: &str, content: &str) -> YamlResult<Self> {
        let reader = Self {
            name: Arc::from(name),
            buffer: content.chars().collect(),
            pos: 0,
            line: 0,
            column: 0,
            encoding_info: None,
        };
        reader.check_printable()?;
        Ok(reader)
    }

    /// Decode a byte stream, sniffing the BOM; falls back to UTF-8.
    pub fn from_bytes(name: &str, bytes: &[u8]) -> YamlResult<Self> {
        let info = detect_bom(bytes).unwrap_or(EncodingInfo {
            encoding: UTF_8,
            has_bom: false,
            bom_length: 0,
        });
        let (decoded, had_errors) = {
            let (cow, had_errors) = info
                .encoding
                .decode_without_bom_handling(&bytes[info.bom_length..]);
            (cow.into_owned(), had_errors)
        };
        if had_errors {
            return Err(reader_error(
                format!("invalid {} byte sequence in stream", info.encoding.name()),
                Mark::new(Arc::from(name), 0, 0, 0),
            ));
        }
        let mut reader = Self::from_str(name, &decoded)?;
        reader.encoding_info = Some(info);
        Ok(reader)
    }

    pub fn name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn encoding_info(&self) -> Option<&EncodingInfo> {
        self.encoding_info.as_ref()
    }

    /// Character at `offset` past the current position; NUL at end of input
    pub fn peek(&self, offset: usize) -> char {
        self.buffer.get(self.pos + offset).copied().unwrap_or('\0')
    }

    /// Next `n` characters without consuming them
    pub fn prefix(&self, n: usize) -> String {
        let end = std::cmp::min(self.pos + n, self.buffer.len());
        self.buffer[self.pos..end].iter().collect()
    }

    /// Consume `n` characters, maintaining line and column
    pub fn forward(&mut self, n: usize) {
        for _ in 0..n {
            let Some(&ch) = self.buffer.get(self.pos) else {
                return;
            };
            self.pos += 1;
            if ch == '\n'
                || ch == '\u{85}'
                || ch == '\u{2028}'
                || ch == '\u{2029}'
                || (ch == '\r' && self.peek(0) != '\n')
            {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
    }

    pub fn get_mark(&self) -> Mark {
        Mark::new(Arc::clone(&self.name), self.pos, self.line, self.column)
    }

    /// Remainder of the current line, for error snippets
    pub fn current_line(&self) -> String {
        let start = self.pos - self.column.min(self.pos);
        let mut out = String::new();
        for &ch in &self.buffer[start..] {
            if is_break(ch) || ch == '\0' {
                break;
            }
            out.push(ch);
        }
        out
    }

    fn check_printable(&self) -> YamlResult<()> {
        let mut line = 0usize;
        let mut column = 0usize;
        for (index, &ch) in self.buffer.iter().enumerate() {
            if !is_printable(ch) {
                return Err(reader_error(
                    format!(
                        "special characters are not allowed: found {:?} (0x{:x})",
                        ch, ch as u32
                    ),
                    Mark::new(Arc::clone(&self.name), index, line, column),
                ));
            }
            if ch == '\n' {
                line += 1;
                column = 0;
            } else {
                column += 1;
            }
        }
        Ok(())
    }
}

/// Detect a leading byte order mark
pub fn detect_bom(bytes: &[u8]) -> Option<EncodingInfo> {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Some(EncodingInfo { encoding: UTF_8, has_bom: true, bom_length: 3 });
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Some(EncodingInfo { encoding: UTF_16BE, has_bom: true, bom_length: 2 });
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Some(EncodingInfo { encoding: UTF_16LE, has_bom: true, bom_length: 2 });
    }
    None
}

pub fn is_break(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

fn is_printable(ch: char) -> bool {
    matches!(ch,
        '\t' | '\n' | '\r' | '\u{85}'
        | '\u{20}'..='\u{7e}'
        | '\u{a0}'..='\u{d7ff}'
        | '\u{e000}'..='\u{fffd}'
        | '\u{10000}'..='\u{10ffff}')
}
