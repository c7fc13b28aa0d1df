//! Line-level scanning helpers for the structural parser.
//!
//! The parser works line by line. These helpers split the source into
//! [`Line`]s and pick single lines apart: comment stripping and `key: value`
//! splitting. Quoted keys are decoded by the [`lexer`](super::lexer).

use super::lexer::decode_quoted;

/// One physical source line.
#[derive(Debug, Clone)]
pub(crate) struct Line<'src> {
    /// 1-based line number.
    pub number: usize,
    /// Byte offset of the line start in the source.
    pub offset: usize,
    /// Full line text without the line break.
    pub text: &'src str,
    /// Byte index in `text` where the content starts. Sequence entries
    /// rewrite this to the column of their inline content.
    pub indent: usize,
    /// A tab appears in the leading whitespace.
    pub tab_indented: bool,
}

impl<'src> Line<'src> {
    pub fn content(&self) -> &'src str {
        &self.text[self.indent..]
    }

    /// Blank or comment-only.
    pub fn is_blank(&self) -> bool {
        let trimmed = self.content().trim_start();
        trimmed.is_empty() || trimmed.starts_with('#')
    }

    /// Starts a block sequence entry (`-` followed by space or end of line).
    pub fn is_sequence_entry(&self) -> bool {
        let content = self.content();
        content == "-" || content.starts_with("- ") || content.starts_with("-\t")
    }

    /// Column (1-based, in characters) of byte index `at` within the line.
    pub fn column(&self, at: usize) -> usize {
        self.text[..at.min(self.text.len())].chars().count() + 1
    }
}

/// Split source text into lines, tracking offsets and indentation.
pub(crate) fn split_lines(source: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for (i, raw) in source.split('\n').enumerate() {
        let text = raw.strip_suffix('\r').unwrap_or(raw);
        let indent = text.len() - text.trim_start_matches(' ').len();
        let leading = &text[..text.len() - text.trim_start_matches([' ', '\t']).len()];
        lines.push(Line {
            number: i + 1,
            offset,
            text,
            indent,
            tab_indented: leading.contains('\t') && !text.trim().is_empty(),
        });
        offset += raw.len() + 1;
    }
    lines
}

/// Byte index where a trailing comment starts, ignoring `#` inside quotes.
/// A comment must start the text or follow whitespace.
pub(crate) fn comment_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'\'') if b == b'\'' => {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 1;
                } else {
                    quote = None;
                }
            }
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'#' if i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t' => {
                    return Some(i)
                }
                b'\'' | b'"' if i == 0 || is_quote_context(bytes[i - 1]) => quote = Some(b),
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Quotes only open a quoted scalar at the start of a token.
fn is_quote_context(prev: u8) -> bool {
    matches!(prev, b' ' | b'\t' | b'[' | b'{' | b',' | b':')
}

/// Text with any trailing comment and trailing whitespace removed.
pub(crate) fn strip_comment(text: &str) -> &str {
    match comment_start(text) {
        Some(i) => text[..i].trim_end(),
        None => text.trim_end(),
    }
}

/// A `key: value` split of a line's content.
#[derive(Debug, PartialEq)]
pub(crate) struct KeySplit<'a> {
    pub key: String,
    /// Text after the colon, with leading whitespace and comment removed.
    pub rest: &'a str,
    /// Byte index of `rest` within the content.
    pub rest_at: usize,
}

/// Split `content` into a mapping key and the remainder. Returns `None`
/// when the content is not a mapping entry.
pub(crate) fn split_key(content: &str) -> Result<Option<KeySplit<'_>>, String> {
    let first = content.as_bytes().first().copied();
    let colon = match first {
        None => return Ok(None),
        Some(b'"') | Some(b'\'') => {
            let (key, consumed) = match decode_quoted(content)? {
                Some(decoded) => decoded,
                None => return Err("unterminated quoted key".to_string()),
            };
            let after = &content[consumed..];
            let trimmed = after.trim_start_matches(' ');
            if !is_value_indicator(trimmed) {
                return Ok(None);
            }
            let colon = content.len() - trimmed.len();
            return Ok(Some(build_split(content, key, colon)));
        }
        Some(b'-') if content.len() == 1 || content[1..].starts_with([' ', '\t']) => {
            return Ok(None)
        }
        Some(b'[') | Some(b'{') | Some(b'#') | Some(b'|') | Some(b'>') => return Ok(None),
        Some(_) => {
            let body = strip_comment(content);
            let mut found = None;
            for (i, c) in body.char_indices() {
                if c == ':' && is_value_indicator(&body[i..]) {
                    found = Some(i);
                    break;
                }
            }
            match found {
                Some(i) => i,
                None => return Ok(None),
            }
        }
    };
    let key = content[..colon].trim_end().to_string();
    Ok(Some(build_split(content, key, colon)))
}

fn build_split(content: &str, key: String, colon: usize) -> KeySplit<'_> {
    let after = &content[colon + 1..];
    let lead = after.len() - after.trim_start().len();
    let rest_at = colon + 1 + lead;
    KeySplit {
        key,
        rest: strip_comment(&content[rest_at..]),
        rest_at,
    }
}

/// `:` followed by whitespace or end of text.
fn is_value_indicator(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next() == Some(':') && matches!(chars.next(), None | Some(' ') | Some('\t'))
}
