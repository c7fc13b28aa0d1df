//! Indentation-driven parser for the block subset of YAML.
//!
//! The parser consumes [`Line`]s and builds a [`Node`] tree. Malformed lines
//! produce `SYNTAX_ERROR` diagnostics; the parser then skips the offending
//! line together with everything nested beneath it and resumes at the next
//! line of the enclosing collection, so unrelated errors are all reported in
//! one pass.

use crate::diagnostics::{Code, Diagnostic, Location};

use super::node::{Entry, Node, NodeKind, Position, ScalarStyle};
use chumsky::span::SimpleSpan;

use super::lexer::{decode_quoted, lex_flow, FlowToken};
use super::scanner::{comment_start, split_key, split_lines, strip_comment, Line};

pub(crate) struct Parser<'src> {
    lines: Vec<Line<'src>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

fn position(line: &Line<'_>, at: usize) -> Position {
    Position::new(line.number, line.column(at), line.offset + at)
}

fn is_marker(line: &Line<'_>) -> bool {
    if line.indent != 0 {
        return false;
    }
    let content = line.content();
    content == "---" || content.starts_with("--- ") || content == "..." || content.starts_with("... ")
}

fn leading_spaces(text: &str) -> usize {
    text.len() - text.trim_start_matches(' ').len()
}

#[derive(Clone, Copy, PartialEq)]
enum Chomping {
    Strip,
    Clip,
    Keep,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str) -> Self {
        let body = source.strip_prefix('\u{feff}').unwrap_or(source);
        let bom = source.len() - body.len();
        let mut lines = split_lines(body);
        for line in &mut lines {
            line.offset += bom;
        }
        Self {
            lines,
            pos: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Option<Node>, Vec<Diagnostic>) {
        let root = self.parse_document();
        (root, self.diagnostics)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn error(&mut self, position: Position, location: &Location, message: impl Into<String>) {
        self.diagnostics.push(
            Diagnostic::new(Code::SyntaxError, location.clone(), message).with_position(position),
        );
    }

    fn skip_blank(&mut self) {
        while self.pos < self.lines.len() && self.lines[self.pos].is_blank() {
            self.pos += 1;
        }
    }

    /// Next non-blank line, if any.
    fn current(&mut self) -> Option<Line<'src>> {
        self.skip_blank();
        self.lines.get(self.pos).cloned()
    }

    /// Skip blank lines and lines indented at least `min_indent`.
    fn skip_deeper(&mut self, min_indent: usize) {
        while let Some(line) = self.lines.get(self.pos) {
            if line.is_blank() || (line.indent >= min_indent && !is_marker(line)) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Report the current line and skip it with everything nested under it.
    fn reject_line(&mut self, line: &Line<'_>, indent: usize, location: &Location, message: &str) {
        self.error(position(line, line.indent), location, message);
        self.pos += 1;
        self.skip_deeper(indent + 1);
    }

    // ========================================================================
    // Document
    // ========================================================================

    fn parse_document(&mut self) -> Option<Node> {
        let root_location = Location::root();
        let mut started = false;
        while let Some(line) = self.current() {
            let content = line.content();
            if line.indent == 0 && content.starts_with('%') && !started {
                self.pos += 1;
                continue;
            }
            if is_marker(&line) && content.starts_with("---") && !started {
                started = true;
                if !strip_comment(&content[3..]).trim().is_empty() {
                    self.error(
                        position(&line, 4),
                        &root_location,
                        "content on the document start line is not supported",
                    );
                }
                self.pos += 1;
                continue;
            }
            break;
        }

        let first = self.current()?;
        if is_marker(&first) {
            // Empty document followed by an end marker or another document.
            self.finish_document(&root_location);
            return None;
        }
        let root = self.parse_block(first.indent, &root_location);
        self.finish_document(&root_location);
        Some(root)
    }

    fn finish_document(&mut self, location: &Location) {
        while let Some(line) = self.current() {
            let content = line.content();
            if is_marker(&line) && content.starts_with("...") {
                self.pos += 1;
                continue;
            }
            if is_marker(&line) {
                self.error(
                    position(&line, 0),
                    location,
                    "multiple documents in one stream are not supported",
                );
                self.pos = self.lines.len();
                break;
            }
            self.reject_line(&line, line.indent, location, "unexpected content after the document root");
        }
    }

    // ========================================================================
    // Block collections
    // ========================================================================

    /// Parse the block node starting at the current line.
    fn parse_block(&mut self, indent: usize, location: &Location) -> Node {
        let line = self.lines[self.pos].clone();
        if line.is_sequence_entry() {
            return self.parse_sequence(indent, location);
        }
        match split_key(line.content()) {
            // Entries and tab-indented lines are handled (and reported) by
            // the mapping loop.
            Ok(Some(_)) => self.parse_mapping(indent, location),
            _ if line.tab_indented => self.parse_mapping(indent, location),
            _ => self.parse_value(line.indent, indent, None, location),
        }
    }

    fn parse_mapping(&mut self, indent: usize, location: &Location) -> Node {
        let mut entries: Vec<Entry> = Vec::new();
        let mut start = None;

        while let Some(line) = self.current() {
            if line.indent < indent || is_marker(&line) {
                break;
            }
            if line.indent > indent {
                self.reject_line(&line, indent, location, "unexpected indentation");
                continue;
            }
            if line.tab_indented {
                self.reject_line(&line, indent, location, "tab characters must not be used for indentation");
                continue;
            }
            if line.is_sequence_entry() {
                self.reject_line(&line, indent, location, "expected a mapping key, found a sequence entry");
                continue;
            }
            let split = match split_key(line.content()) {
                Ok(Some(split)) => split,
                Ok(None) => {
                    self.reject_line(&line, indent, location, "expected `key: value`");
                    continue;
                }
                Err(message) => {
                    self.reject_line(&line, indent, location, &message);
                    continue;
                }
            };

            let key_position = position(&line, line.indent);
            start.get_or_insert(key_position);
            let child = location.key(split.key.clone());
            let value = self.parse_value(line.indent + split.rest_at, indent + 1, Some(indent), &child);

            if entries.iter().any(|e| e.key == split.key) {
                self.error(
                    key_position,
                    &child,
                    format!("duplicate key `{}`; the first occurrence is kept", split.key),
                );
            } else {
                entries.push(Entry {
                    key: split.key,
                    key_position,
                    value,
                });
            }
        }

        Node {
            kind: NodeKind::Mapping(entries),
            position: start.unwrap_or_default(),
        }
    }

    fn parse_sequence(&mut self, indent: usize, location: &Location) -> Node {
        let mut items = Vec::new();
        let mut start = None;

        while let Some(line) = self.current() {
            if line.indent < indent || is_marker(&line) {
                break;
            }
            if line.indent > indent {
                self.reject_line(&line, indent, location, "unexpected indentation");
                continue;
            }
            if line.tab_indented {
                self.reject_line(&line, indent, location, "tab characters must not be used for indentation");
                continue;
            }
            if !line.is_sequence_entry() {
                break;
            }

            let dash = position(&line, line.indent);
            start.get_or_insert(dash);
            let child = location.index(items.len());

            let after = line.indent + 1;
            let at = after + (line.text[after..].len() - line.text[after..].trim_start().len());
            let rest = strip_comment(&line.text[at..]);

            let item = if rest.is_empty() {
                self.pos += 1;
                self.parse_nested(indent + 1, None, dash, &child)
            } else if rest == "-" || rest.starts_with("- ") || matches!(split_key(rest), Ok(Some(_))) {
                // Compact nested collection: continue as if the content
                // started its own line at this column.
                self.lines[self.pos].indent = at;
                self.lines[self.pos].tab_indented = false;
                self.parse_block(at, &child)
            } else {
                self.parse_value(at, indent + 1, None, &child)
            };
            items.push(item);
        }

        Node {
            kind: NodeKind::Sequence(items),
            position: start.unwrap_or_default(),
        }
    }

    /// Parse the block nested under a key or dash with no inline value.
    fn parse_nested(
        &mut self,
        min_indent: usize,
        compact_indent: Option<usize>,
        fallback: Position,
        location: &Location,
    ) -> Node {
        match self.current() {
            Some(next) if !is_marker(&next) && next.indent >= min_indent => {
                self.parse_block(next.indent, location)
            }
            Some(next) if compact_indent == Some(next.indent) && next.is_sequence_entry() => {
                self.parse_sequence(next.indent, location)
            }
            _ => Node::null(fallback),
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Parse the value starting at byte `at` of the current line. Nested
    /// content must be indented at least `min_indent`; `compact_indent`
    /// allows a block sequence at the owning key's own indentation.
    fn parse_value(
        &mut self,
        at: usize,
        min_indent: usize,
        compact_indent: Option<usize>,
        location: &Location,
    ) -> Node {
        let line = self.lines[self.pos].clone();
        let rest = strip_comment(&line.text[at.min(line.text.len())..]);
        let start = position(&line, at);

        if rest.is_empty() {
            self.pos += 1;
            return self.parse_nested(min_indent, compact_indent, start, location);
        }

        let bytes = rest.as_bytes();
        match bytes[0] {
            b'|' | b'>' => self.parse_block_scalar(&line, at, rest, min_indent, location),
            b'[' | b'{' => self.parse_flow_value(&line, at, rest, min_indent, location),
            b'"' | b'\'' => self.parse_quoted_value(&line, at, min_indent, location),
            b'&' | b'*' | b'!' if bytes.len() > 1 && bytes[1] != b' ' => {
                self.error(start, location, "anchors, aliases and tags are not supported");
                self.pos += 1;
                self.skip_deeper(min_indent);
                Node::null(start)
            }
            _ => {
                let commented = comment_start(&line.text[at..]).is_some();
                self.parse_plain_value(rest, start, min_indent, commented)
            }
        }
    }

    fn parse_plain_value(
        &mut self,
        first: &str,
        start: Position,
        min_indent: usize,
        commented: bool,
    ) -> Node {
        let mut text = first.to_string();
        self.pos += 1;
        if commented {
            // A trailing comment ends the scalar.
            return Node::scalar(text, ScalarStyle::Plain, start);
        }

        // Multi-line plain scalar: more-indented continuation lines fold into
        // one line, blank lines become line breaks.
        loop {
            let mut look = self.pos;
            let mut breaks = 0;
            while look < self.lines.len() && self.lines[look].text.trim().is_empty() {
                breaks += 1;
                look += 1;
            }
            let Some(next) = self.lines.get(look) else {
                break;
            };
            if next.indent < min_indent || next.is_blank() || is_marker(next) || next.tab_indented {
                break;
            }
            if next.is_sequence_entry() || !matches!(split_key(next.content()), Ok(None)) {
                break;
            }
            let content = strip_comment(next.content()).trim();
            let has_comment = content.len() < next.content().trim().len();
            if breaks == 0 {
                text.push(' ');
            } else {
                for _ in 0..breaks {
                    text.push('\n');
                }
            }
            text.push_str(content);
            self.pos = look + 1;
            if has_comment {
                break;
            }
        }
        Node::scalar(text, ScalarStyle::Plain, start)
    }

    fn parse_quoted_value(
        &mut self,
        line: &Line<'src>,
        at: usize,
        min_indent: usize,
        location: &Location,
    ) -> Node {
        let start = position(line, at);
        let style = if line.text[at..].starts_with('"') {
            ScalarStyle::DoubleQuoted
        } else {
            ScalarStyle::SingleQuoted
        };
        let first_line = self.pos;
        let mut buffer = line.text[at..].trim_end().to_string();
        self.pos += 1;

        loop {
            match decode_quoted(&buffer) {
                Ok(Some((value, consumed))) => {
                    let tail = strip_comment(&buffer[consumed..]).trim();
                    if !tail.is_empty() {
                        self.error(start, location, format!("unexpected `{}` after quoted scalar", tail));
                    }
                    return Node::scalar(value, style, start);
                }
                Ok(None) => {}
                Err(message) => {
                    self.error(start, location, message);
                    self.skip_deeper(min_indent);
                    return Node::null(start);
                }
            }

            // Unterminated on this line: fold in the next continuation line.
            let Some(next) = self.lines.get(self.pos) else {
                break;
            };
            let trimmed = next.text.trim();
            if trimmed.is_empty() {
                buffer.push('\n');
            } else {
                if next.indent < min_indent || is_marker(next) {
                    break;
                }
                if style == ScalarStyle::DoubleQuoted && buffer.ends_with('\\') && !buffer.ends_with("\\\\") {
                    buffer.pop();
                } else if !buffer.ends_with('\n') {
                    buffer.push(' ');
                }
                buffer.push_str(trimmed);
            }
            self.pos += 1;
        }

        self.error(start, location, "unterminated quoted scalar");
        self.pos = first_line + 1;
        self.skip_deeper(min_indent);
        Node::null(start)
    }

    fn parse_block_scalar(
        &mut self,
        line: &Line<'src>,
        at: usize,
        header: &str,
        min_indent: usize,
        location: &Location,
    ) -> Node {
        let start = position(line, at);
        let literal = header.starts_with('|');
        let style = if literal {
            ScalarStyle::Literal
        } else {
            ScalarStyle::Folded
        };

        let mut chomping = Chomping::Clip;
        let mut explicit = None;
        for c in header[1..].chars() {
            match c {
                '-' => chomping = Chomping::Strip,
                '+' => chomping = Chomping::Keep,
                '1'..='9' => explicit = c.to_digit(10).map(|d| d as usize),
                _ => {
                    self.error(start, location, format!("invalid block scalar header `{}`", header));
                    self.pos += 1;
                    self.skip_deeper(min_indent);
                    return Node::null(start);
                }
            }
        }
        self.pos += 1;

        let parent_indent = min_indent.saturating_sub(1);
        let content_indent = match explicit {
            Some(d) => parent_indent + d,
            None => self.lines[self.pos..]
                .iter()
                .find(|l| !l.text.trim().is_empty())
                .map(|l| leading_spaces(l.text))
                .unwrap_or(0),
        };

        let mut body: Vec<&str> = Vec::new();
        if content_indent >= min_indent || explicit.is_some() {
            while let Some(next) = self.lines.get(self.pos) {
                if next.text.trim().is_empty() {
                    body.push("");
                } else if leading_spaces(next.text) >= content_indent {
                    body.push(&next.text[content_indent..]);
                } else {
                    break;
                }
                self.pos += 1;
            }
        }

        let end = body.iter().rposition(|l| !l.is_empty()).map_or(0, |i| i + 1);
        let trailing = body.len() - end;
        let content = &body[..end];

        let mut text = if literal {
            content.join("\n")
        } else {
            fold_lines(content)
        };
        match chomping {
            Chomping::Strip => {}
            Chomping::Clip => {
                if !content.is_empty() {
                    text.push('\n');
                }
            }
            Chomping::Keep => {
                if !content.is_empty() {
                    text.push('\n');
                }
                for _ in 0..trailing {
                    text.push('\n');
                }
            }
        }
        Node::scalar(text, style, start)
    }

    fn parse_flow_value(
        &mut self,
        line: &Line<'src>,
        at: usize,
        rest: &str,
        min_indent: usize,
        location: &Location,
    ) -> Node {
        let start = position(line, at);
        let end = at + rest.len();
        let result = match lex_flow(&line.text[at..end]) {
            Ok(tokens) => {
                let mut flow = Flow {
                    line,
                    base: at,
                    end,
                    tokens,
                    next: 0,
                    errors: Vec::new(),
                };
                let result = flow.node(location).and_then(|node| match flow.peek() {
                    None => Ok(node),
                    Some(_) => {
                        let tail = &line.text[flow.at()..end];
                        Err((format!("unexpected `{}` after flow collection", tail), flow.at()))
                    }
                });
                self.diagnostics.append(&mut flow.errors);
                result
            }
            Err((message, i)) => Err((message, at + i)),
        };
        self.pos += 1;
        match result {
            Ok(node) => node,
            Err((message, i)) => {
                self.error(position(line, i), location, message);
                self.skip_deeper(min_indent);
                Node::null(start)
            }
        }
    }
}

/// Folded block scalar line joining: single breaks between plain lines
/// become spaces, empty lines become breaks, more-indented lines keep theirs.
fn fold_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut pending = 0;
    let mut prev: Option<&str> = None;
    for line in lines {
        if line.is_empty() {
            pending += 1;
            continue;
        }
        match prev {
            Some(p) => {
                let indented = line.starts_with([' ', '\t']) || p.starts_with([' ', '\t']);
                let breaks = match (pending, indented) {
                    (0, false) => {
                        out.push(' ');
                        0
                    }
                    (0, true) => 1,
                    (n, false) => n,
                    (n, true) => n + 1,
                };
                for _ in 0..breaks {
                    out.push('\n');
                }
            }
            None => {
                for _ in 0..pending {
                    out.push('\n');
                }
            }
        }
        pending = 0;
        out.push_str(line);
        prev = Some(line);
    }
    out
}

/// Single-line flow collection parser over lexed tokens.
struct Flow<'a, 'src> {
    line: &'a Line<'src>,
    /// Byte index in the line text where the lexed text starts.
    base: usize,
    /// Byte index in the line text where the lexed text ends.
    end: usize,
    tokens: Vec<(FlowToken, SimpleSpan)>,
    next: usize,
    errors: Vec<Diagnostic>,
}

/// Error message and the byte index in the line it points at.
type FlowResult<T> = Result<T, (String, usize)>;

impl<'a, 'src> Flow<'a, 'src> {
    fn peek(&self) -> Option<&FlowToken> {
        self.tokens.get(self.next).map(|(token, _)| token)
    }

    /// Byte index in the line of the next token, or the end.
    fn at(&self) -> usize {
        self.tokens
            .get(self.next)
            .map_or(self.end, |(_, span)| self.base + span.start)
    }

    fn bump(&mut self) {
        self.next += 1;
    }

    fn node(&mut self, location: &Location) -> FlowResult<Node> {
        let at = self.at();
        let start = position(self.line, at);
        let Some(token) = self.peek().cloned() else {
            return Err(("unterminated flow collection".to_string(), at));
        };
        self.bump();
        match token {
            FlowToken::LBracket => self.sequence(start, location),
            FlowToken::LBrace => self.mapping(start, location),
            FlowToken::Quoted(text, style) => Ok(Node::scalar(text, style, start)),
            FlowToken::Plain(text) => Ok(Node::scalar(text, ScalarStyle::Plain, start)),
            FlowToken::Invalid(message) => Err((message, at)),
            FlowToken::Unterminated => Err(("unterminated quoted scalar".to_string(), at)),
            other => Err((format!("expected a value, found `{}`", other), at)),
        }
    }

    fn sequence(&mut self, start: Position, location: &Location) -> FlowResult<Node> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(FlowToken::RBracket) => {
                    self.bump();
                    break;
                }
                None => return Err(("unterminated flow sequence".to_string(), self.end)),
                _ => {}
            }
            let child = location.index(items.len());
            items.push(self.node(&child)?);
            match self.peek() {
                Some(FlowToken::Comma) => self.bump(),
                Some(FlowToken::RBracket) => {
                    self.bump();
                    break;
                }
                None => return Err(("unterminated flow sequence".to_string(), self.end)),
                Some(other) => {
                    return Err((format!("expected `,` or `]`, found `{}`", other), self.at()))
                }
            }
        }
        Ok(Node {
            kind: NodeKind::Sequence(items),
            position: start,
        })
    }

    fn mapping(&mut self, start: Position, location: &Location) -> FlowResult<Node> {
        let mut entries: Vec<Entry> = Vec::new();
        loop {
            let key_at = self.at();
            let key = match self.peek().cloned() {
                Some(FlowToken::RBrace) => {
                    self.bump();
                    break;
                }
                Some(FlowToken::Plain(text)) | Some(FlowToken::Quoted(text, _)) => {
                    self.bump();
                    text
                }
                Some(FlowToken::Invalid(message)) => return Err((message, key_at)),
                Some(FlowToken::Unterminated) => {
                    return Err(("unterminated quoted scalar".to_string(), key_at))
                }
                Some(other) => return Err((format!("expected a key, found `{}`", other), key_at)),
                None => return Err(("unterminated flow mapping".to_string(), self.end)),
            };
            let key_position = position(self.line, key_at);

            let child = location.key(key.clone());
            let value = if self.peek() == Some(&FlowToken::Colon) {
                self.bump();
                match self.peek() {
                    Some(FlowToken::Comma) | Some(FlowToken::RBrace) => {
                        Node::null(position(self.line, self.at()))
                    }
                    _ => self.node(&child)?,
                }
            } else {
                Node::null(position(self.line, self.at()))
            };

            if entries.iter().any(|e| e.key == key) {
                self.errors.push(
                    Diagnostic::new(
                        Code::SyntaxError,
                        child,
                        format!("duplicate key `{}`; the first occurrence is kept", key),
                    )
                    .with_position(key_position),
                );
            } else {
                entries.push(Entry {
                    key,
                    key_position,
                    value,
                });
            }

            match self.peek() {
                Some(FlowToken::Comma) => self.bump(),
                Some(FlowToken::RBrace) => {
                    self.bump();
                    break;
                }
                None => return Err(("unterminated flow mapping".to_string(), self.end)),
                Some(other) => {
                    return Err((format!("expected `,` or `}}`, found `{}`", other), self.at()))
                }
            }
        }
        Ok(Node {
            kind: NodeKind::Mapping(entries),
            position: start,
        })
    }
}
