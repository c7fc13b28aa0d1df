//! Token-level lexers for the structural parser.
//!
//! Block structure is handled line by line in the parser. The two places
//! where a line has inner structure, quoted scalars and single-line flow
//! collections, are lexed here with chumsky. Both lexers are total: an
//! unterminated quote or a bad escape becomes a token, never a lexer error,
//! so the parser decides how to report it.

use chumsky::prelude::*;

use super::node::ScalarStyle;

/// Escapes that stand for a single character.
const SIMPLE_ESCAPES: &str = "ntr0beafv /\"\\N_LP";

const HEX_DIGITS: &str = "0123456789abcdefABCDEF";

/// One unit of a quoted scalar body.
#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Char(char),
    /// Escape text after the backslash that has no meaning.
    BadEscape(String),
}

fn simple_escape(c: char) -> char {
    match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        'b' => '\u{8}',
        'e' => '\u{1b}',
        'a' => '\u{7}',
        'f' => '\u{c}',
        'v' => '\u{b}',
        'N' => '\u{85}',
        '_' => '\u{a0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        // ' ', '/', '"' and '\\' stand for themselves
        other => other,
    }
}

/// Join decoded pieces, failing on the first bad escape.
fn assemble(pieces: Vec<Piece>) -> Result<String, String> {
    let mut out = String::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            Piece::Char(c) => out.push(c),
            Piece::BadEscape(text) => return Err(format!("invalid escape sequence \\{}", text)),
        }
    }
    Ok(out)
}

/// `'single quoted'` with `''` escapes.
fn single_quoted<'src>(
) -> impl Parser<'src, &'src str, Vec<Piece>, extra::Err<Rich<'src, char>>> + Clone {
    just('\'')
        .ignore_then(
            just("''")
                .to('\'')
                .or(none_of('\''))
                .map(Piece::Char)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(just('\''))
}

/// `"double quoted"` with backslash escapes.
fn double_quoted<'src>(
) -> impl Parser<'src, &'src str, Vec<Piece>, extra::Err<Rich<'src, char>>> + Clone {
    let hex = |prefix: char, width: usize| {
        just(prefix)
            .ignore_then(one_of(HEX_DIGITS).repeated().exactly(width).to_slice())
            .map(move |digits: &str| {
                match u32::from_str_radix(digits, 16).ok().and_then(char::from_u32) {
                    Some(c) => Piece::Char(c),
                    None => Piece::BadEscape(format!("{}{}", prefix, digits)),
                }
            })
    };

    let escape = just('\\').ignore_then(choice((
        one_of(SIMPLE_ESCAPES).map(|c| Piece::Char(simple_escape(c))),
        hex('x', 2),
        hex('u', 4),
        hex('U', 8),
        any().map(|c: char| Piece::BadEscape(c.to_string())),
    )));

    just('"')
        .ignore_then(
            none_of("\\\"")
                .map(Piece::Char)
                .or(escape)
                .repeated()
                .collect::<Vec<_>>(),
        )
        .then_ignore(just('"'))
}

/// A quoted scalar with its style.
fn quoted<'src>(
) -> impl Parser<'src, &'src str, (Vec<Piece>, ScalarStyle), extra::Err<Rich<'src, char>>> + Clone
{
    single_quoted()
        .map(|pieces| (pieces, ScalarStyle::SingleQuoted))
        .or(double_quoted().map(|pieces| (pieces, ScalarStyle::DoubleQuoted)))
}

/// Decode a quoted scalar at the start of `text`. Returns the decoded value
/// and the number of bytes consumed (including both quotes), or `None` if
/// the closing quote is missing.
pub(crate) fn decode_quoted(text: &str) -> Result<Option<(String, usize)>, String> {
    let parser = quoted().then(any().repeated().to_slice());
    let Some(((pieces, _), rest)) = parser.parse(text).into_output() else {
        return Ok(None);
    };
    let value = assemble(pieces)?;
    Ok(Some((value, text.len() - rest.len())))
}

// ============================================================================
// Flow collections
// ============================================================================

/// A token of a single-line flow collection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FlowToken {
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `,`
    Comma,
    /// `:` followed by whitespace, a flow indicator or the end.
    Colon,
    Quoted(String, ScalarStyle),
    /// Plain scalar text, trailing whitespace removed.
    Plain(String),
    /// A quoted scalar with an invalid escape.
    Invalid(String),
    /// A quote without its closing partner; runs to the end of the input.
    Unterminated,
}

impl std::fmt::Display for FlowToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowToken::LBracket => write!(f, "["),
            FlowToken::RBracket => write!(f, "]"),
            FlowToken::LBrace => write!(f, "{{"),
            FlowToken::RBrace => write!(f, "}}"),
            FlowToken::Comma => write!(f, ","),
            FlowToken::Colon => write!(f, ":"),
            FlowToken::Quoted(text, ScalarStyle::SingleQuoted) => write!(f, "'{}'", text),
            FlowToken::Quoted(text, _) => write!(f, "\"{}\"", text),
            FlowToken::Plain(text) => write!(f, "{}", text),
            FlowToken::Invalid(_) | FlowToken::Unterminated => write!(f, "quoted scalar"),
        }
    }
}

/// Create the flow collection lexer.
pub(crate) fn flow_lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(FlowToken, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let quoted_token = quoted().map(|(pieces, style)| match assemble(pieces) {
        Ok(text) => FlowToken::Quoted(text, style),
        Err(message) => FlowToken::Invalid(message),
    });

    let unterminated = one_of("'\"")
        .then(any().repeated())
        .to(FlowToken::Unterminated);

    // A colon only separates a key when followed by a break in the text
    let value_colon = just(':').then_ignore(
        one_of(" \t,[]{}")
            .ignored()
            .or(end())
            .rewind(),
    );

    let symbol = choice((
        just('[').to(FlowToken::LBracket),
        just(']').to(FlowToken::RBracket),
        just('{').to(FlowToken::LBrace),
        just('}').to(FlowToken::RBrace),
        just(',').to(FlowToken::Comma),
        value_colon.clone().to(FlowToken::Colon),
    ));

    let plain = any()
        .and_is(one_of(",[]{}").not())
        .and_is(value_colon.not())
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|text: &str| FlowToken::Plain(text.trim_end().to_string()));

    let token = choice((quoted_token, unterminated, symbol, plain)).map_with(|tok, e| (tok, e.span()));

    token
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

/// Lex the text of a flow collection.
pub(crate) fn lex_flow(text: &str) -> Result<Vec<(FlowToken, SimpleSpan)>, (String, usize)> {
    let (tokens, errs) = flow_lexer().parse(text).into_output_errors();
    match errs.into_iter().next() {
        None => Ok(tokens.unwrap_or_default()),
        Some(err) => Err((err.to_string(), err.span().start)),
    }
}
