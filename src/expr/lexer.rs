//! Lexer for entity expressions.
//!
//! Expressions are opaque SQL-like text. The lexer only splits them far
//! enough for the resolver heuristics: identifiers, quoted names, string
//! literals, numbers, brackets and operators. It never fails on arbitrary
//! input: an unterminated quote lexes as [`Token::StrayQuote`] and any other
//! unexpected character as [`Token::Other`].

use chumsky::prelude::*;

/// A token in an entity expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    // ========================================================================
    // Names and literals
    // ========================================================================
    /// A bare identifier.
    Ident(&'src str),
    /// A `"quoted"` or `` `backticked` `` identifier (contents without quotes).
    QuotedIdent(&'src str),
    /// A `'string'` literal (contents without quotes, `''` escapes kept).
    StringLit(&'src str),
    /// An integer or decimal number.
    Number(&'src str),

    // ========================================================================
    // Symbols
    // ========================================================================
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// An operator such as `+`, `<=` or `||`.
    Op(&'src str),

    // ========================================================================
    // Leftovers
    // ========================================================================
    /// A quote character without a closing partner.
    StrayQuote(char),
    /// Any other character.
    Other(char),
}

impl<'src> std::fmt::Display for Token<'src> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::QuotedIdent(s) => write!(f, "\"{}\"", s),
            Token::StringLit(s) => write!(f, "'{}'", s),
            Token::Number(s) => write!(f, "{}", s),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Op(s) => write!(f, "{}", s),
            Token::StrayQuote(c) | Token::Other(c) => write!(f, "{}", c),
        }
    }
}

/// Create the expression lexer.
pub fn lexer<'src>(
) -> impl Parser<'src, &'src str, Vec<(Token<'src>, SimpleSpan)>, extra::Err<Rich<'src, char>>> {
    let ident = text::ident().map(Token::Ident);

    // "double quoted" and `backticked` identifiers
    let quoted_ident = just('"')
        .ignore_then(none_of('"').repeated().to_slice())
        .then_ignore(just('"'))
        .or(just('`')
            .ignore_then(none_of('`').repeated().to_slice())
            .then_ignore(just('`')))
        .map(Token::QuotedIdent);

    // 'string literals' with '' escapes
    let string_lit = just('\'')
        .ignore_then(
            just("''")
                .ignored()
                .or(none_of('\'').ignored())
                .repeated()
                .to_slice(),
        )
        .then_ignore(just('\''))
        .map(Token::StringLit);

    let number = text::digits(10)
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .map(Token::Number);

    // Operators (multi-char first, then single-char)
    let op = choice((
        just("<=").to_slice(),
        just(">=").to_slice(),
        just("<>").to_slice(),
        just("!=").to_slice(),
        just("||").to_slice(),
        just("::").to_slice(),
        one_of("+-*/%=<>!|&^~:;@?").to_slice(),
    ))
    .map(Token::Op);

    let symbol = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
    ));

    let stray_quote = one_of("'\"`").map(Token::StrayQuote);

    let other = any()
        .filter(|c: &char| !c.is_whitespace())
        .map(Token::Other);

    let token = choice((ident, quoted_ident, string_lit, number, symbol, op, stray_quote, other))
        .map_with(|tok, e| (tok, e.span()));

    token
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

/// Lex an expression into tokens.
///
/// Returns Ok with the token list on success, or Err with the parse errors.
pub fn lex(source: &str) -> Result<Vec<(Token<'_>, SimpleSpan)>, Vec<Rich<'_, char>>> {
    let (tokens, errs) = lexer().parse(source).into_output_errors();
    if errs.is_empty() {
        Ok(tokens.unwrap_or_default())
    } else {
        Err(errs)
    }
}
