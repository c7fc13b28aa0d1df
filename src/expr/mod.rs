//! Expression heuristics.
//!
//! Entity expressions are opaque SQL-like strings. Nothing here executes or
//! fully parses them; the helpers only answer the questions the resolver
//! asks: do brackets and quotes balance, which functions are called, which
//! bare names are mentioned, and (optionally) does `SELECT <expr>` parse in a
//! configured SQL dialect.

pub mod lexer;
pub mod rules;
pub mod sql;

pub use lexer::Token;
pub use rules::{AggregateRule, AllowListAggregateRule};
pub use sql::{check_sql, SqlDialect};

use std::fmt;

/// Why an expression does not balance. Columns are 1-based character
/// positions within the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Imbalance {
    UnterminatedQuote { quote: char, column: usize },
    UnexpectedClose { found: char, column: usize },
    Unclosed { open: char, column: usize },
}

impl fmt::Display for Imbalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Imbalance::UnterminatedQuote { quote, column } => {
                write!(f, "unterminated {} quote at character {}", quote, column)
            }
            Imbalance::UnexpectedClose { found, column } => {
                write!(f, "unexpected `{}` at character {}", found, column)
            }
            Imbalance::Unclosed { open, column } => {
                write!(f, "`{}` at character {} is never closed", open, column)
            }
        }
    }
}

fn column(expr: &str, offset: usize) -> usize {
    expr[..offset.min(expr.len())].chars().count() + 1
}

/// Check that parentheses, brackets and quotes in `expr` balance.
pub fn check_balanced(expr: &str) -> Result<(), Imbalance> {
    let Ok(tokens) = lexer::lex(expr) else {
        return Ok(());
    };
    let mut open: Vec<(char, usize)> = Vec::new();
    for (token, span) in tokens {
        let at = span.start;
        match token {
            Token::StrayQuote(quote) => {
                return Err(Imbalance::UnterminatedQuote {
                    quote,
                    column: column(expr, at),
                })
            }
            Token::LParen => open.push(('(', at)),
            Token::LBracket => open.push(('[', at)),
            Token::RParen | Token::RBracket => {
                let (expected, found) = if token == Token::RParen {
                    ('(', ')')
                } else {
                    ('[', ']')
                };
                match open.pop() {
                    Some((c, _)) if c == expected => {}
                    _ => {
                        return Err(Imbalance::UnexpectedClose {
                            found,
                            column: column(expr, at),
                        })
                    }
                }
            }
            _ => {}
        }
    }
    match open.pop() {
        Some((open, at)) => Err(Imbalance::Unclosed {
            open,
            column: column(expr, at),
        }),
        None => Ok(()),
    }
}

/// Names of functions called in `expr` (an identifier directly followed by
/// `(`), as written. `None` if the expression could not be tokenized.
pub fn function_calls(expr: &str) -> Option<Vec<&str>> {
    let tokens = lexer::lex(expr).ok()?;
    let calls = tokens
        .windows(2)
        .filter_map(|pair| match (&pair[0].0, &pair[1].0) {
            (Token::Ident(name), Token::LParen) => Some(*name),
            _ => None,
        })
        .collect();
    Some(calls)
}

/// Names mentioned in `expr` that are not function calls: bare and quoted
/// identifiers.
pub fn identifiers(expr: &str) -> Vec<&str> {
    let Ok(tokens) = lexer::lex(expr) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for (i, (token, _)) in tokens.iter().enumerate() {
        let called = matches!(tokens.get(i + 1), Some((Token::LParen, _)));
        match token {
            Token::Ident(name) if !called => names.push(*name),
            Token::QuotedIdent(name) => names.push(*name),
            _ => {}
        }
    }
    names
}
