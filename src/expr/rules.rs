//! Aggregate detection for metric expressions.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;

/// Decides whether a metric expression is an aggregate.
pub trait AggregateRule: Send + Sync + fmt::Debug {
    fn is_aggregate(&self, expr: &str) -> bool;

    /// Short description used in diagnostics, e.g. the allowed functions.
    fn describe(&self) -> String;
}

/// Aggregate if the expression calls an allow-listed function. Names match
/// case-insensitively; a trailing `*` makes a name a prefix pattern
/// (`approx_*`).
#[derive(Debug, Clone)]
pub struct AllowListAggregateRule {
    exact: BTreeSet<String>,
    prefixes: Vec<String>,
    /// Used when the expression cannot be tokenized.
    fallback: Option<Regex>,
}

impl AllowListAggregateRule {
    pub const STANDARD: [&'static str; 5] = ["sum", "avg", "count", "min", "max"];

    pub fn standard() -> Self {
        Self::new(Self::STANDARD)
    }

    pub fn new<I, S>(functions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut exact = BTreeSet::new();
        let mut prefixes = Vec::new();
        for function in functions {
            let name = function.as_ref().trim().to_ascii_lowercase();
            if name.is_empty() {
                continue;
            }
            match name.strip_suffix('*') {
                Some(prefix) => prefixes.push(prefix.to_string()),
                None => {
                    exact.insert(name);
                }
            }
        }
        prefixes.sort();
        prefixes.dedup();

        let alternatives: Vec<String> = exact
            .iter()
            .map(|n| regex::escape(n))
            .chain(prefixes.iter().map(|p| format!(r"{}\w*", regex::escape(p))))
            .collect();
        let fallback = if alternatives.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b(?:{})\s*\(", alternatives.join("|"))).ok()
        };

        Self {
            exact,
            prefixes,
            fallback,
        }
    }

    fn allows(&self, function: &str) -> bool {
        let name = function.to_ascii_lowercase();
        self.exact.contains(&name) || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

impl Default for AllowListAggregateRule {
    fn default() -> Self {
        Self::standard()
    }
}

impl AggregateRule for AllowListAggregateRule {
    fn is_aggregate(&self, expr: &str) -> bool {
        match super::function_calls(expr) {
            Some(calls) => calls.iter().any(|c| self.allows(c)),
            None => self
                .fallback
                .as_ref()
                .is_some_and(|re| re.is_match(expr)),
        }
    }

    fn describe(&self) -> String {
        let mut names: Vec<String> = self.exact.iter().cloned().collect();
        names.extend(self.prefixes.iter().map(|p| format!("{}*", p)));
        names.join(", ")
    }
}
