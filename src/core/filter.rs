/// Tag filters: the small predicate language used in `#{...}` and a
/// reference's `filter` field.
///
/// ```text
/// filter  := clause ( "&&" clause )*
/// clause  := operand | "!" operand | operand ("==" | "!=") operand
/// operand := tags.<key> | ref:<name>.tags.<key> | ref:<name>[.text]
///          | "quoted" | 'quoted' | number | true | false | bareword
/// ```

use thiserror::Error;

use super::context::SelectionContext;
use crate::schema::{TagValue, Tags};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid filter '{filter}': {reason}")]
pub struct FilterError {
    pub filter: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A tag of the candidate value.
    Tag(String),
    /// A tag of the value already selected for another reference.
    RefTag { reference: String, key: String },
    /// The text of the value already selected for another reference.
    RefText(String),
    Literal(TagValue),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Truthy { operand: Operand, negated: bool },
    Compare {
        left: Operand,
        op: Comparison,
        right: Operand,
    },
}

/// A parsed filter: every clause must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub clauses: Vec<Clause>,
}

impl Filter {
    pub fn parse(input: &str) -> Result<Filter, FilterError> {
        let err = |reason: &str| FilterError {
            filter: input.to_string(),
            reason: reason.to_string(),
        };

        let mut clauses = Vec::new();
        for raw in input.split("&&") {
            let raw = raw.trim();
            if raw.is_empty() {
                return Err(err("empty clause"));
            }

            let clause = if let Some((left, right)) = raw.split_once("==") {
                Clause::Compare {
                    left: parse_operand(left).ok_or_else(|| err("bad left operand"))?,
                    op: Comparison::Eq,
                    right: parse_operand(right).ok_or_else(|| err("bad right operand"))?,
                }
            } else if let Some((left, right)) = raw.split_once("!=") {
                Clause::Compare {
                    left: parse_operand(left).ok_or_else(|| err("bad left operand"))?,
                    op: Comparison::Ne,
                    right: parse_operand(right).ok_or_else(|| err("bad right operand"))?,
                }
            } else if let Some(rest) = raw.strip_prefix('!') {
                Clause::Truthy {
                    operand: parse_operand(rest).ok_or_else(|| err("bad operand after '!'"))?,
                    negated: true,
                }
            } else {
                Clause::Truthy {
                    operand: parse_operand(raw).ok_or_else(|| err("bad operand"))?,
                    negated: false,
                }
            };
            clauses.push(clause);
        }

        Ok(Filter { clauses })
    }

    /// Reference names this filter reads from the selection context.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps = Vec::new();
        for clause in &self.clauses {
            let operands = match clause {
                Clause::Truthy { operand, .. } => vec![operand],
                Clause::Compare { left, right, .. } => vec![left, right],
            };
            for operand in operands {
                if let Operand::RefTag { reference, .. } | Operand::RefText(reference) = operand {
                    if !deps.contains(&reference.as_str()) {
                        deps.push(reference.as_str());
                    }
                }
            }
        }
        deps
    }

    /// True when the filter only looks at the candidate's own tags.
    pub fn is_static(&self) -> bool {
        self.dependencies().is_empty()
    }

    pub fn matches(&self, tags: &Tags, selection: &SelectionContext) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Truthy { operand, negated } => {
                let truthy = resolve(operand, tags, selection).is_some_and(|v| v.is_truthy());
                truthy != *negated
            }
            Clause::Compare { left, op, right } => {
                let left = resolve(left, tags, selection);
                let right = resolve(right, tags, selection);
                let equal = match (left, right) {
                    (Some(a), Some(b)) => a == b || a.to_string() == b.to_string(),
                    _ => false,
                };
                match op {
                    Comparison::Eq => equal,
                    Comparison::Ne => !equal,
                }
            }
        })
    }
}

fn resolve(operand: &Operand, tags: &Tags, selection: &SelectionContext) -> Option<TagValue> {
    match operand {
        Operand::Tag(key) => tags.get(key).cloned(),
        Operand::RefTag { reference, key } => selection.tag(reference, key).cloned(),
        Operand::RefText(reference) => selection
            .get(reference)
            .map(|v| TagValue::String(v.text.clone())),
        Operand::Literal(value) => Some(value.clone()),
    }
}

fn parse_operand(raw: &str) -> Option<Operand> {
    let raw = raw.trim();
    if raw.is_empty() || (raw.contains(char::is_whitespace) && !is_quoted(raw)) {
        return None;
    }

    if let Some(key) = raw.strip_prefix("tags.") {
        return is_key(key).then(|| Operand::Tag(key.to_string()));
    }

    if let Some(rest) = raw.strip_prefix("ref:") {
        if let Some((reference, key)) = rest.split_once(".tags.") {
            return (is_key(reference) && is_key(key)).then(|| Operand::RefTag {
                reference: reference.to_string(),
                key: key.to_string(),
            });
        }
        let reference = rest.strip_suffix(".text").unwrap_or(rest);
        return is_key(reference).then(|| Operand::RefText(reference.to_string()));
    }

    if is_quoted(raw) {
        return Some(Operand::Literal(TagValue::String(raw[1..raw.len() - 1].to_string())));
    }

    Some(Operand::Literal(match raw {
        "true" => TagValue::Bool(true),
        "false" => TagValue::Bool(false),
        _ => match raw.parse::<f64>() {
            Ok(n) => TagValue::Number(n),
            Err(_) => TagValue::String(raw.to_string()),
        },
    }))
}

fn is_quoted(raw: &str) -> bool {
    raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
}

fn is_key(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
