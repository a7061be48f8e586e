/// Template tokenizer: splits a template string into literal text and
/// references with their optional filter and repeat parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unclosed reference starting at position {0}")]
    Unclosed(usize),
    #[error("empty reference at position {0}")]
    EmptyReference(usize),
    #[error("invalid reference format: '{0}'")]
    InvalidReference(String),
}

/// A reference occurrence inside a template: `{name#{filter}?min=1,max=3}`.
///
/// Parameters are `None` unless the template spells them out, so the
/// reference definition can supply defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    pub filter: Option<String>,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub separator: Option<String>,
    pub unique: Option<bool>,
}

impl TemplateRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    /// Literal text, emitted as-is.
    Text(String),
    /// A named slot resolved through the section's reference table.
    Reference(TemplateRef),
}

/// A parsed template: a sequence of tokens in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub tokens: Vec<Token>,
}

impl Template {
    /// Parse a template string into a sequence of tokens.
    ///
    /// Syntax:
    /// - `{name}` → `Reference`
    /// - `{name#{filter}}` → `Reference` with a filter; braces inside the
    ///   filter are depth-counted
    /// - `{name?min=1,max=3&sep=list&unique=true}` → `Reference` with parameters
    /// - `{{` / `}}` → literal `{` / `}`
    /// - Everything else → `Text`
    pub fn parse(input: &str) -> Result<Template, ParseError> {
        let mut tokens = Vec::new();
        let mut literal_buf = String::new();
        let chars: Vec<char> = input.chars().collect();
        let len = chars.len();
        let mut i = 0;

        while i < len {
            match chars[i] {
                '{' if i + 1 < len && chars[i + 1] == '{' => {
                    literal_buf.push('{');
                    i += 2;
                }
                '{' => {
                    if !literal_buf.is_empty() {
                        tokens.push(Token::Text(std::mem::take(&mut literal_buf)));
                    }

                    let start = i + 1;
                    let end = find_closing(&chars, start).ok_or(ParseError::Unclosed(i))?;
                    let body: String = chars[start..end].iter().collect();
                    let body = body.trim();
                    if body.is_empty() {
                        return Err(ParseError::EmptyReference(i));
                    }

                    tokens.push(Token::Reference(parse_reference(body)?));
                    i = end + 1;
                }
                '}' if i + 1 < len && chars[i + 1] == '}' => {
                    literal_buf.push('}');
                    i += 2;
                }
                c => {
                    // A stray `}` is kept as text.
                    literal_buf.push(c);
                    i += 1;
                }
            }
        }

        if !literal_buf.is_empty() {
            tokens.push(Token::Text(literal_buf));
        }

        Ok(Template { tokens })
    }

    /// All reference tokens in template order.
    pub fn references(&self) -> impl Iterator<Item = &TemplateRef> {
        self.tokens.iter().filter_map(|t| match t {
            Token::Reference(r) => Some(r),
            Token::Text(_) => None,
        })
    }

    /// Distinct reference names in order of first appearance.
    pub fn reference_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for r in self.references() {
            if !names.contains(&r.name.as_str()) {
                names.push(&r.name);
            }
        }
        names
    }
}

/// Index of the `}` closing a reference whose body starts at `start`.
fn find_closing(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &c) in chars[start..].iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(start + offset),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Parse a reference body: `name#{filter}?key=value,key=value`.
fn parse_reference(body: &str) -> Result<TemplateRef, ParseError> {
    let (name, filter, params) = match body.find("#{") {
        Some(hash) => {
            let filter_start = hash + 2;
            let chars: Vec<char> = body[filter_start..].chars().collect();
            let close = find_closing(&chars, 0)
                .ok_or_else(|| ParseError::InvalidReference(body.to_string()))?;
            let filter: String = chars[..close].iter().collect();
            let rest: String = chars[close + 1..].iter().collect();
            (&body[..hash], Some(filter.trim().to_string()), rest)
        }
        None => match body.split_once('?') {
            Some((name, params)) => (name, None, params.to_string()),
            None => (body, None, String::new()),
        },
    };

    let name = name.trim();
    if name.is_empty() {
        return Err(ParseError::InvalidReference(body.to_string()));
    }

    let mut reference = TemplateRef {
        name: name.to_string(),
        filter: filter.filter(|f| !f.is_empty()),
        ..TemplateRef::default()
    };

    let params = params.trim();
    let params = params.strip_prefix('?').unwrap_or(params);
    for param in params.split([',', '&']) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        if value.is_empty() {
            continue;
        }
        match key {
            "min" => reference.min = value.parse().ok(),
            "max" => reference.max = value.parse().ok(),
            "sep" | "separator" => reference.separator = Some(value.to_string()),
            "unique" => reference.unique = Some(value == "true"),
            _ => {}
        }
    }

    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    #[test]
    fn parse_literal_only() {
        let t = Template::parse("Hello, world.").unwrap();
        assert_eq!(t.tokens, vec![text("Hello, world.")]);
    }

    #[test]
    fn parse_bare_reference() {
        let t = Template::parse("A {color} ball").unwrap();
        assert_eq!(
            t.tokens,
            vec![
                text("A "),
                Token::Reference(TemplateRef::named("color")),
                text(" ball"),
            ]
        );
    }

    #[test]
    fn parse_escaped_braces() {
        assert_eq!(Template::parse("{{").unwrap().tokens, vec![text("{")]);
        assert_eq!(
            Template::parse("A {{x}} B").unwrap().tokens,
            vec![text("A {x} B")]
        );
    }

    #[test]
    fn parse_filter_with_nested_braces() {
        let t = Template::parse("{animal#{tags.size == {big}}}").unwrap();
        let r = t.references().next().unwrap();
        assert_eq!(r.name, "animal");
        assert_eq!(r.filter.as_deref(), Some("tags.size == {big}"));
    }

    #[test]
    fn parse_parameters() {
        let t = Template::parse("{color?min=2,max=4&sep=comma_and&unique=true}").unwrap();
        let r = t.references().next().unwrap();
        assert_eq!(r.name, "color");
        assert_eq!(r.min, Some(2));
        assert_eq!(r.max, Some(4));
        assert_eq!(r.separator.as_deref(), Some("comma_and"));
        assert_eq!(r.unique, Some(true));
    }

    #[test]
    fn parse_filter_then_parameters() {
        let t = Template::parse("{color#{tags.bright}?max=3&separator=list}").unwrap();
        let r = t.references().next().unwrap();
        assert_eq!(r.filter.as_deref(), Some("tags.bright"));
        assert_eq!(r.min, None);
        assert_eq!(r.max, Some(3));
        assert_eq!(r.separator.as_deref(), Some("list"));
    }

    #[test]
    fn unknown_parameters_ignored() {
        let t = Template::parse("{color?shade=dark,unique=yes}").unwrap();
        let r = t.references().next().unwrap();
        assert_eq!(r.unique, Some(false));
        assert_eq!(r.separator, None);
    }

    #[test]
    fn parse_empty_reference_error() {
        assert_eq!(Template::parse("Bad {} here"), Err(ParseError::EmptyReference(4)));
        assert!(Template::parse("Bad {  } here").is_err());
    }

    #[test]
    fn parse_unclosed_error() {
        assert_eq!(Template::parse("Bad {unclosed here"), Err(ParseError::Unclosed(4)));
        assert!(Template::parse("{color#{tags.x}").is_err());
    }

    #[test]
    fn stray_close_is_literal() {
        assert_eq!(Template::parse("a } b").unwrap().tokens, vec![text("a } b")]);
    }

    #[test]
    fn reference_names_are_distinct_in_order() {
        let t = Template::parse("{b} {a} {b} {context.article}").unwrap();
        assert_eq!(t.reference_names(), vec!["b", "a", "context.article"]);
    }
}
