/// Per-render state: the enrichment context and the selection context.
///
/// Both live for one render call only and are discarded afterwards.

use rustc_hash::FxHashMap;

use crate::schema::{TagValue, Tags};

/// One value picked during selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedValue {
    pub text: String,
    pub tags: Tags,
}

impl SelectedValue {
    pub fn new(text: impl Into<String>, tags: Tags) -> Self {
        Self {
            text: text.into(),
            tags,
        }
    }

    /// A rendered nested section: text only, no tags.
    pub fn untagged(text: impl Into<String>) -> Self {
        Self::new(text, Tags::new())
    }

    pub fn tag(&self, key: &str) -> Option<&TagValue> {
        self.tags.get(key)
    }
}

/// Key/value store written by rulebook init and rules, read by
/// `context:<key>` references. Last write wins.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: FxHashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// First selected value per reference name, visible to filters of
/// references selected later in the same pass and to rule expressions.
#[derive(Debug, Clone, Default)]
pub struct SelectionContext {
    values: FxHashMap<String, SelectedValue>,
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, reference: impl Into<String>, value: SelectedValue) {
        self.values.insert(reference.into(), value);
    }

    pub fn get(&self, reference: &str) -> Option<&SelectedValue> {
        self.values.get(reference)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.values.contains_key(reference)
    }

    /// Tag `key` of the value selected for `reference`.
    pub fn tag(&self, reference: &str, key: &str) -> Option<&TagValue> {
        self.get(reference).and_then(|v| v.tag(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_last_write_wins() {
        let mut ctx = Context::new();
        assert!(ctx.is_empty());
        ctx.set("article", "a");
        ctx.set("article", "an");
        assert_eq!(ctx.get("article"), Some("an"));
        assert_eq!(ctx.len(), 1);
        assert!(!ctx.contains("mood"));
    }

    #[test]
    fn selection_tag_lookup() {
        let mut sel = SelectionContext::new();
        let mut tags = Tags::new();
        tags.insert("article".to_string(), TagValue::from("an"));
        sel.record("creature", SelectedValue::new("elf", tags));
        assert_eq!(sel.tag("creature", "article"), Some(&TagValue::from("an")));
        assert_eq!(sel.tag("creature", "plural"), None);
        assert_eq!(sel.tag("weapon", "article"), None);
        assert!(sel.contains("creature"));
    }
}
