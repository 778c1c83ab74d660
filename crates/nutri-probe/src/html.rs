// crates/nutri-probe/src/html.rs
// ============================================================================
// Module: HTML Start-Tag Scanner
// Description: Tolerant markup scanning for element and attribute queries.
// Purpose: Query rendered pages by tag, id, class, and attribute.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! Rendered pages are scanned for start tags only. The scanner is tolerant of
//! attribute order, quoting style, and tag-name case, and it skips comments.
//! It does not build a tree: checks only ask whether an element with a given
//! identity exists, which start tags answer on their own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;


// ============================================================================
// SECTION: Patterns
// ============================================================================

/// Matches HTML comments, which are removed before scanning.
const COMMENT_PATTERN: &str = r"(?s)<!--.*?-->";
/// Matches a start tag and captures its name and raw attribute text.
const TAG_PATTERN: &str = concat!(
    r#"<([A-Za-z][A-Za-z0-9:-]*)"#,
    r#"((?:\s+[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*/?>"#
);
/// Matches one attribute within a start tag.
const ATTR_PATTERN: &str =
    r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#;

/// Returns a lazily compiled pattern, or `None` when compilation failed.
fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Compiled comment pattern.
fn comment_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, COMMENT_PATTERN)
}

/// Compiled start-tag pattern.
fn tag_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, TAG_PATTERN)
}

/// Compiled attribute pattern.
fn attr_regex() -> Option<&'static Regex> {
    static CELL: OnceLock<Option<Regex>> = OnceLock::new();
    compiled(&CELL, ATTR_PATTERN)
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// One start tag with normalized attributes.
///
/// # Invariants
/// - `name` and attribute names are ASCII-lowercase.
/// - Attribute values have basic character references decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercase tag name.
    pub name: String,
    /// Attributes in document order; valueless attributes map to "".
    pub attrs: Vec<(String, String)>,
}

impl StartTag {
    /// Returns the first value for an attribute name (case-insensitive).
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns true when the `class` attribute lists the class token.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class").is_some_and(|value| value.split_ascii_whitespace().any(|c| c == class))
    }
}

/// Scanned document: the start tags of a page in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlDocument {
    /// Start tags in document order.
    tags: Vec<StartTag>,
}

impl HtmlDocument {
    /// Scans markup for start tags.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        let (Some(comments), Some(tag_re), Some(attr_re)) =
            (comment_regex(), tag_regex(), attr_regex())
        else {
            return Self::default();
        };
        let stripped = comments.replace_all(source, "");
        let tags = tag_re
            .captures_iter(&stripped)
            .map(|caps| {
                let name = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
                let raw_attrs = caps.get(2).map_or("", |m| m.as_str());
                let attrs = attr_re
                    .captures_iter(raw_attrs)
                    .filter_map(|attr| {
                        let key = attr.get(1)?.as_str().to_ascii_lowercase();
                        let value = attr
                            .get(2)
                            .or_else(|| attr.get(3))
                            .or_else(|| attr.get(4))
                            .map_or(String::new(), |m| decode_entities(m.as_str()));
                        Some((key, value))
                    })
                    .collect();
                StartTag {
                    name,
                    attrs,
                }
            })
            .collect();
        Self {
            tags,
        }
    }

    /// Returns every start tag.
    #[must_use]
    pub fn tags(&self) -> &[StartTag] {
        &self.tags
    }

    /// Iterates start tags with the given name (case-insensitive).
    pub fn find<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StartTag> + 'a {
        self.tags.iter().filter(move |tag| tag.name.eq_ignore_ascii_case(name))
    }

    /// Returns true when any element carries `id="<id>"`.
    #[must_use]
    pub fn has_element_id(&self, id: &str) -> bool {
        self.tags.iter().any(|tag| tag.attr("id") == Some(id))
    }

    /// Returns true when any element lists the class token.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.tags.iter().any(|tag| tag.has_class(class))
    }

    /// Returns true when a `<tag attr="value">` element exists.
    #[must_use]
    pub fn has_tag_with_attr(&self, tag: &str, attr: &str, value: &str) -> bool {
        self.find(tag).any(|candidate| candidate.attr(attr) == Some(value))
    }

    /// Returns the `value` of the first `<input>` with the given `name`.
    #[must_use]
    pub fn input_value(&self, name: &str) -> Option<&str> {
        self.find("input")
            .find(|tag| tag.attr("name") == Some(name))
            .and_then(|tag| tag.attr("value"))
    }

    /// Returns the `content` of the first `<meta>` with the given `name`.
    #[must_use]
    pub fn meta_content(&self, name: &str) -> Option<&str> {
        self.find("meta")
            .find(|tag| tag.attr("name").is_some_and(|value| value.eq_ignore_ascii_case(name)))
            .and_then(|tag| tag.attr("content"))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes the character references that appear in attribute values.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
