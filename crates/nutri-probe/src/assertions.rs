// crates/nutri-probe/src/assertions.rs
// ============================================================================
// Module: Content Assertions
// Description: Typed expectations evaluated against probe responses.
// Purpose: Turn raw responses into expected/actual pairs with a verdict.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Expectation`] inspects one aspect of a [`ProbeResponse`]: its status,
//! redirect target, content type, HTML structure, or JSON payload. Every
//! evaluation yields an [`Evaluation`] holding a human-readable expected and
//! actual value, so reports explain failures without re-running the probe.
//!
//! Server failure classification prefers a structured error payload and only
//! falls back to scanning the body for well-known exception names when the
//! server did not answer with one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::html::HtmlDocument;
use crate::probe::ProbeResponse;


// ============================================================================
// SECTION: Verdicts
// ============================================================================

/// Verdict for one expectation or one whole check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckVerdict {
    /// Behaviour matched.
    Pass,
    /// Behaviour did not match.
    Fail,
    /// Check did not run.
    Skipped,
    /// Check aborted on a transport error.
    Error,
}

impl CheckVerdict {
    /// Returns the stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skipped => "skipped",
            Self::Error => "error",
        }
    }
}

/// Expected/actual pair produced by one expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    /// What the expectation required.
    pub expected: String,
    /// What the response showed.
    pub actual: String,
    /// `Pass` or `Fail`.
    pub verdict: CheckVerdict,
}

impl Evaluation {
    /// Builds an evaluation from a pass flag.
    fn new(expected: String, actual: impl Into<String>, passed: bool) -> Self {
        Self {
            expected,
            actual: actual.into(),
            verdict: if passed { CheckVerdict::Pass } else { CheckVerdict::Fail },
        }
    }

    /// Returns true when the expectation held.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict == CheckVerdict::Pass
    }
}

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Case handling for substring searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    /// Exact byte match.
    #[default]
    Sensitive,
    /// ASCII and Unicode lowercase comparison.
    Insensitive,
}

/// One condition a response must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// Exact status code.
    Status(u16),
    /// Any of the listed status codes.
    StatusOneOf(Vec<u16>),
    /// A 3xx whose `Location` path starts with the prefix.
    RedirectTo(String),
    /// Body contains the text.
    BodyContains {
        /// Text to find.
        text: String,
        /// Case handling.
        case: CaseMode,
    },
    /// Body does not contain the text.
    BodyLacks {
        /// Text that must be absent.
        text: String,
        /// Case handling.
        case: CaseMode,
    },
    /// An element carries `id="<id>"`.
    ElementId(String),
    /// An element lists the class token.
    CssClass(String),
    /// A `<tag attr="value">` element exists.
    TagWithAttr {
        /// Tag name.
        tag: String,
        /// Attribute name.
        attr: String,
        /// Attribute value.
        value: String,
    },
    /// `Content-Type` starts with the prefix (case-insensitive).
    ContentType(String),
    /// Body is a JSON array whose object items all have the fields.
    JsonArrayItemsHave(Vec<String>),
    /// Body is a JSON array whose items have the field `true` when present.
    JsonArrayFieldTrueIfPresent(String),
    /// Body is a JSON array of the given length.
    JsonArrayLen(usize),
    /// Body is a JSON array with an item whose string field contains text.
    JsonArrayAnyNameContains {
        /// Field holding a string.
        field: String,
        /// Substring to find.
        text: String,
    },
    /// The JSON pointer resolves to the value (numbers compare numerically).
    JsonPointerEquals {
        /// RFC 6901 pointer.
        pointer: String,
        /// Expected value.
        value: Value,
    },
    /// Body is a JSON object containing every key.
    JsonHasKeys(Vec<String>),
    /// Body is a JSON object with a non-empty `error` or `message` string.
    JsonErrorPayload,
}

impl Expectation {
    /// Shorthand for a case-sensitive [`Expectation::BodyContains`].
    pub fn body_contains(text: impl Into<String>) -> Self {
        Self::BodyContains {
            text: text.into(),
            case: CaseMode::Sensitive,
        }
    }

    /// Shorthand for [`Expectation::TagWithAttr`].
    pub fn tag_with_attr(
        tag: impl Into<String>,
        attr: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::TagWithAttr {
            tag: tag.into(),
            attr: attr.into(),
            value: value.into(),
        }
    }

    /// Shorthand for [`Expectation::JsonArrayItemsHave`].
    pub fn json_items_have(fields: &[&str]) -> Self {
        Self::JsonArrayItemsHave(fields.iter().map(|field| (*field).to_string()).collect())
    }

    /// Describes the expectation for reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Status(code) => format!("status {code}"),
            Self::StatusOneOf(codes) => format!("status one of {codes:?}"),
            Self::RedirectTo(prefix) => format!("redirect to {prefix}"),
            Self::BodyContains {
                text,
                case,
            } => format!("body contains {text:?}{}", case_suffix(*case)),
            Self::BodyLacks {
                text,
                case,
            } => format!("body lacks {text:?}{}", case_suffix(*case)),
            Self::ElementId(id) => format!("element #{id}"),
            Self::CssClass(class) => format!("element .{class}"),
            Self::TagWithAttr {
                tag,
                attr,
                value,
            } => format!("<{tag} {attr}=\"{value}\">"),
            Self::ContentType(prefix) => format!("content type {prefix}"),
            Self::JsonArrayItemsHave(fields) => format!("array items with {}", fields.join(", ")),
            Self::JsonArrayFieldTrueIfPresent(field) => format!("array items with {field} true"),
            Self::JsonArrayLen(len) => format!("array of {len} item(s)"),
            Self::JsonArrayAnyNameContains {
                field,
                text,
            } => format!("an item whose {field} contains {text:?}"),
            Self::JsonPointerEquals {
                pointer,
                value,
            } => format!("{pointer} == {value}"),
            Self::JsonHasKeys(keys) => format!("object with keys {}", keys.join(", ")),
            Self::JsonErrorPayload => "JSON error payload".to_string(),
        }
    }

    /// Evaluates the expectation against a response.
    #[must_use]
    pub fn evaluate(&self, response: &ProbeResponse) -> Evaluation {
        let expected = self.describe();
        match self {
            Self::Status(code) => {
                Evaluation::new(expected, response.status.to_string(), response.status == *code)
            }
            Self::StatusOneOf(codes) => Evaluation::new(
                expected,
                response.status.to_string(),
                codes.contains(&response.status),
            ),
            Self::RedirectTo(prefix) => evaluate_redirect(expected, response, prefix),
            Self::BodyContains {
                text,
                case,
            } => {
                let found = contains(&response.text(), text, *case);
                Evaluation::new(expected, presence(found), found)
            }
            Self::BodyLacks {
                text,
                case,
            } => {
                let found = contains(&response.text(), text, *case);
                Evaluation::new(expected, presence(found), !found)
            }
            Self::ElementId(id) => {
                let found = HtmlDocument::parse(&response.text()).has_element_id(id);
                Evaluation::new(expected, presence(found), found)
            }
            Self::CssClass(class) => {
                let found = HtmlDocument::parse(&response.text()).has_class(class);
                Evaluation::new(expected, presence(found), found)
            }
            Self::TagWithAttr {
                tag,
                attr,
                value,
            } => {
                let doc = HtmlDocument::parse(&response.text());
                let found = doc.has_tag_with_attr(tag, attr, value);
                Evaluation::new(expected, presence(found), found)
            }
            Self::ContentType(prefix) => {
                let actual = response.content_type().unwrap_or("none");
                let passed = actual.to_ascii_lowercase().starts_with(&prefix.to_ascii_lowercase());
                Evaluation::new(expected, actual, passed)
            }
            Self::JsonArrayItemsHave(_)
            | Self::JsonArrayFieldTrueIfPresent(_)
            | Self::JsonArrayLen(_)
            | Self::JsonArrayAnyNameContains {
                ..
            }
            | Self::JsonPointerEquals {
                ..
            }
            | Self::JsonHasKeys(_)
            | Self::JsonErrorPayload => match response.json() {
                Ok(value) => {
                    let (actual, passed) = self.evaluate_json(&value);
                    Evaluation::new(expected, actual, passed)
                }
                Err(_) => Evaluation::new(expected, "body is not JSON", false),
            },
        }
    }

    /// Evaluates JSON expectations against a decoded body.
    fn evaluate_json(&self, value: &Value) -> (String, bool) {
        match self {
            Self::JsonArrayItemsHave(fields) => with_array(value, |items| {
                for (index, item) in items.iter().enumerate() {
                    let Some(object) = item.as_object() else {
                        return (format!("item {index} is not an object"), false);
                    };
                    if let Some(missing) = fields.iter().find(|field| !object.contains_key(*field))
                    {
                        return (format!("item {index} lacks {missing}"), false);
                    }
                }
                (format!("{} item(s) complete", items.len()), true)
            }),
            Self::JsonArrayFieldTrueIfPresent(field) => with_array(value, |items| {
                for (index, item) in items.iter().enumerate() {
                    match item.get(field) {
                        None | Some(Value::Bool(true)) => {}
                        Some(other) => {
                            return (format!("item {index} has {field} = {other}"), false);
                        }
                    }
                }
                (format!("{} item(s) ok", items.len()), true)
            }),
            Self::JsonArrayLen(len) => {
                with_array(value, |items| (format!("{} item(s)", items.len()), items.len() == *len))
            }
            Self::JsonArrayAnyNameContains {
                field,
                text,
            } => with_array(value, |items| {
                let names: Vec<&str> =
                    items.iter().filter_map(|item| item.get(field)?.as_str()).collect();
                let found = names.iter().any(|name| name.contains(text.as_str()));
                (format!("{field}s {names:?}"), found)
            }),
            Self::JsonPointerEquals {
                pointer,
                value: wanted,
            } => match value.pointer(pointer) {
                Some(actual) => (actual.to_string(), json_values_equal(actual, wanted)),
                None => (format!("{pointer} missing"), false),
            },
            Self::JsonHasKeys(keys) => match value.as_object() {
                Some(object) => {
                    let missing: Vec<&str> = keys
                        .iter()
                        .filter(|key| !object.contains_key(*key))
                        .map(String::as_str)
                        .collect();
                    if missing.is_empty() {
                        ("all keys present".to_string(), true)
                    } else {
                        (format!("missing {}", missing.join(", ")), false)
                    }
                }
                None => (json_kind(value).to_string(), false),
            },
            Self::JsonErrorPayload => match serde_json::from_value::<ApiErrorBody>(value.clone()) {
                Ok(body) => match body.summary() {
                    Some(summary) => (summary.to_string(), true),
                    None => ("object without error or message".to_string(), false),
                },
                Err(_) => (json_kind(value).to_string(), false),
            },
            _ => ("not a JSON expectation".to_string(), false),
        }
    }
}

// ============================================================================
// SECTION: Server Failures
// ============================================================================

/// Structured error payload returned by JSON endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
    /// Short error text.
    pub error: Option<String>,
    /// Longer message.
    pub message: Option<String>,
    /// Machine-readable error code.
    pub code: Option<String>,
}

impl ApiErrorBody {
    /// Returns the first non-empty of `error` and `message`.
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        [self.error.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }
}

/// Cause of a server-side failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerFailureKind {
    /// The server reported a structured error code.
    Coded(String),
    /// A database constraint was violated.
    IntegrityViolation,
    /// A template referenced an undefined value.
    TemplateUndefined,
    /// The database rejected the statement (missing column or table).
    DatabaseOperational,
    /// The anti-forgery check rejected the request.
    CsrfRejected,
}

impl fmt::Display for ServerFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coded(code) => write!(f, "code {code}"),
            Self::IntegrityViolation => f.write_str("integrity violation"),
            Self::TemplateUndefined => f.write_str("undefined template value"),
            Self::DatabaseOperational => f.write_str("database operational error"),
            Self::CsrfRejected => f.write_str("csrf rejected"),
        }
    }
}

/// Body markers of legacy failures, checked in order.
const LEGACY_MARKERS: [(&str, ServerFailureKind); 4] = [
    ("IntegrityError", ServerFailureKind::IntegrityViolation),
    ("UndefinedError", ServerFailureKind::TemplateUndefined),
    ("OperationalError", ServerFailureKind::DatabaseOperational),
    ("CSRF", ServerFailureKind::CsrfRejected),
];

/// Classifies why an error response failed.
///
/// Returns `None` for non-error statuses and for bodies that carry neither a
/// structured code nor a known marker.
#[must_use]
pub fn classify_failure(response: &ProbeResponse) -> Option<ServerFailureKind> {
    if response.status < 400 {
        return None;
    }
    if let Ok(body) = serde_json::from_slice::<ApiErrorBody>(&response.body)
        && let Some(code) = body.code.filter(|code| !code.trim().is_empty())
    {
        return Some(ServerFailureKind::Coded(code));
    }
    let text = response.text();
    LEGACY_MARKERS
        .iter()
        .find(|(marker, _)| text.contains(marker))
        .map(|(_, kind)| kind.clone())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Evaluates a redirect expectation.
fn evaluate_redirect(expected: String, response: &ProbeResponse, prefix: &str) -> Evaluation {
    if !response.is_redirect() {
        return Evaluation::new(expected, format!("status {}", response.status), false);
    }
    match response.location_path() {
        Some(path) => {
            let passed = path.starts_with(prefix);
            Evaluation::new(expected, format!("{} to {path}", response.status), passed)
        }
        None => Evaluation::new(expected, format!("{} without Location", response.status), false),
    }
}

/// Runs a check over a JSON array, failing when the value is not one.
fn with_array<F>(value: &Value, check: F) -> (String, bool)
where
    F: FnOnce(&[Value]) -> (String, bool),
{
    match value.as_array() {
        Some(items) => check(items),
        None => (format!("{} instead of array", json_kind(value)), false),
    }
}

/// Compares JSON values, treating numbers by numeric value.
fn json_values_equal(actual: &Value, wanted: &Value) -> bool {
    match (actual, wanted) {
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => (left - right).abs() < f64::EPSILON,
            _ => left == right,
        },
        _ => actual == wanted,
    }
}

/// Names the JSON type of a value.
const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Substring search with case handling.
fn contains(haystack: &str, needle: &str, case: CaseMode) -> bool {
    match case {
        CaseMode::Sensitive => haystack.contains(needle),
        CaseMode::Insensitive => haystack.to_lowercase().contains(&needle.to_lowercase()),
    }
}

/// Formats the presence of something.
const fn presence(found: bool) -> &'static str {
    if found { "present" } else { "absent" }
}

/// Suffix describing case handling.
const fn case_suffix(case: CaseMode) -> &'static str {
    match case {
        CaseMode::Sensitive => "",
        CaseMode::Insensitive => " (case-insensitive)",
    }
}
