//! Reference tokens: `${ref(entity)[.property_path]}`.
//!
//! Every expression, relation condition and filter in a project may embed
//! reference tokens. This module is the only place that knows the token
//! grammar; everything else goes through [`tokenize`] and [`replace_refs`].
//!
//! Grammar accepted:
//!
//! ```text
//! ${ ref( name ) }                 name may contain spaces and hyphens
//! ${ref('quoted name').field}      single or double quotes are stripped
//! ${ref(model).field.nested}       property path kept verbatim
//! ${ref(model)[0].field}           bracket segments kept verbatim
//! ```
//!
//! The property path is reported without its leading dot, so
//! `${ref(orders).user_id}` yields `("orders", Some("user_id"))`.

use std::collections::BTreeSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::error::{SemanticError, SemanticResult};

/// A complete reference token.
static REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\$\{\s*ref\(\s*(?:'([^']*)'|"([^"]*)"|([^)'"]*?))\s*\)((?:\.[^.\[\]\s}]+|\[[^\]]*\])*)\s*\}"#,
    )
    .expect("reference pattern is valid")
});

/// Any `${...}` block, well-formed or not.
static BLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").expect("block pattern is valid"));

/// A single reference occurrence within a larger string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefToken {
    /// Referenced entity, unquoted and trimmed.
    pub entity: String,
    /// Property path without its leading dot (`field.nested`, `[0].field`).
    pub property_path: Option<String>,
    /// Byte range of the whole token in the source text.
    pub span: Range<usize>,
}

impl RefToken {
    /// The referenced field when the path is a single plain segment.
    pub fn field(&self) -> Option<&str> {
        simple_field(self.property_path.as_deref())
    }
}

/// Return the path as a field name if it is one plain segment.
pub fn simple_field(property_path: Option<&str>) -> Option<&str> {
    property_path.filter(|p| !p.is_empty() && !p.contains(['.', '[', ']']))
}

fn token_from_captures(caps: &Captures<'_>) -> RefToken {
    let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    let entity = caps
        .get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let property_path = caps
        .get(4)
        .map(|m| m.as_str())
        .filter(|p| !p.is_empty())
        .map(|p| p.strip_prefix('.').unwrap_or(p).to_string());

    RefToken {
        entity,
        property_path,
        span: whole,
    }
}

/// Find every reference token in `text`, in order of appearance.
pub fn tokenize(text: &str) -> Vec<RefToken> {
    REF_PATTERN
        .captures_iter(text)
        .map(|caps| token_from_captures(&caps))
        .collect()
}

/// `(entity_name, property_path)` for every occurrence.
pub fn extract_components(text: &str) -> Vec<(String, Option<String>)> {
    tokenize(text)
        .into_iter()
        .map(|t| (t.entity, t.property_path))
        .collect()
}

/// Substitute every reference token in one pass.
///
/// Text between tokens is copied untouched, including whitespace next to
/// the `${ }` delimiters.
pub fn replace_refs<F>(text: &str, mut replacer: F) -> String
where
    F: FnMut(&str, Option<&str>) -> String,
{
    REF_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let token = token_from_captures(caps);
            replacer(&token.entity, token.property_path.as_deref())
        })
        .into_owned()
}

/// Substitute the tokens `replacer` knows, keeping the others as written.
pub fn replace_known<F>(text: &str, mut replacer: F) -> String
where
    F: FnMut(&str, Option<&str>) -> Option<String>,
{
    REF_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let token = token_from_captures(caps);
            replacer(&token.entity, token.property_path.as_deref())
                .unwrap_or_else(|| text[token.span].to_string())
        })
        .into_owned()
}

/// Fallible variant of [`replace_known`]; stops at the first error.
pub fn try_replace_refs<F, E>(text: &str, mut replacer: F) -> Result<String, E>
where
    F: FnMut(&str, Option<&str>) -> Result<Option<String>, E>,
{
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for token in tokenize(text) {
        out.push_str(&text[last..token.span.start]);
        match replacer(&token.entity, token.property_path.as_deref())? {
            Some(sql) => out.push_str(&sql),
            None => out.push_str(&text[token.span.clone()]),
        }
        last = token.span.end;
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Unique entity names referenced in `text`.
pub fn extract_entity_names(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().map(|t| t.entity).collect()
}

/// Does `text` contain at least one reference token?
pub fn has_pattern(text: &str) -> bool {
    REF_PATTERN.is_match(text)
}

/// Number of distinct entities referenced.
pub fn count_unique_entities(text: &str) -> usize {
    extract_entity_names(text).len()
}

/// Check every `${...}` block in `text` is a well-formed reference.
pub fn validate_syntax(text: &str) -> SemanticResult<()> {
    for block in BLOCK_PATTERN.find_iter(text) {
        let fragment = block.as_str();
        if !fragment.contains("ref(") {
            return Err(SemanticError::ReferenceSyntax {
                fragment: fragment.into(),
                message: "expected ${ref(name)} or ${ref(name).field}".into(),
            });
        }
        match REF_PATTERN.captures(fragment) {
            Some(caps) if caps.get(0).map(|m| m.range()) == Some(0..fragment.len()) => {
                if token_from_captures(&caps).entity.is_empty() {
                    return Err(SemanticError::ReferenceSyntax {
                        fragment: fragment.into(),
                        message: "ref() requires a name".into(),
                    });
                }
            }
            _ => {
                return Err(SemanticError::ReferenceSyntax {
                    fragment: fragment.into(),
                    message: "malformed ref() expression".into(),
                });
            }
        }
    }
    Ok(())
}
