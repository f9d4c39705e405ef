//! SQL-legal identifiers for arbitrary entity names.
//!
//! Model names in a project may contain spaces or punctuation. Every
//! component that emits an identifier derived from an entity name goes
//! through a [`NameSanitizer`] so the same name always maps to the same
//! identifier within a compile pass.

use std::sync::LazyLock;

use dashmap::DashMap;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Names that can be used as identifiers without change.
static LEGAL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Length of the hash part of a sanitized name.
pub const HASH_LENGTH: usize = 7;

/// Maximum number of characters kept from the original name.
pub const PREFIX_LENGTH: usize = 10;

/// Prefix used when a name has no alphanumeric characters.
pub const FALLBACK_PREFIX: &str = "model";

/// Default suffix for per-model CTE aliases.
pub const CTE_SUFFIX: &str = "_cte";

/// Stable lowercase base-26 hash of `input`.
///
/// The first eight bytes of the SHA-256 digest are read as a big-endian
/// integer and written out as `length` letters, least significant first.
pub fn alpha_hash(input: &str, length: usize) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let mut n = u64::from_be_bytes(bytes);

    let mut out = String::with_capacity(length);
    for _ in 0..length {
        out.push((b'a' + (n % 26) as u8) as char);
        n /= 26;
    }
    out
}

/// Is `name` already a legal unquoted identifier?
pub fn is_legal_identifier(name: &str) -> bool {
    LEGAL_IDENTIFIER.is_match(name)
}

fn compute_sanitized(name: &str) -> String {
    if is_legal_identifier(name) {
        return name.to_string();
    }

    let prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(PREFIX_LENGTH)
        .collect();
    let prefix = match prefix.chars().next() {
        None => FALLBACK_PREFIX.to_string(),
        Some(c) if c.is_ascii_digit() => format!("{}_{}", FALLBACK_PREFIX, prefix),
        Some(_) => prefix,
    };

    format!("{}_{}", prefix, alpha_hash(name, HASH_LENGTH))
}

/// Memoizing name sanitizer.
///
/// Instances are owned by a compile pass and shared by reference. The cache
/// is a concurrent map, so one sanitizer may also be shared across threads.
#[derive(Debug, Default)]
pub struct NameSanitizer {
    cache: DashMap<String, String>,
}

impl NameSanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `name` to a SQL-legal identifier.
    ///
    /// Legal identifiers pass through unchanged; anything else becomes
    /// `{prefix}_{hash}` where the prefix is the first alphanumeric
    /// characters of the name (or `model`).
    pub fn sanitize(&self, name: &str) -> String {
        if let Some(hit) = self.cache.get(name) {
            return hit.value().clone();
        }
        let sanitized = compute_sanitized(name);
        self.cache.insert(name.to_string(), sanitized.clone());
        sanitized
    }

    /// `sanitize(name) + suffix`.
    pub fn get_alias(&self, name: &str, suffix: &str) -> String {
        format!("{}{}", self.sanitize(name), suffix)
    }

    /// Alias of the CTE that holds a model's rows.
    pub fn cte_alias(&self, name: &str) -> String {
        self.get_alias(name, CTE_SUFFIX)
    }

    /// Number of cached names.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_names_pass_through() {
        let s = NameSanitizer::new();
        assert_eq!(s.sanitize("orders"), "orders");
        assert_eq!(s.sanitize("Orders_2024"), "Orders_2024");
    }

    #[test]
    fn test_illegal_names_are_hashed() {
        let s = NameSanitizer::new();
        let out = s.sanitize("my orders (v2)");
        assert!(out.starts_with("myordersv2_"), "{out}");
        assert_eq!(out.len(), "myordersv2_".len() + HASH_LENGTH);
        assert!(is_legal_identifier(&out));
    }

    #[test]
    fn test_prefix_is_truncated() {
        let s = NameSanitizer::new();
        let out = s.sanitize("a very long model name");
        assert!(out.starts_with("averylongm_"), "{out}");
    }

    #[test]
    fn test_fallback_prefix() {
        let s = NameSanitizer::new();
        assert!(s.sanitize("!!!").starts_with("model_"));
        let digits = s.sanitize("2024 sales");
        assert!(digits.starts_with("model_2024sales_"), "{digits}");
        assert!(is_legal_identifier(&digits));
    }

    #[test]
    fn test_idempotent_and_stable() {
        let s = NameSanitizer::new();
        for name in ["orders", "my-model", "weird name!", "", "123"] {
            let first = s.sanitize(name);
            assert_eq!(s.sanitize(&first), first);
            assert_eq!(s.sanitize(name), first);
        }
    }

    #[test]
    fn test_distinct_names_do_not_collide() {
        let s = NameSanitizer::new();
        assert_ne!(s.sanitize("my model"), s.sanitize("my-model"));
    }

    #[test]
    fn test_alias() {
        let s = NameSanitizer::new();
        assert_eq!(s.get_alias("orders", "_cte"), "orders_cte");
        assert_eq!(s.cte_alias("orders"), "orders_cte");
    }

    #[test]
    fn test_alpha_hash_shape() {
        let h = alpha_hash("orders", 7);
        assert_eq!(h.len(), 7);
        assert!(h.chars().all(|c| c.is_ascii_lowercase()));
        assert_eq!(h, alpha_hash("orders", 7));
    }
}
