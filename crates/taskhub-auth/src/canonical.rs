//! Deterministic serialization of claim fields into the signed message.
//!
//! Rules, applied in order:
//!
//! 1. Remove `hash` and transport-only launch parameters.
//! 2. Flatten the one-level record: inner keys are promoted without a
//!    prefix. On collision the inner key wins; records are applied in key
//!    order, so collisions between records resolve to the last record.
//! 3. Drop absent and empty values.
//! 4. (Optional) keep only allow-listed keys.
//! 5. Booleans become `1`/`0`.
//! 6. Text becomes NFKC.
//! 7. Sort by key bytes and join `key=value` lines with `\n`, no trailing
//!    newline.

use std::collections::{BTreeMap, BTreeSet};

use unicode_normalization::UnicodeNormalization;

use crate::claim::{ClaimFields, FieldValue, Scalar, HASH_FIELD};

/// Prefix of client-side launch parameters that are never signed.
pub const TRANSPORT_PREFIX: &str = "tgWebApp";

/// The canonical message a claim signature is computed over.
///
/// Has no `Display` impl; never formatted into responses or logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalString(String);

impl CanonicalString {
    /// Wrap text that is already in canonical form.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Borrow the canonical text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Borrow the canonical bytes, as fed to the keyed hash.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// Canonicalization policy.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    excluded: BTreeSet<String>,
    excluded_prefixes: Vec<String>,
    allow_list: Option<BTreeSet<String>>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self {
            excluded: BTreeSet::from([HASH_FIELD.to_owned()]),
            excluded_prefixes: vec![TRANSPORT_PREFIX.to_owned()],
            allow_list: None,
        }
    }
}

impl Canonicalizer {
    /// Also exclude `key` from the signed content.
    #[must_use]
    pub fn exclude(mut self, key: impl Into<String>) -> Self {
        self.excluded.insert(key.into());
        self
    }

    /// Keep only the given keys after empty values are dropped.
    #[must_use]
    pub fn with_allow_list<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.allow_list = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.excluded.contains(key)
            || self
                .excluded_prefixes
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Apply every rule except the final join, yielding the flattened
    /// key/value pairs in byte order.
    #[must_use]
    pub fn normalize(&self, fields: &ClaimFields) -> BTreeMap<String, String> {
        let mut scalars: BTreeMap<&str, &Scalar> = BTreeMap::new();
        let mut records = Vec::new();
        for (key, value) in fields.iter().filter(|(k, _)| !self.is_excluded(k)) {
            match value {
                FieldValue::Scalar(scalar) => {
                    scalars.insert(key.as_str(), scalar);
                }
                FieldValue::Record(inner) => records.push(inner),
            }
        }
        for inner in records {
            for (key, scalar) in inner {
                scalars.insert(key.as_str(), scalar);
            }
        }

        let mut normalized = BTreeMap::new();
        for (key, scalar) in scalars {
            let value = match scalar {
                Scalar::Absent => continue,
                Scalar::Text(text) if text.is_empty() => continue,
                _ if !self.allows(key) => continue,
                Scalar::Flag(flag) => String::from(if *flag { "1" } else { "0" }),
                Scalar::Text(text) => text.nfkc().collect(),
            };
            normalized.insert(key.to_owned(), value);
        }
        normalized
    }

    fn allows(&self, key: &str) -> bool {
        match &self.allow_list {
            Some(allowed) => allowed.contains(key),
            None => true,
        }
    }

    /// Produce the canonical string for `fields`.
    #[must_use]
    pub fn canonicalize(&self, fields: &ClaimFields) -> CanonicalString {
        join(&self.normalize(fields))
    }
}

/// Join already-normalized pairs into the canonical string.
#[must_use]
pub fn join(normalized: &BTreeMap<String, String>) -> CanonicalString {
    let lines: Vec<String> = normalized
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    CanonicalString(lines.join("\n"))
}

/// Canonicalize with the default policy.
#[must_use]
pub fn canonicalize(fields: &ClaimFields) -> CanonicalString {
    Canonicalizer::default().canonicalize(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Vec<(&'static str, FieldValue)> {
        vec![
            ("auth_date", FieldValue::text("1700000000")),
            ("query_id", FieldValue::text("AAHdF6IQ")),
            (
                "user",
                FieldValue::record([
                    ("id", Scalar::text("42")),
                    ("username", Scalar::text("alice")),
                    ("is_premium", Scalar::Flag(true)),
                ]),
            ),
            ("hash", FieldValue::text("ignored")),
        ]
    }

    #[test]
    fn joins_sorted_pairs_without_trailing_newline() {
        let fields: ClaimFields = alice().into_iter().collect();
        assert_eq!(
            canonicalize(&fields).as_str(),
            "auth_date=1700000000\nid=42\nis_premium=1\nquery_id=AAHdF6IQ\nusername=alice"
        );
    }

    #[test]
    fn output_is_independent_of_insertion_order() {
        let forward: ClaimFields = alice().into_iter().collect();
        let backward: ClaimFields = alice().into_iter().rev().collect();
        let mut rotated_src = alice();
        rotated_src.rotate_left(2);
        let rotated: ClaimFields = rotated_src.into_iter().collect();
        assert_eq!(canonicalize(&forward), canonicalize(&backward));
        assert_eq!(canonicalize(&forward), canonicalize(&rotated));
    }

    #[test]
    fn inner_key_wins_collision() {
        let fields: ClaimFields = [
            ("id", FieldValue::text("1")),
            ("user", FieldValue::record([("id", Scalar::text("42"))])),
        ]
        .into_iter()
        .collect();
        assert_eq!(canonicalize(&fields).as_str(), "id=42");
    }

    #[test]
    fn empty_inner_value_shadows_then_drops_outer() {
        let fields: ClaimFields = [
            ("username", FieldValue::text("outer")),
            ("user", FieldValue::record([("username", Scalar::text(""))])),
        ]
        .into_iter()
        .collect();
        assert_eq!(canonicalize(&fields).as_str(), "");
    }

    #[test]
    fn drops_absent_and_empty_values() {
        let fields: ClaimFields = [
            ("a", FieldValue::text("")),
            ("b", FieldValue::Scalar(Scalar::Absent)),
            ("c", FieldValue::text("x")),
            ("user", FieldValue::record([("d", Scalar::Absent)])),
        ]
        .into_iter()
        .collect();
        assert_eq!(canonicalize(&fields).as_str(), "c=x");
    }

    #[test]
    fn booleans_become_digits() {
        let fields: ClaimFields = [("on", FieldValue::flag(true)), ("off", FieldValue::flag(false))]
            .into_iter()
            .collect();
        assert_eq!(canonicalize(&fields).as_str(), "off=0\non=1");
    }

    #[test]
    fn text_is_nfkc_normalized() {
        // U+FB01 LATIN SMALL LIGATURE FI and a full-width digit
        let fields: ClaimFields = [("name", FieldValue::text("\u{FB01}\u{FF11}"))]
            .into_iter()
            .collect();
        assert_eq!(canonicalize(&fields).as_str(), "name=fi1");
    }

    #[test]
    fn transport_parameters_are_excluded() {
        let fields: ClaimFields = [
            ("tgWebAppVersion", FieldValue::text("7.0")),
            ("tgWebAppPlatform", FieldValue::text("ios")),
            ("auth_date", FieldValue::text("1")),
        ]
        .into_iter()
        .collect();
        assert_eq!(canonicalize(&fields).as_str(), "auth_date=1");
    }

    #[test]
    fn keys_sort_by_byte_value() {
        let fields: ClaimFields = [
            ("b", FieldValue::text("2")),
            ("B", FieldValue::text("1")),
            ("_", FieldValue::text("3")),
        ]
        .into_iter()
        .collect();
        assert_eq!(canonicalize(&fields).as_str(), "B=1\n_=3\nb=2");
    }

    #[test]
    fn allow_list_filters_after_flattening() {
        let fields: ClaimFields = alice().into_iter().collect();
        let canonical = Canonicalizer::default()
            .with_allow_list(["auth_date", "id"])
            .canonicalize(&fields);
        assert_eq!(canonical.as_str(), "auth_date=1700000000\nid=42");
    }

    #[test]
    fn extra_exclusions_are_honoured() {
        let fields: ClaimFields = alice().into_iter().collect();
        let canonical = Canonicalizer::default().exclude("query_id").canonicalize(&fields);
        assert!(!canonical.as_str().contains("query_id"));
    }
}
