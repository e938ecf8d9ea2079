//! The untrusted launch payload presented by a client.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::ClaimError;

/// Field carrying the asserted signature. Never part of the signed content.
pub const HASH_FIELD: &str = "hash";
/// Field carrying the Unix issue timestamp.
pub const AUTH_DATE_FIELD: &str = "auth_date";
/// The one field whose value may be a nested record.
pub const USER_FIELD: &str = "user";

/// A leaf value inside a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    /// `null` or missing.
    Absent,
    /// Any textual or numeric value, kept as text.
    Text(String),
    /// A Boolean; serialized as `1`/`0`.
    Flag(bool),
}

impl Scalar {
    /// Shorthand for a text scalar.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Flag(*b),
            Value::String(s) => Self::Text(s.clone()),
            Value::Number(n) => Self::Text(n.to_string()),
            // deeper nesting is carried verbatim as compact JSON
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

/// A top-level claim value: either a scalar or a one-level record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// A plain value.
    Scalar(Scalar),
    /// A sub-record whose keys are promoted during canonicalization.
    Record(BTreeMap<String, Scalar>),
}

impl FieldValue {
    /// Shorthand for a text field.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::text(value))
    }

    /// Shorthand for a Boolean field.
    #[must_use]
    pub fn flag(value: bool) -> Self {
        Self::Scalar(Scalar::Flag(value))
    }

    /// Build a record from `(key, scalar)` pairs.
    #[must_use]
    pub fn record<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Scalar)>,
    {
        Self::Record(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// An unordered map of claim fields.
///
/// Backed by a sorted map, so insertion order never leaks into anything
/// derived from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimFields(BTreeMap<String, FieldValue>);

impl ClaimFields {
    /// Create an empty field map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) -> Option<FieldValue> {
        self.0.insert(key.into(), value)
    }

    /// Remove a field, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.remove(key)
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Iterate fields in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for ClaimFields {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<'a> IntoIterator for &'a ClaimFields {
    type Item = (&'a String, &'a FieldValue);
    type IntoIter = btree_map::Iter<'a, String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// An untrusted claim, constructed fresh per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalClaim {
    fields: ClaimFields,
    asserted_signature: Option<String>,
    issued_at: Option<i64>,
}

impl ExternalClaim {
    /// Split a raw field map into signed content, asserted signature and
    /// issue time.
    ///
    /// `hash` is removed from the signed content. `auth_date` stays in it;
    /// an unparseable `auth_date` leaves `issued_at` unset.
    #[must_use]
    pub fn new(mut fields: ClaimFields) -> Self {
        let asserted_signature = match fields.remove(HASH_FIELD) {
            Some(FieldValue::Scalar(Scalar::Text(hash))) if !hash.trim().is_empty() => {
                Some(hash.trim().to_owned())
            }
            _ => None,
        };
        let issued_at = match fields.get(AUTH_DATE_FIELD) {
            Some(FieldValue::Scalar(Scalar::Text(raw))) => raw.trim().parse::<i64>().ok(),
            _ => None,
        };
        Self {
            fields,
            asserted_signature,
            issued_at,
        }
    }

    /// Decode a JSON object body.
    ///
    /// A `user` value given as a JSON-encoded string is decoded into a
    /// record, matching the launch payload format.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Malformed`] if `body` is not an object or
    /// `user` is neither an object nor a JSON-encoded object.
    pub fn from_json(body: &Value) -> Result<Self, ClaimError> {
        let map = body
            .as_object()
            .ok_or_else(|| ClaimError::Malformed("claim must be a JSON object".to_owned()))?;
        Ok(Self::new(fields_from_json(map)?))
    }

    /// Decode the raw URL-encoded launch string
    /// (`auth_date=…&user=%7B…%7D&hash=…`).
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Malformed`] if a component is not valid
    /// percent-encoded UTF-8 or `user` is not a JSON-encoded object.
    pub fn from_init_data(raw: &str) -> Result<Self, ClaimError> {
        let mut fields = ClaimFields::new();
        for pair in raw.trim().split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = form_decode(key)?;
            let value = form_decode(value)?;
            let field = if key == USER_FIELD {
                decode_record(&value)?
            } else {
                FieldValue::text(value)
            };
            fields.insert(key, field);
        }
        Ok(Self::new(fields))
    }

    /// The signed content (everything except `hash`).
    #[must_use]
    pub fn fields(&self) -> &ClaimFields {
        &self.fields
    }

    /// The hex signature the client asserts, if present.
    #[must_use]
    pub fn asserted_signature(&self) -> Option<&str> {
        self.asserted_signature.as_deref()
    }

    /// The parsed `auth_date`, if present and numeric.
    #[must_use]
    pub fn issued_at(&self) -> Option<i64> {
        self.issued_at
    }
}

fn fields_from_json(map: &Map<String, Value>) -> Result<ClaimFields, ClaimError> {
    let mut fields = ClaimFields::new();
    for (key, value) in map {
        let field = match value {
            Value::Object(inner) => record_from_json(inner),
            Value::String(s) if key == USER_FIELD => decode_record(s)?,
            other => FieldValue::Scalar(Scalar::from_json(other)),
        };
        fields.insert(key.clone(), field);
    }
    Ok(fields)
}

fn record_from_json(inner: &Map<String, Value>) -> FieldValue {
    FieldValue::Record(
        inner
            .iter()
            .map(|(k, v)| (k.clone(), Scalar::from_json(v)))
            .collect(),
    )
}

fn decode_record(raw: &str) -> Result<FieldValue, ClaimError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(inner)) => Ok(record_from_json(&inner)),
        _ => Err(ClaimError::Malformed(format!(
            "`{USER_FIELD}` must be a JSON object"
        ))),
    }
}

fn form_decode(component: &str) -> Result<String, ClaimError> {
    urlencoding::decode(&component.replace('+', " "))
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| ClaimError::Malformed("invalid percent-encoding".to_owned()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn hash_is_split_from_signed_content() {
        let claim = ExternalClaim::from_json(&json!({
            "auth_date": "1700000000",
            "hash": "ABCDEF",
        }))
        .unwrap();
        assert_eq!(claim.asserted_signature(), Some("ABCDEF"));
        assert_eq!(claim.issued_at(), Some(1_700_000_000));
        assert!(claim.fields().get(HASH_FIELD).is_none());
        assert!(claim.fields().get(AUTH_DATE_FIELD).is_some());
    }

    #[test]
    fn numeric_auth_date_is_accepted() {
        let claim = ExternalClaim::from_json(&json!({ "auth_date": 1_700_000_000_i64 })).unwrap();
        assert_eq!(claim.issued_at(), Some(1_700_000_000));
    }

    #[test]
    fn unparseable_auth_date_leaves_issued_at_unset() {
        let claim = ExternalClaim::from_json(&json!({ "auth_date": "yesterday" })).unwrap();
        assert_eq!(claim.issued_at(), None);
    }

    #[test]
    fn user_string_is_decoded_into_record() {
        let claim = ExternalClaim::from_json(&json!({
            "user": r#"{"id":42,"username":"alice","is_premium":true}"#,
        }))
        .unwrap();
        let Some(FieldValue::Record(user)) = claim.fields().get(USER_FIELD) else {
            panic!("user should be a record");
        };
        assert_eq!(user.get("id"), Some(&Scalar::text("42")));
        assert_eq!(user.get("is_premium"), Some(&Scalar::Flag(true)));
    }

    #[test]
    fn user_string_that_is_not_an_object_is_malformed() {
        let err = ExternalClaim::from_json(&json!({ "user": "alice" })).unwrap_err();
        assert!(matches!(err, ClaimError::Malformed(_)));
    }

    #[test]
    fn non_object_body_is_malformed() {
        assert!(ExternalClaim::from_json(&json!(["auth_date"])).is_err());
    }

    #[test]
    fn init_data_is_percent_decoded() {
        let raw = "query_id=AAH&user=%7B%22id%22%3A42%2C%22first_name%22%3A%22Al+Ice%22%7D\
                   &auth_date=1700000000&hash=deadbeef";
        let claim = ExternalClaim::from_init_data(raw).unwrap();
        assert_eq!(claim.asserted_signature(), Some("deadbeef"));
        assert_eq!(claim.issued_at(), Some(1_700_000_000));
        let Some(FieldValue::Record(user)) = claim.fields().get(USER_FIELD) else {
            panic!("user should be a record");
        };
        assert_eq!(user.get("first_name"), Some(&Scalar::text("Al Ice")));
    }

    #[test]
    fn blank_hash_counts_as_absent() {
        let claim = ExternalClaim::from_json(&json!({ "hash": "  " })).unwrap();
        assert_eq!(claim.asserted_signature(), None);
    }
}
