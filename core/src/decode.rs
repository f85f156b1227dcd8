//! Strict JSON decoding for response records.
//!
//! # Design
//! `serde` stops at the first bad field. Response records here are decoded
//! through an `ObjectReader` instead, which records every missing or
//! mistyped field it meets and keeps going, so one `DecodeError` lists all
//! `(path, reason)` pairs found in the body.
//!
//! A `Decode` impl reads each field into a local first and only then
//! assembles the record with `?`, so a failure in one field never hides a
//! failure in a later one. Absent and `null` optional fields both decode to
//! `None`.

use std::fmt;

use serde_json::{Map, Value};

use crate::scalar::{json_kind, FromJson};

/// Why a single field failed to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MismatchReason {
    /// A required field was absent or `null`.
    Missing,

    /// The field held a JSON value of the wrong kind.
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    /// A discriminator string matched no known variant.
    UnrecognizedVariant(String),

    /// Right kind, unacceptable content.
    Invalid(String),

    /// The field is present but forbidden in this position.
    NotAllowed(String),
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::Missing => write!(f, "missing required field"),
            MismatchReason::WrongType { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            MismatchReason::UnrecognizedVariant(tag) => write!(f, "unrecognized variant `{tag}`"),
            MismatchReason::Invalid(msg) => write!(f, "invalid value: {msg}"),
            MismatchReason::NotAllowed(msg) => write!(f, "not allowed: {msg}"),
        }
    }
}

/// One failed field, addressed by its dotted path from the document root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMismatch {
    pub path: String,
    pub reason: MismatchReason,
}

impl FieldMismatch {
    pub fn new(path: impl Into<String>, reason: MismatchReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

impl fmt::Display for FieldMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// A body that could not be turned into the expected record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("body is not valid JSON: {0}")]
    Syntax(String),

    #[error("{} field(s) failed to decode: {}", .0.len(), join_mismatches(.0))]
    Fields(Vec<FieldMismatch>),
}

fn join_mismatches(mismatches: &[FieldMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl DecodeError {
    pub fn mismatches(&self) -> &[FieldMismatch] {
        match self {
            DecodeError::Syntax(_) => &[],
            DecodeError::Fields(mismatches) => mismatches,
        }
    }

    /// The first discriminator tag that matched no variant, if that is among
    /// the reasons this decode failed.
    pub fn unrecognized_variant(&self) -> Option<&str> {
        self.mismatches().iter().find_map(|m| match &m.reason {
            MismatchReason::UnrecognizedVariant(tag) => Some(tag.as_str()),
            _ => None,
        })
    }
}

/// A record that can be read from a JSON object.
pub trait Decode: Sized {
    /// Read the record's fields from `reader`. Returns `None` only after
    /// recording at least one mismatch.
    fn decode(reader: &mut ObjectReader<'_, '_>) -> Option<Self>;
}

/// Decode a record from raw response bytes.
pub fn from_slice<T: Decode>(bytes: &[u8]) -> Result<T, DecodeError> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::Syntax(e.to_string()))?;
    from_value(&value)
}

/// Decode a record from an already-parsed JSON document.
pub fn from_value<T: Decode>(value: &Value) -> Result<T, DecodeError> {
    let mut mismatches = Vec::new();
    let decoded = match value.as_object() {
        Some(object) => T::decode(&mut ObjectReader::new(object, &mut mismatches)),
        None => {
            mismatches.push(FieldMismatch::new(
                "$",
                MismatchReason::WrongType {
                    expected: "object",
                    found: json_kind(value),
                },
            ));
            None
        }
    };
    match decoded {
        Some(record) if mismatches.is_empty() => Ok(record),
        _ => Err(DecodeError::Fields(mismatches)),
    }
}

/// Cursor over one JSON object that accumulates field mismatches.
pub struct ObjectReader<'v, 'm> {
    object: &'v Map<String, Value>,
    path: String,
    mismatches: &'m mut Vec<FieldMismatch>,
}

impl<'v, 'm> ObjectReader<'v, 'm> {
    pub fn new(object: &'v Map<String, Value>, mismatches: &'m mut Vec<FieldMismatch>) -> Self {
        Self {
            object,
            path: String::new(),
            mismatches,
        }
    }

    /// Dotted path of this object from the document root; empty at the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn field_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}.{name}", self.path)
        }
    }

    fn present(&self, name: &str) -> Option<&'v Value> {
        self.object.get(name).filter(|v| !v.is_null())
    }

    /// Whether `name` holds a non-null value.
    pub fn has(&self, name: &str) -> bool {
        self.present(name).is_some()
    }

    /// Record a mismatch against the field `name` of this object.
    pub fn mismatch(&mut self, name: &str, reason: MismatchReason) {
        let path = self.field_path(name);
        self.mismatches.push(FieldMismatch::new(path, reason));
    }

    pub fn required<T: FromJson>(&mut self, name: &str) -> Option<T> {
        match self.present(name) {
            Some(value) => self.convert(name, value),
            None => {
                self.mismatch(name, MismatchReason::Missing);
                None
            }
        }
    }

    pub fn optional<T: FromJson>(&mut self, name: &str) -> Option<T> {
        let value = self.present(name)?;
        self.convert(name, value)
    }

    fn convert<T: FromJson>(&mut self, name: &str, value: &Value) -> Option<T> {
        match T::from_json(value) {
            Ok(v) => Some(v),
            Err(reason) => {
                self.mismatch(name, reason);
                None
            }
        }
    }

    /// Decode a required nested object.
    pub fn nested<T: Decode>(&mut self, name: &str) -> Option<T> {
        match self.present(name) {
            Some(value) => self.descend(name, value),
            None => {
                self.mismatch(name, MismatchReason::Missing);
                None
            }
        }
    }

    pub fn optional_nested<T: Decode>(&mut self, name: &str) -> Option<T> {
        let value = self.present(name)?;
        self.descend(name, value)
    }

    fn descend<T: Decode>(&mut self, name: &str, value: &'v Value) -> Option<T> {
        let Some(object) = value.as_object() else {
            self.mismatch(
                name,
                MismatchReason::WrongType {
                    expected: "object",
                    found: json_kind(value),
                },
            );
            return None;
        };
        let before = self.mismatches.len();
        let mut child = ObjectReader {
            object,
            path: self.field_path(name),
            mismatches: &mut *self.mismatches,
        };
        let decoded = T::decode(&mut child);
        if self.mismatches.len() > before {
            None
        } else {
            decoded
        }
    }

    /// Record `NotAllowed` if `name` carries a value.
    pub fn reject(&mut self, name: &str, why: impl Into<String>) {
        if self.has(name) {
            self.mismatch(name, MismatchReason::NotAllowed(why.into()));
        }
    }

    /// Check the `object` marker when the body carries one.
    pub fn object_kind(&mut self, expected: &str) {
        if let Some(value) = self.present("object") {
            match value.as_str() {
                Some(kind) if kind == expected => {}
                _ => self.mismatch(
                    "object",
                    MismatchReason::Invalid(format!("expected object kind `{expected}`")),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Inner {
        n: u32,
    }

    impl Decode for Inner {
        fn decode(r: &mut ObjectReader<'_, '_>) -> Option<Self> {
            let n = r.required("n");
            Some(Inner { n: n? })
        }
    }

    #[derive(Debug, PartialEq)]
    struct Outer {
        name: String,
        flag: bool,
        note: Option<String>,
        inner: Inner,
    }

    impl Decode for Outer {
        fn decode(r: &mut ObjectReader<'_, '_>) -> Option<Self> {
            let name = r.required("name");
            let flag = r.required("flag");
            let note = r.optional("note");
            let inner = r.nested("inner");
            Some(Outer {
                name: name?,
                flag: flag?,
                note,
                inner: inner?,
            })
        }
    }

    #[test]
    fn decodes_valid_record() {
        let outer: Outer =
            from_slice(br#"{"name":"a","flag":true,"inner":{"n":7},"extra":1}"#).unwrap();
        assert_eq!(
            outer,
            Outer {
                name: "a".to_string(),
                flag: true,
                note: None,
                inner: Inner { n: 7 },
            }
        );
    }

    #[test]
    fn null_optional_is_absent() {
        let outer: Outer =
            from_slice(br#"{"name":"a","flag":false,"note":null,"inner":{"n":1}}"#).unwrap();
        assert!(outer.note.is_none());
    }

    #[test]
    fn collects_every_mismatch_in_one_pass() {
        let err = from_slice::<Outer>(br#"{"flag":"yes","note":5,"inner":{"n":"x"}}"#).unwrap_err();
        assert_eq!(
            err.mismatches(),
            &[
                FieldMismatch::new("name", MismatchReason::Missing),
                FieldMismatch::new(
                    "flag",
                    MismatchReason::WrongType {
                        expected: "boolean",
                        found: "string"
                    }
                ),
                FieldMismatch::new(
                    "note",
                    MismatchReason::WrongType {
                        expected: "string",
                        found: "number"
                    }
                ),
                FieldMismatch::new(
                    "inner.n",
                    MismatchReason::WrongType {
                        expected: "unsigned integer",
                        found: "string"
                    }
                ),
            ]
        );
    }

    #[test]
    fn non_object_root_is_reported_at_root() {
        let err = from_slice::<Outer>(b"[1,2]").unwrap_err();
        assert_eq!(err.mismatches()[0].path, "$");
    }

    #[test]
    fn invalid_json_is_a_syntax_error() {
        let err = from_slice::<Outer>(b"<html>").unwrap_err();
        assert!(matches!(err, DecodeError::Syntax(_)));
        assert!(err.mismatches().is_empty());
    }

    #[test]
    fn display_lists_paths() {
        let err = from_slice::<Outer>(br#"{"flag":true,"inner":{}}"#).unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("2 field(s) failed to decode"));
        assert!(text.contains("name: missing required field"));
        assert!(text.contains("inner.n: missing required field"));
    }
}
