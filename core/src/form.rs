//! Flat form parameters for `application/x-www-form-urlencoded` bodies.
//!
//! # Design
//! Payload encoders describe their fields as `name -> Option<value>` and hand
//! them to `flatten`, which drops the absent entries. Nothing is ever emitted
//! as an empty string or `null`. Nested payloads are then re-keyed with
//! `namespace` into the `prefix[field]` form the API reads.
//!
//! `PostParams` is ordered so a given payload always encodes to the same body.

use std::collections::{BTreeMap, BTreeSet};

use crate::decode::{DecodeError, FieldMismatch, MismatchReason};
use crate::scalar::{FromWire, ToWire};

/// Flat string-to-string form parameters.
pub type PostParams = BTreeMap<String, String>;

/// Keep only the fields whose value is present.
pub fn flatten<K, I>(fields: I) -> PostParams
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Option<String>)>,
{
    fields
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name.into(), v)))
        .collect()
}

/// Re-key every entry of `params` as `prefix[key]`.
pub fn namespace(prefix: &str, params: PostParams) -> PostParams {
    params
        .into_iter()
        .map(|(key, value)| (format!("{prefix}[{key}]"), value))
        .collect()
}

/// Split `prefix[field]` into its two parts. Plain keys return `None`.
pub fn split_namespace(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let inner = key[open + 1..].strip_suffix(']')?;
    if open == 0 || inner.is_empty() || inner.contains(['[', ']']) {
        return None;
    }
    Some((&key[..open], inner))
}

pub fn encode_form(params: &PostParams) -> Result<String, serde_urlencoded::ser::Error> {
    serde_urlencoded::to_string(params)
}

pub fn decode_form(body: &str) -> Result<PostParams, serde_urlencoded::de::Error> {
    serde_urlencoded::from_str(body)
}

/// Collects a payload's optional fields before flattening.
#[derive(Debug, Default)]
pub struct FormFields {
    fields: Vec<(&'static str, Option<String>)>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required<T: ToWire + ?Sized>(mut self, name: &'static str, value: &T) -> Self {
        self.fields.push((name, Some(value.to_wire())));
        self
    }

    pub fn optional<T: ToWire>(mut self, name: &'static str, value: Option<&T>) -> Self {
        self.fields.push((name, value.map(ToWire::to_wire)));
        self
    }

    pub fn flatten(self) -> PostParams {
        flatten(self.fields)
    }
}

/// Reads the fields of one namespace back out of flat parameters,
/// accumulating mismatches the way `decode::ObjectReader` does.
pub struct ParamReader<'a> {
    params: &'a PostParams,
    prefix: &'a str,
    consumed: BTreeSet<String>,
    mismatches: Vec<FieldMismatch>,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a PostParams, prefix: &'a str) -> Self {
        Self {
            params,
            prefix,
            consumed: BTreeSet::new(),
            mismatches: Vec::new(),
        }
    }

    fn key(&self, name: &str) -> String {
        format!("{}[{name}]", self.prefix)
    }

    pub fn required<T: FromWire>(&mut self, name: &str) -> Option<T> {
        let key = self.key(name);
        if !self.params.contains_key(&key) {
            self.mismatches
                .push(FieldMismatch::new(key, MismatchReason::Missing));
            return None;
        }
        self.optional(name)
    }

    pub fn optional<T: FromWire>(&mut self, name: &str) -> Option<T> {
        let key = self.key(name);
        let raw = self.params.get(&key)?;
        self.consumed.insert(key.clone());
        match T::from_wire(raw) {
            Ok(value) => Some(value),
            Err(reason) => {
                self.mismatches.push(FieldMismatch::new(key, reason));
                None
            }
        }
    }

    /// Finish reading: any key in this namespace that no field claimed is
    /// reported, then the record is returned if nothing failed.
    pub fn finish<T>(mut self, record: Option<T>) -> Result<T, DecodeError> {
        for key in self.params.keys() {
            let in_namespace = split_namespace(key).is_some_and(|(p, _)| p == self.prefix);
            if in_namespace && !self.consumed.contains(key) {
                self.mismatches.push(FieldMismatch::new(
                    key.clone(),
                    MismatchReason::NotAllowed(format!("unknown `{}` field", self.prefix)),
                ));
            }
        }
        match record {
            Some(record) if self.mismatches.is_empty() => Ok(record),
            _ => Err(DecodeError::Fields(self.mismatches)),
        }
    }
}
