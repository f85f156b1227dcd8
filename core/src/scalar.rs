//! Wire codecs for the primitive values carried by tokens and errors.
//!
//! # Design
//! Every scalar has three directions:
//! - `ToWire` renders the exact string placed in a form body,
//! - `FromWire` parses that string back,
//! - `FromJson` reads the value out of a JSON response.
//!
//! Enumerations take their wire strings from `strum`. Parsing a string that no
//! variant claims yields `MismatchReason::UnrecognizedVariant` carrying the
//! offending tag; there is no fallback variant.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use strum::{EnumString, IntoStaticStr};

use crate::decode::MismatchReason;

/// Shape violations caught when constructing a scalar from caller input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScalarError {
    #[error("currency code must be three ASCII letters, got `{0}`")]
    InvalidCurrency(String),

    #[error("country code must be two ASCII letters, got `{0}`")]
    InvalidCountry(String),
}

/// Render a value as its form-body string.
pub trait ToWire {
    fn to_wire(&self) -> String;
}

/// Parse a value from its form-body string.
pub trait FromWire: Sized {
    fn from_wire(raw: &str) -> Result<Self, MismatchReason>;
}

/// Read a value out of a decoded JSON node.
pub trait FromJson: Sized {
    fn from_json(value: &Value) -> Result<Self, MismatchReason>;
}

/// Name of the JSON type of `value`, used in mismatch reports.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn str_value(value: &Value) -> Result<&str, MismatchReason> {
    value.as_str().ok_or(MismatchReason::WrongType {
        expected: "string",
        found: json_kind(value),
    })
}

// ---------------------------------------------------------------------------
// Strings, booleans, integers
// ---------------------------------------------------------------------------

impl ToWire for str {
    fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl ToWire for String {
    fn to_wire(&self) -> String {
        self.clone()
    }
}

impl FromWire for String {
    fn from_wire(raw: &str) -> Result<Self, MismatchReason> {
        Ok(raw.to_string())
    }
}

impl FromJson for String {
    fn from_json(value: &Value) -> Result<Self, MismatchReason> {
        str_value(value).map(str::to_string)
    }
}

impl ToWire for bool {
    fn to_wire(&self) -> String {
        self.to_string()
    }
}

impl FromJson for bool {
    fn from_json(value: &Value) -> Result<Self, MismatchReason> {
        value.as_bool().ok_or(MismatchReason::WrongType {
            expected: "boolean",
            found: json_kind(value),
        })
    }
}

macro_rules! wire_unsigned {
    ($($ty:ty),+) => {$(
        impl ToWire for $ty {
            fn to_wire(&self) -> String {
                self.to_string()
            }
        }

        impl FromWire for $ty {
            fn from_wire(raw: &str) -> Result<Self, MismatchReason> {
                if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(MismatchReason::Invalid(format!("`{raw}` is not a decimal integer")));
                }
                raw.parse()
                    .map_err(|_| MismatchReason::Invalid(format!("`{raw}` is out of range")))
            }
        }

        impl FromJson for $ty {
            fn from_json(value: &Value) -> Result<Self, MismatchReason> {
                let n = value.as_u64().ok_or(MismatchReason::WrongType {
                    expected: "unsigned integer",
                    found: json_kind(value),
                })?;
                <$ty>::try_from(n).map_err(|_| MismatchReason::Invalid(format!("{n} is out of range")))
            }
        }
    )+};
}

wire_unsigned!(u8, u16, u32, u64);

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Timestamps travel as Unix seconds.
impl ToWire for DateTime<Utc> {
    fn to_wire(&self) -> String {
        self.timestamp().to_string()
    }
}

impl FromJson for DateTime<Utc> {
    fn from_json(value: &Value) -> Result<Self, MismatchReason> {
        let secs = value.as_i64().ok_or(MismatchReason::WrongType {
            expected: "integer timestamp",
            found: json_kind(value),
        })?;
        Utc.timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| MismatchReason::Invalid(format!("{secs} is not a valid timestamp")))
    }
}

// ---------------------------------------------------------------------------
// Currency and country codes
// ---------------------------------------------------------------------------

/// ISO 4217 currency code, held lower-case as the API expects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Result<Self, ScalarError> {
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_lowercase()))
        } else {
            Err(ScalarError::InvalidCurrency(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Currency {
    type Err = ScalarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// ISO 3166-1 alpha-2 country code, held upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Country(String);

impl Country {
    pub fn new(code: &str) -> Result<Self, ScalarError> {
        if code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(ScalarError::InvalidCountry(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Country {
    type Err = ScalarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

macro_rules! wire_code {
    ($($ty:ty),+) => {$(
        impl ToWire for $ty {
            fn to_wire(&self) -> String {
                self.0.clone()
            }
        }

        impl FromWire for $ty {
            fn from_wire(raw: &str) -> Result<Self, MismatchReason> {
                <$ty>::new(raw).map_err(|e| MismatchReason::Invalid(e.to_string()))
            }
        }

        impl FromJson for $ty {
            fn from_json(value: &Value) -> Result<Self, MismatchReason> {
                <$ty as FromWire>::from_wire(str_value(value)?)
            }
        }
    )+};
}

wire_code!(Currency, Country);

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Implements the wire codecs for a `strum`-derived enumeration. An unknown
/// string becomes `UnrecognizedVariant` with the original tag.
macro_rules! wire_enum {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::scalar::ToWire for $ty {
            fn to_wire(&self) -> String {
                <&'static str>::from(self).to_string()
            }
        }

        impl $crate::scalar::FromWire for $ty {
            fn from_wire(raw: &str) -> Result<Self, $crate::decode::MismatchReason> {
                raw.parse()
                    .map_err(|_| $crate::decode::MismatchReason::UnrecognizedVariant(raw.to_string()))
            }
        }

        impl $crate::scalar::FromJson for $ty {
            fn from_json(value: &serde_json::Value) -> Result<Self, $crate::decode::MismatchReason> {
                <$ty as $crate::scalar::FromWire>::from_wire($crate::scalar::str_value(value)?)
            }
        }
    )+};
}

pub(crate) use wire_enum;

/// Discriminator of a token and of its form payload namespace.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TokenType {
    Card,
    BankAccount,
    Pii,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AccountHolderType {
    Individual,
    Company,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
pub enum CardBrand {
    Visa,
    #[serde(rename = "American Express")]
    #[strum(serialize = "American Express")]
    AmericanExpress,
    MasterCard,
    Discover,
    #[serde(rename = "JCB")]
    #[strum(serialize = "JCB")]
    Jcb,
    #[serde(rename = "Diners Club")]
    #[strum(serialize = "Diners Club")]
    DinersClub,
    UnionPay,
    Unknown,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardFunding {
    Credit,
    Debit,
    Prepaid,
    Unknown,
}

/// Outcome of a card verification check such as `cvc_check`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckResult {
    Pass,
    Fail,
    Unavailable,
    Unchecked,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BankAccountStatus {
    New,
    Validated,
    Verified,
    VerificationFailed,
    Errored,
}

wire_enum!(
    TokenType,
    AccountHolderType,
    CardBrand,
    CardFunding,
    CheckResult,
    BankAccountStatus,
);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn currency_is_normalised_to_lower_case() {
        let usd = Currency::new("USD").unwrap();
        assert_eq!(usd.as_str(), "usd");
        assert_eq!(usd.to_wire(), "usd");
    }

    #[test]
    fn currency_rejects_bad_shape() {
        assert_eq!(
            Currency::new("US"),
            Err(ScalarError::InvalidCurrency("US".to_string()))
        );
        assert!(Currency::new("u5d").is_err());
    }

    #[test]
    fn country_is_normalised_to_upper_case() {
        let country: Country = "us".parse().unwrap();
        assert_eq!(country.to_wire(), "US");
        assert!(Country::new("USA").is_err());
    }

    #[test]
    fn integers_render_as_plain_digits() {
        assert_eq!(12u8.to_wire(), "12");
        assert_eq!(2025u16.to_wire(), "2025");
        assert_eq!(u16::from_wire("2025"), Ok(2025));
        assert!(u8::from_wire("+1").is_err());
        assert!(u8::from_wire("1,000").is_err());
        assert!(matches!(u8::from_wire("300"), Err(MismatchReason::Invalid(_))));
    }

    #[test]
    fn enums_use_wire_strings() {
        assert_eq!(TokenType::BankAccount.to_wire(), "bank_account");
        assert_eq!(CardBrand::AmericanExpress.to_wire(), "American Express");
        assert_eq!(
            CardBrand::from_json(&json!("Diners Club")),
            Ok(CardBrand::DinersClub)
        );
        assert_eq!(
            BankAccountStatus::from_wire("verification_failed"),
            Ok(BankAccountStatus::VerificationFailed)
        );
    }

    #[test]
    fn unknown_enum_tag_is_reported_verbatim() {
        assert_eq!(
            TokenType::from_wire("crypto_wallet"),
            Err(MismatchReason::UnrecognizedVariant("crypto_wallet".to_string()))
        );
    }

    #[test]
    fn enum_from_non_string_is_a_type_mismatch() {
        assert_eq!(
            CardFunding::from_json(&json!(3)),
            Err(MismatchReason::WrongType {
                expected: "string",
                found: "number",
            })
        );
    }

    #[test]
    fn timestamps_decode_from_unix_seconds() {
        let ts = DateTime::<Utc>::from_json(&json!(1_700_000_000)).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.to_wire(), "1700000000");
        assert!(DateTime::<Utc>::from_json(&json!("yesterday")).is_err());
    }
}
