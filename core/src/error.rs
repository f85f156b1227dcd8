//! Error types for the payments API client.
//!
//! # Design
//! The API reports failures as an HTTP status plus a JSON body of
//! `{type, code?, message?, param?}`. `classify` turns that pair into one
//! `Error` value:
//!
//! - 400, 401, 402, 404 and 429 become a typed variant carrying the decoded
//!   details,
//! - 500, 502, 503 and 504 become `ServerError` without looking at the body,
//! - anything else, including a listed status whose body does not decode,
//!   becomes `UnhandledServerError`.
//!
//! Classification never fails. Decode problems on the error path are logged
//! and folded into the catch-all rather than returned separately.

use serde::Serialize;
use strum::{EnumString, IntoStaticStr};
use tracing::warn;

use crate::decode::{self, Decode, DecodeError, ObjectReader};
use crate::executor::TransportError;
use crate::http::HttpResponse;
use crate::scalar::wire_enum;

/// Broad category the API assigns to an error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorType {
    ApiConnectionError,
    ApiError,
    AuthenticationError,
    CardError,
    InvalidRequestError,
    RateLimitError,
}

/// Fine-grained reason, mostly for card errors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumString, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorCode {
    InvalidNumber,
    InvalidExpiryMonth,
    InvalidExpiryYear,
    InvalidCvc,
    IncorrectNumber,
    IncorrectCvc,
    IncorrectZip,
    ExpiredCard,
    CardDeclined,
    Missing,
    ProcessingError,
}

wire_enum!(ErrorType, ErrorCode);

/// The body the API sends with a 4xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiErrorDetails {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl ApiErrorDetails {
    pub fn new(error_type: ErrorType) -> Self {
        Self {
            error_type,
            code: None,
            message: None,
            param: None,
        }
    }
}

/// Accepts the details either bare or wrapped in an `"error"` envelope.
impl Decode for ApiErrorDetails {
    fn decode(r: &mut ObjectReader<'_, '_>) -> Option<Self> {
        if r.has("error") {
            return r.nested("error");
        }
        let error_type = r.required("type");
        let code = r.optional("code");
        let message = r.optional("message");
        let param = r.optional("param");
        Some(Self {
            error_type: error_type?,
            code,
            message,
            param,
        })
    }
}

/// Every way a call to the payments API can fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// 400: the request was malformed or missing a parameter.
    #[error("bad request ({}): {}", .0.error_type, message(.0))]
    BadRequest(ApiErrorDetails),

    /// 401: no valid API key.
    #[error("unauthorized ({}): {}", .0.error_type, message(.0))]
    Unauthorized(ApiErrorDetails),

    /// 402: parameters were valid but the request failed, e.g. a declined card.
    #[error("request failed ({}): {}", .0.error_type, message(.0))]
    RequestFailed(ApiErrorDetails),

    /// 404: the requested resource does not exist.
    #[error("not found ({}): {}", .0.error_type, message(.0))]
    NotFound(ApiErrorDetails),

    /// 429: too many requests hit the API too quickly.
    #[error("too many requests ({}): {}", .0.error_type, message(.0))]
    TooManyRequests(ApiErrorDetails),

    /// 500, 502, 503 or 504. The body is kept raw and not interpreted.
    #[error("server error: HTTP {}", .0.status)]
    ServerError(HttpResponse),

    /// Any response the classifier has no typed variant for.
    #[error("unhandled response: HTTP {}", .0.status)]
    UnhandledServerError(HttpResponse),

    /// A success status whose body did not match the expected record.
    #[error("could not decode HTTP {status} response: {source}")]
    Decode {
        status: u16,
        #[source]
        source: DecodeError,
    },

    /// The executor never produced a response.
    #[error(transparent)]
    Connection(#[from] TransportError),

    /// The request body could not be rendered.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

fn message(details: &ApiErrorDetails) -> &str {
    details.message.as_deref().unwrap_or("no message")
}

impl Error {
    /// Details decoded from the body, for the status-keyed variants.
    pub fn details(&self) -> Option<&ApiErrorDetails> {
        match self {
            Error::BadRequest(d)
            | Error::Unauthorized(d)
            | Error::RequestFailed(d)
            | Error::NotFound(d)
            | Error::TooManyRequests(d) => Some(d),
            _ => None,
        }
    }

    /// The API error category. A transport failure reports
    /// `ApiConnectionError` and an untyped server failure `ApiError`.
    pub fn error_type(&self) -> Option<ErrorType> {
        match self {
            Error::Connection(_) => Some(ErrorType::ApiConnectionError),
            Error::ServerError(_) | Error::UnhandledServerError(_) => Some(ErrorType::ApiError),
            other => other.details().map(|d| d.error_type),
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        self.details().and_then(|d| d.code)
    }

    /// HTTP status behind this error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::BadRequest(_) => Some(400),
            Error::Unauthorized(_) => Some(401),
            Error::RequestFailed(_) => Some(402),
            Error::NotFound(_) => Some(404),
            Error::TooManyRequests(_) => Some(429),
            Error::ServerError(r) | Error::UnhandledServerError(r) => Some(r.status),
            Error::Decode { status, .. } => Some(*status),
            Error::Connection(_) | Error::Serialization(_) => None,
        }
    }
}

/// Status codes whose body is decoded into `ApiErrorDetails`.
fn typed_variant(status: u16) -> Option<fn(ApiErrorDetails) -> Error> {
    match status {
        400 => Some(Error::BadRequest),
        401 => Some(Error::Unauthorized),
        402 => Some(Error::RequestFailed),
        404 => Some(Error::NotFound),
        429 => Some(Error::TooManyRequests),
        _ => None,
    }
}

fn is_server_failure(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504)
}

/// Map an error response onto the error taxonomy.
pub fn classify(response: HttpResponse) -> Error {
    if is_server_failure(response.status) {
        return Error::ServerError(response);
    }
    let Some(variant) = typed_variant(response.status) else {
        return Error::UnhandledServerError(response);
    };
    match decode::from_slice::<ApiErrorDetails>(&response.body) {
        Ok(details) => variant(details),
        Err(err) => {
            warn!(status = response.status, error = %err, "error body did not decode");
            Error::UnhandledServerError(response)
        }
    }
}
