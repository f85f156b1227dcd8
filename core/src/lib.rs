//! Typed client core for a Stripe-style payments API.
//!
//! # Overview
//! Maps typed domain values (token payloads, cards, bank accounts, errors) to
//! and from the API's form-encoded requests and JSON responses, and turns
//! every failure into a typed `Error`. The network is never touched here:
//! requests are plain data handed to an `HttpExecutor` or to the host.
//!
//! # Design
//! - `StripeClient` is stateless: `build_*` produces a request, `parse_*`
//!   consumes a response.
//! - `Stripe<E>` composes the two around an async executor; the executor
//!   call is the only suspension point.
//! - Form bodies come from `form::flatten`, which omits absent fields.
//! - Responses are decoded strictly by `decode`, which reports every
//!   mismatched field at once.
//! - `error::classify` maps any non-2xx response onto a closed taxonomy and
//!   never fails.

pub mod api;
pub mod client;
pub mod decode;
pub mod error;
pub mod executor;
pub mod form;
pub mod http;
pub mod scalar;
pub mod token;

pub use api::{Stripe, Tokens};
pub use client::{ClientConfig, IdempotencyKey, StripeClient};
pub use decode::{DecodeError, FieldMismatch, MismatchReason};
pub use error::{classify, ApiErrorDetails, Error, ErrorCode, ErrorType};
pub use executor::{HttpExecutor, TransportError};
pub use form::PostParams;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use scalar::{
    AccountHolderType, BankAccountStatus, CardBrand, CardFunding, CheckResult, Country, Currency,
    ScalarError, TokenType,
};
pub use token::{
    BankAccount, BankAccountParams, Card, CardParams, PiiParams, Token, TokenData, TokenParams,
    TokenPayload,
};
