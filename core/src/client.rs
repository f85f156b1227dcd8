//! Stateless HTTP request builder and response parser for the tokens API.
//!
//! # Design
//! `StripeClient` holds only its configuration and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. `api::Stripe` composes the two around an `HttpExecutor`;
//! hosts that do their own I/O can call them directly.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use uuid::Uuid;

use crate::decode::{self, Decode};
use crate::error::{self, Error};
use crate::form;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::token::{Token, TokenParams};

pub const DEFAULT_BASE_URL: &str = "https://api.stripe.com/v1";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Characters left as-is in a path segment; everything else is escaped.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Where the API lives and which version to pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Sent as `Stripe-Version` when set.
    pub api_version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_version: None,
        }
    }

    pub fn with_api_version(mut self, version: &str) -> Self {
        self.api_version = Some(version.to_string());
        self
    }
}

/// Caller-chosen key that lets the API deduplicate a retried write.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: &str) -> Self {
        Self(key.to_string())
    }

    /// A fresh random key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Synchronous, stateless client for the tokens API.
#[derive(Debug, Clone)]
pub struct StripeClient {
    base_url: String,
    api_version: Option<String>,
}

impl StripeClient {
    pub fn new(base_url: &str) -> Self {
        Self::from_config(&ClientConfig::new(base_url))
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.api_version
            .iter()
            .map(|v| ("Stripe-Version".to_string(), v.clone()))
            .collect()
    }

    pub fn build_create_token(
        &self,
        params: &TokenParams,
        idempotency_key: Option<&IdempotencyKey>,
    ) -> Result<HttpRequest, Error> {
        let body = form::encode_form(&params.to_params())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let mut headers = self.headers();
        headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
        if let Some(key) = idempotency_key {
            headers.push(("Idempotency-Key".to_string(), key.as_str().to_string()));
        }
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}/tokens", self.base_url),
            headers,
            body: Some(body),
        })
    }

    pub fn build_get_token(&self, id: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!(
                "{}/tokens/{}",
                self.base_url,
                utf8_percent_encode(id, PATH_SEGMENT)
            ),
            headers: self.headers(),
            body: None,
        }
    }

    pub fn parse_create_token(&self, response: HttpResponse) -> Result<Token, Error> {
        parse_record(response)
    }

    pub fn parse_get_token(&self, response: HttpResponse) -> Result<Token, Error> {
        parse_record(response)
    }
}

/// Pass a 2xx response through; classify anything else.
fn check_status(response: HttpResponse) -> Result<HttpResponse, Error> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(error::classify(response))
    }
}

fn parse_record<T: Decode>(response: HttpResponse) -> Result<T, Error> {
    let response = check_status(response)?;
    decode::from_slice(&response.body).map_err(|source| Error::Decode {
        status: response.status,
        source,
    })
}
