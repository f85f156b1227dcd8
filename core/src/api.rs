//! Executor-driven operations, one handle per resource.
//!
//! Each operation builds its request with `StripeClient`, awaits the
//! executor, then parses or classifies the response. The executor call is the
//! only suspension point; everything around it is synchronous.

use tracing::debug;

use crate::client::{ClientConfig, IdempotencyKey, StripeClient};
use crate::error::Error;
use crate::executor::HttpExecutor;
use crate::http::{HttpRequest, HttpResponse};
use crate::token::{Token, TokenParams};

/// Payments API bound to an executor.
#[derive(Debug, Clone)]
pub struct Stripe<E> {
    client: StripeClient,
    executor: E,
}

impl<E: HttpExecutor> Stripe<E> {
    pub fn new(config: &ClientConfig, executor: E) -> Self {
        Self {
            client: StripeClient::from_config(config),
            executor,
        }
    }

    pub fn client(&self) -> &StripeClient {
        &self.client
    }

    pub fn tokens(&self) -> Tokens<'_, E> {
        Tokens { stripe: self }
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.executor.send(request).await.map_err(|err| {
            debug!(error = %err, "transport failed");
            Error::from(err)
        })?;
        debug!(status = response.status, bytes = response.body.len(), "received response");
        Ok(response)
    }
}

/// Operations on `/tokens`.
#[derive(Debug)]
pub struct Tokens<'a, E> {
    stripe: &'a Stripe<E>,
}

impl<E: HttpExecutor> Tokens<'_, E> {
    /// Mint a single-use token.
    pub async fn create(
        &self,
        params: &TokenParams,
        idempotency_key: Option<&IdempotencyKey>,
    ) -> Result<Token, Error> {
        let client = &self.stripe.client;
        let request = client.build_create_token(params, idempotency_key)?;
        let response = self.stripe.execute(request).await?;
        client.parse_create_token(response)
    }

    pub async fn get(&self, id: &str) -> Result<Token, Error> {
        let client = &self.stripe.client;
        let response = self.stripe.execute(client.build_get_token(id)).await?;
        client.parse_get_token(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ErrorType;
    use crate::executor::TransportError;
    use crate::token::{PiiParams, TokenData};

    /// Replays one canned outcome and remembers the request it saw.
    struct Canned {
        outcome: Result<HttpResponse, TransportError>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Canned {
        fn new(outcome: Result<HttpResponse, TransportError>) -> Self {
            Self {
                outcome,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl HttpExecutor for Canned {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            self.outcome.clone()
        }
    }

    fn stripe(outcome: Result<HttpResponse, TransportError>) -> Stripe<Canned> {
        Stripe::new(&ClientConfig::new("http://api.test/v1"), Canned::new(outcome))
    }

    fn pii() -> TokenParams {
        TokenParams::new(TokenData::Pii(PiiParams {
            personal_id_number: "000000000".to_string(),
            data: None,
        }))
    }

    #[tokio::test]
    async fn create_sends_form_and_decodes_token() {
        let body = r#"{"id":"pii_1","created":1,"livemode":false,"used":false,"type":"pii"}"#;
        let stripe = stripe(Ok(HttpResponse::new(200, body)));
        let key = IdempotencyKey::new("k-1");

        let token = stripe.tokens().create(&pii(), Some(&key)).await.unwrap();
        assert_eq!(token.id, "pii_1");

        let seen = stripe.executor.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].url, "http://api.test/v1/tokens");
        assert_eq!(seen[0].header("Idempotency-Key"), Some("k-1"));
        assert_eq!(
            seen[0].body.as_deref(),
            Some("pii%5Bpersonal_id_number%5D=000000000")
        );
    }

    #[tokio::test]
    async fn get_classifies_not_found() {
        let body = r#"{"error":{"type":"invalid_request_error","message":"No such token: tok_x","param":"id"}}"#;
        let err = stripe(Ok(HttpResponse::new(404, body)))
            .tokens()
            .get("tok_x")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert_eq!(err.details().unwrap().param.as_deref(), Some("id"));
    }

    #[tokio::test]
    async fn timeout_surfaces_as_connection_error() {
        let err = stripe(Err(TransportError::Timeout))
            .tokens()
            .get("tok_1")
            .await
            .unwrap_err();
        assert_eq!(err, Error::Connection(TransportError::Timeout));
        assert_eq!(err.error_type(), Some(ErrorType::ApiConnectionError));
    }

    #[tokio::test]
    async fn service_unavailable_keeps_raw_body() {
        let raw = HttpResponse::new(503, "<html>...</html>");
        let err = stripe(Ok(raw.clone())).tokens().get("tok_1").await.unwrap_err();
        assert_eq!(err, Error::ServerError(raw));
    }
}
