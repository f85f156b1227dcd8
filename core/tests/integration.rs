//! Token lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives `Stripe<E>` over real
//! HTTP through an `HttpExecutor` backed by ureq. ureq is blocking, so each
//! send runs on tokio's blocking pool; the executor also injects the API key,
//! which the core never sees.

use async_trait::async_trait;
use stripe_core::{
    AccountHolderType, BankAccountParams, CardBrand, CardParams, ClientConfig, Country, Currency,
    Error, ErrorCode, ErrorType, HttpExecutor, HttpMethod, HttpRequest, HttpResponse,
    IdempotencyKey, PiiParams, Stripe, TokenData, TokenParams, TokenType, TransportError,
};

struct UreqExecutor {
    agent: ureq::Agent,
    api_key: String,
}

impl UreqExecutor {
    /// Disables ureq's status-code-as-error behavior so 4xx/5xx responses
    /// come back as data for the core to classify.
    fn new(api_key: &str) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            api_key: api_key.to_string(),
        }
    }
}

fn execute(
    agent: &ureq::Agent,
    auth: &str,
    req: HttpRequest,
) -> Result<HttpResponse, TransportError> {
    let result = match req.method {
        HttpMethod::Get => {
            let mut builder = agent.get(&req.url).header("Authorization", auth);
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder.call()
        }
        HttpMethod::Post => {
            let mut builder = agent.post(&req.url).header("Authorization", auth);
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder.send(req.body.unwrap_or_default().as_bytes())
        }
    };
    let mut response = result.map_err(|e| match e {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Connect(other.to_string()),
    })?;

    let status = response.status().as_u16();
    let body = response
        .body_mut()
        .read_to_vec()
        .map_err(|e| TransportError::Other(e.to_string()))?;
    Ok(HttpResponse::new(status, body))
}

#[async_trait]
impl HttpExecutor for UreqExecutor {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let auth = format!("Bearer {}", self.api_key);
        tokio::task::spawn_blocking(move || execute(&agent, &auth, request))
            .await
            .map_err(|e| TransportError::Other(e.to_string()))?
    }
}

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    format!("http://{addr}/v1")
}

async fn stripe(api_key: &str) -> Stripe<UreqExecutor> {
    let base = start_server().await;
    Stripe::new(&ClientConfig::new(&base), UreqExecutor::new(api_key))
}

fn card(number: &str) -> TokenParams {
    TokenParams::new(TokenData::Card(
        CardParams::new(number, 12, 2030).with_cvc("123").with_name("Jenny Rosen"),
    ))
}

#[tokio::test(flavor = "multi_thread")]
async fn card_token_lifecycle() {
    let stripe = stripe("sk_test_123").await;
    let tokens = stripe.tokens();
    let key = IdempotencyKey::generate();

    // Step 1: create.
    let created = tokens.create(&card("4242424242424242"), Some(&key)).await.unwrap();
    assert_eq!(created.token_type(), TokenType::Card);
    assert!(!created.used);
    let details = created.card().unwrap();
    assert_eq!(details.brand, CardBrand::Visa);
    assert_eq!(details.last4, "4242");
    assert_eq!(details.exp_month, 12);
    assert_eq!(details.name.as_deref(), Some("Jenny Rosen"));

    // Step 2: replaying the same key returns the same token.
    let replayed = tokens.create(&card("4242424242424242"), Some(&key)).await.unwrap();
    assert_eq!(replayed, created);

    // Step 3: a new key mints a new token.
    let fresh = tokens.create(&card("4242424242424242"), None).await.unwrap();
    assert_ne!(fresh.id, created.id);

    // Step 4: get returns what create returned.
    let fetched = tokens.get(&created.id).await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test(flavor = "multi_thread")]
async fn bank_account_and_pii_tokens() {
    let stripe = stripe("sk_test_123").await;

    let mut account = BankAccountParams::new(
        "000123456789",
        Country::new("US").unwrap(),
        Currency::new("USD").unwrap(),
    );
    account.account_holder_type = Some(AccountHolderType::Company);
    let token = stripe
        .tokens()
        .create(&TokenParams::new(TokenData::BankAccount(account)), None)
        .await
        .unwrap();
    let bank = token.bank_account().unwrap();
    assert_eq!(bank.last4, "6789");
    assert_eq!(bank.currency.as_str(), "usd");
    assert_eq!(bank.account_holder_type, Some(AccountHolderType::Company));

    let pii = TokenParams::new(TokenData::Pii(PiiParams {
        personal_id_number: "000000000".to_string(),
        data: None,
    }))
    .with_customer("cus_1");
    let token = stripe.tokens().create(&pii, None).await.unwrap();
    assert_eq!(token.token_type(), TokenType::Pii);
    assert!(token.card().is_none() && token.bank_account().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn card_errors_are_classified() {
    let stripe = stripe("sk_test_123").await;
    let tokens = stripe.tokens();

    let cases = [
        (card("4000000000000002"), ErrorCode::CardDeclined),
        (card("4000000000000069"), ErrorCode::ExpiredCard),
        (card("4000000000000127"), ErrorCode::IncorrectCvc),
        (card("4242424242424241"), ErrorCode::IncorrectNumber),
        (
            TokenParams::new(TokenData::Card(CardParams::new("4242424242424242", 13, 2030))),
            ErrorCode::InvalidExpiryMonth,
        ),
    ];
    for (params, code) in cases {
        let err = tokens.create(&params, None).await.unwrap_err();
        assert!(matches!(err, Error::RequestFailed(_)), "{code:?}: {err}");
        assert_eq!(err.error_type(), Some(ErrorType::CardError));
        assert_eq!(err.code(), Some(code));
    }

    let declined = tokens.create(&card("4000000000000002"), None).await.unwrap_err();
    assert_eq!(
        declined.details().unwrap().message.as_deref(),
        Some("Your card was declined.")
    );
    assert!(declined.details().unwrap().param.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_token_is_not_found() {
    let stripe = stripe("sk_test_123").await;
    let err = stripe.tokens().get("tok_does_not_exist").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(err.error_type(), Some(ErrorType::InvalidRequestError));
}

#[tokio::test(flavor = "multi_thread")]
async fn live_key_is_unauthorized() {
    let stripe = stripe("sk_live_123").await;
    let err = stripe.tokens().get("tok_1").await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(err.error_type(), Some(ErrorType::AuthenticationError));
}

#[tokio::test(flavor = "multi_thread")]
async fn refused_connection_is_a_connection_error() {
    // Bind then drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let stripe = Stripe::new(
        &ClientConfig::new(&format!("http://127.0.0.1:{port}/v1")),
        UreqExecutor::new("sk_test_123"),
    );
    let err = stripe.tokens().get("tok_1").await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
    assert_eq!(err.error_type(), Some(ErrorType::ApiConnectionError));
}
