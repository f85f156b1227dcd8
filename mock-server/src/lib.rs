use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Form, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::info;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub object: String,
    pub brand: String,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub funding: String,
    pub country: Option<String>,
    pub name: Option<String>,
    pub address_zip: Option<String>,
    pub currency: Option<String>,
    pub cvc_check: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: String,
    pub object: String,
    pub account_holder_name: Option<String>,
    pub account_holder_type: Option<String>,
    pub bank_name: String,
    pub country: String,
    pub currency: String,
    pub last4: String,
    pub routing_number: Option<String>,
    pub status: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub livemode: bool,
    pub used: bool,
    #[serde(rename = "type")]
    pub token_type: String,
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<Card>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<BankAccount>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: Option<String>,
    pub message: Option<String>,
    pub param: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetails,
}

/// An error response in the live API's envelope.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub details: ErrorDetails,
}

impl ApiFailure {
    fn new(status: StatusCode, error_type: &str, code: Option<&str>, message: &str) -> Self {
        Self {
            status,
            details: ErrorDetails {
                error_type: error_type.to_string(),
                code: code.map(str::to_string),
                message: Some(message.to_string()),
                param: None,
            },
        }
    }

    fn param(mut self, param: &str) -> Self {
        self.details.param = Some(param.to_string());
        self
    }

    fn declined(code: &str, message: &str) -> Self {
        Self::new(StatusCode::PAYMENT_REQUIRED, "card_error", Some(code), message)
    }

    fn card(code: &str, message: &str, param: &str) -> Self {
        Self::declined(code, message).param(param)
    }

    fn invalid_request(message: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request_error", None, message)
    }

    fn missing(param: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_request_error",
            Some("missing"),
            &format!("Missing required param: {param}."),
        )
        .param(param)
    }

    fn into_parts(self) -> (StatusCode, Value) {
        let body = ErrorBody {
            error: self.details,
        };
        (self.status, serde_json::to_value(body).unwrap_or_default())
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let (status, body) = self.into_parts();
        (status, Json(body)).into_response()
    }
}

#[derive(Default)]
pub struct Store {
    tokens: HashMap<String, Token>,
    replays: HashMap<String, (StatusCode, Value)>,
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::default();
    Router::new()
        .route("/v1/tokens", post(create_token))
        .route("/v1/tokens/{id}", get(get_token))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authorize(headers: &HeaderMap) -> Result<(), ApiFailure> {
    let key = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    match key {
        Some(key) if key.starts_with("sk_test_") => Ok(()),
        Some(_) => Err(ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            None,
            "Invalid API Key provided.",
        )),
        None => Err(ApiFailure::new(
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            None,
            "You did not provide an API key.",
        )),
    }
}

async fn create_token(
    State(db): State<Db>,
    headers: HeaderMap,
    Form(params): Form<HashMap<String, String>>,
) -> Response {
    if let Err(failure) = authorize(&headers) {
        return failure.into_response();
    }
    let key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut store = db.write().await;
    if let Some((status, body)) = key.as_ref().and_then(|k| store.replays.get(k)) {
        info!(key = key.as_deref().unwrap_or_default(), "replaying idempotent request");
        return (*status, Json(body.clone())).into_response();
    }

    let (status, body) = match mint(&params) {
        Ok(token) => {
            info!(id = %token.id, kind = %token.token_type, "minted token");
            store.tokens.insert(token.id.clone(), token.clone());
            (StatusCode::OK, serde_json::to_value(token).unwrap_or_default())
        }
        Err(failure) => failure.into_parts(),
    };
    if let Some(key) = key {
        store.replays.insert(key, (status, body.clone()));
    }
    (status, Json(body)).into_response()
}

async fn get_token(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Token>, ApiFailure> {
    authorize(&headers)?;
    let store = db.read().await;
    store.tokens.get(&id).cloned().map(Json).ok_or_else(|| {
        ApiFailure::new(
            StatusCode::NOT_FOUND,
            "invalid_request_error",
            None,
            &format!("No such token: '{id}'"),
        )
        .param("id")
    })
}

/// Build a token from form params, applying test-mode card behaviour.
pub fn mint(params: &HashMap<String, String>) -> Result<Token, ApiFailure> {
    let mut kinds: Vec<&str> = params
        .keys()
        .filter_map(|k| k.split_once('[').map(|(prefix, _)| prefix))
        .collect();
    kinds.sort_unstable();
    kinds.dedup();

    let field = |kind: &str, name: &str| params.get(&format!("{kind}[{name}]")).cloned();
    let required = |kind: &str, name: &str| {
        field(kind, name).ok_or_else(|| ApiFailure::missing(&format!("{kind}[{name}]")))
    };

    let mut token = Token {
        id: format!("tok_{}", Uuid::new_v4().simple()),
        object: "token".to_string(),
        created: chrono::Utc::now().timestamp(),
        livemode: false,
        used: false,
        token_type: String::new(),
        client_ip: None,
        card: None,
        bank_account: None,
    };

    match kinds.as_slice() {
        ["card"] => {
            let number = required("card", "number")?;
            let exp_month = required("card", "exp_month")?;
            let exp_year = required("card", "exp_year")?;
            let cvc = field("card", "cvc");
            token.card = Some(check_card(
                &number,
                &exp_month,
                &exp_year,
                cvc.as_deref(),
            )?);
            if let Some(card) = token.card.as_mut() {
                card.name = field("card", "name");
                card.address_zip = field("card", "address_zip");
                card.currency = field("card", "currency");
            }
            token.token_type = "card".to_string();
        }
        ["bank_account"] => {
            let account_number = required("bank_account", "account_number")?;
            let country = required("bank_account", "country")?;
            let currency = required("bank_account", "currency")?;
            token.bank_account = Some(BankAccount {
                id: format!("ba_{}", Uuid::new_v4().simple()),
                object: "bank_account".to_string(),
                account_holder_name: field("bank_account", "account_holder_name"),
                account_holder_type: field("bank_account", "account_holder_type"),
                bank_name: "STRIPE TEST BANK".to_string(),
                country,
                currency,
                last4: last4(&account_number),
                routing_number: field("bank_account", "routing_number"),
                status: "new".to_string(),
            });
            token.token_type = "bank_account".to_string();
        }
        ["pii"] => {
            required("pii", "personal_id_number")?;
            token.id = format!("pii_{}", Uuid::new_v4().simple());
            token.token_type = "pii".to_string();
        }
        [] => {
            return Err(ApiFailure::invalid_request(
                "You must supply either a card, PII data, or bank account to create a token.",
            ))
        }
        _ => {
            return Err(ApiFailure::invalid_request(
                "Cannot create a token from more than one payload.",
            ))
        }
    }
    Ok(token)
}

fn check_card(
    number: &str,
    exp_month: &str,
    exp_year: &str,
    cvc: Option<&str>,
) -> Result<Card, ApiFailure> {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiFailure::card(
            "invalid_number",
            "The card number is not a valid credit card number.",
            "card[number]",
        ));
    }
    if !luhn_valid(number) {
        return Err(ApiFailure::card(
            "incorrect_number",
            "Your card number is incorrect.",
            "card[number]",
        ));
    }
    let exp_month: u8 = exp_month
        .parse()
        .ok()
        .filter(|m| (1..=12).contains(m))
        .ok_or_else(|| {
            ApiFailure::card(
                "invalid_expiry_month",
                "Your card's expiration month is invalid.",
                "card[exp_month]",
            )
        })?;
    let exp_year: u16 = exp_year.parse().map_err(|_| {
        ApiFailure::card(
            "invalid_expiry_year",
            "Your card's expiration year is invalid.",
            "card[exp_year]",
        )
    })?;
    if let Some(cvc) = cvc {
        if !(3..=4).contains(&cvc.len()) || !cvc.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ApiFailure::card(
                "invalid_cvc",
                "Your card's security code is invalid.",
                "card[cvc]",
            ));
        }
    }
    match number {
        "4000000000000002" => {
            return Err(ApiFailure::declined(
                "card_declined",
                "Your card was declined.",
            ))
        }
        "4000000000000069" => {
            return Err(ApiFailure::card(
                "expired_card",
                "Your card has expired.",
                "card[exp_month]",
            ))
        }
        "4000000000000127" => {
            return Err(ApiFailure::card(
                "incorrect_cvc",
                "Your card's security code is incorrect.",
                "card[cvc]",
            ))
        }
        _ => {}
    }
    Ok(Card {
        id: format!("card_{}", Uuid::new_v4().simple()),
        object: "card".to_string(),
        brand: brand(number).to_string(),
        last4: last4(number),
        exp_month,
        exp_year,
        funding: "credit".to_string(),
        country: Some("US".to_string()),
        name: None,
        address_zip: None,
        currency: None,
        cvc_check: Some(if cvc.is_some() { "unchecked" } else { "unavailable" }.to_string()),
    })
}

pub fn luhn_valid(number: &str) -> bool {
    let sum: u32 = number
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let d = u32::from(b - b'0');
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    number.len() >= 12 && sum % 10 == 0
}

pub fn brand(number: &str) -> &'static str {
    let prefix2: u32 = number.get(..2).and_then(|p| p.parse().ok()).unwrap_or(0);
    match prefix2 {
        34 | 37 => "American Express",
        51..=55 | 22..=27 => "MasterCard",
        65 => "Discover",
        35 => "JCB",
        30 | 36 | 38 => "Diners Club",
        62 => "UnionPay",
        _ if number.starts_with("6011") => "Discover",
        _ if number.starts_with('4') => "Visa",
        _ => "Unknown",
    }
}

fn last4(number: &str) -> String {
    let skip = number.chars().count().saturating_sub(4);
    number.chars().skip(skip).collect()
}
