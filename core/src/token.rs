//! Token payloads and token records.
//!
//! # Design
//! `TokenData` is the closed set of things a single-use token can be minted
//! from. Each variant owns a disjoint form namespace named after its
//! `TokenType` (`card[...]`, `bank_account[...]`, `pii[...]`), so the
//! namespace prefix is itself the discriminator when reading params back.
//!
//! `Token` is what the API returns. Its payload is an enum keyed by the same
//! `TokenType`, so a token whose tag and payload disagree cannot be built;
//! decoding rejects such a body instead.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decode::{Decode, DecodeError, FieldMismatch, MismatchReason, ObjectReader};
use crate::form::{self, FormFields, ParamReader, PostParams};
use crate::scalar::{
    AccountHolderType, BankAccountStatus, CardBrand, CardFunding, CheckResult, Country, Currency,
    FromWire, TokenType,
};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardParams {
    pub exp_month: u8,
    pub exp_year: u16,
    pub number: String,
    pub address_city: Option<String>,
    pub address_country: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub address_state: Option<String>,
    pub address_zip: Option<String>,
    pub currency: Option<Currency>,
    pub cvc: Option<String>,
    pub name: Option<String>,
}

impl CardParams {
    /// A card with only the required fields set.
    pub fn new(number: &str, exp_month: u8, exp_year: u16) -> Self {
        Self {
            exp_month,
            exp_year,
            number: number.to_string(),
            address_city: None,
            address_country: None,
            address_line1: None,
            address_line2: None,
            address_state: None,
            address_zip: None,
            currency: None,
            cvc: None,
            name: None,
        }
    }

    pub fn with_cvc(mut self, cvc: &str) -> Self {
        self.cvc = Some(cvc.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    fn to_params(&self) -> PostParams {
        FormFields::new()
            .required("exp_month", &self.exp_month)
            .required("exp_year", &self.exp_year)
            .required("number", &self.number)
            .optional("address_city", self.address_city.as_ref())
            .optional("address_country", self.address_country.as_ref())
            .optional("address_line1", self.address_line1.as_ref())
            .optional("address_line2", self.address_line2.as_ref())
            .optional("address_state", self.address_state.as_ref())
            .optional("address_zip", self.address_zip.as_ref())
            .optional("currency", self.currency.as_ref())
            .optional("cvc", self.cvc.as_ref())
            .optional("name", self.name.as_ref())
            .flatten()
    }

    fn read(r: &mut ParamReader<'_>) -> Option<Self> {
        let exp_month = r.required("exp_month");
        let exp_year = r.required("exp_year");
        let number = r.required("number");
        Some(Self {
            address_city: r.optional("address_city"),
            address_country: r.optional("address_country"),
            address_line1: r.optional("address_line1"),
            address_line2: r.optional("address_line2"),
            address_state: r.optional("address_state"),
            address_zip: r.optional("address_zip"),
            currency: r.optional("currency"),
            cvc: r.optional("cvc"),
            name: r.optional("name"),
            exp_month: exp_month?,
            exp_year: exp_year?,
            number: number?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankAccountParams {
    pub account_number: String,
    pub country: Country,
    pub currency: Currency,
    pub routing_number: Option<String>,
    pub account_holder_name: Option<String>,
    pub account_holder_type: Option<AccountHolderType>,
}

impl BankAccountParams {
    pub fn new(account_number: &str, country: Country, currency: Currency) -> Self {
        Self {
            account_number: account_number.to_string(),
            country,
            currency,
            routing_number: None,
            account_holder_name: None,
            account_holder_type: None,
        }
    }

    fn to_params(&self) -> PostParams {
        FormFields::new()
            .required("account_number", &self.account_number)
            .required("country", &self.country)
            .required("currency", &self.currency)
            .optional("routing_number", self.routing_number.as_ref())
            .optional("account_holder_name", self.account_holder_name.as_ref())
            .optional("account_holder_type", self.account_holder_type.as_ref())
            .flatten()
    }

    fn read(r: &mut ParamReader<'_>) -> Option<Self> {
        let account_number = r.required("account_number");
        let country = r.required("country");
        let currency = r.required("currency");
        let routing_number = r.optional("routing_number");
        let account_holder_name = r.optional("account_holder_name");
        let account_holder_type = r.optional("account_holder_type");
        Some(Self {
            account_number: account_number?,
            country: country?,
            currency: currency?,
            routing_number,
            account_holder_name,
            account_holder_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiiParams {
    pub personal_id_number: String,
    /// Opaque PII blob passed through untouched.
    pub data: Option<String>,
}

impl PiiParams {
    fn to_params(&self) -> PostParams {
        FormFields::new()
            .required("personal_id_number", &self.personal_id_number)
            .optional("data", self.data.as_ref())
            .flatten()
    }

    fn read(r: &mut ParamReader<'_>) -> Option<Self> {
        let personal_id_number = r.required("personal_id_number");
        let data = r.optional("data");
        Some(Self {
            personal_id_number: personal_id_number?,
            data,
        })
    }
}

/// What a token is created from. Exactly one variant per token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenData {
    Card(CardParams),
    BankAccount(BankAccountParams),
    Pii(PiiParams),
}

impl TokenData {
    pub fn token_type(&self) -> TokenType {
        match self {
            TokenData::Card(_) => TokenType::Card,
            TokenData::BankAccount(_) => TokenType::BankAccount,
            TokenData::Pii(_) => TokenType::Pii,
        }
    }

    /// Flatten this payload under its own namespace.
    pub fn to_params(&self) -> PostParams {
        let fields = match self {
            TokenData::Card(card) => card.to_params(),
            TokenData::BankAccount(account) => account.to_params(),
            TokenData::Pii(pii) => pii.to_params(),
        };
        form::namespace(<&'static str>::from(self.token_type()), fields)
    }

    /// Read a payload back from flat params. The single namespace present
    /// selects the variant; an unknown namespace is `UnrecognizedVariant`.
    pub fn from_params(params: &PostParams) -> Result<Self, DecodeError> {
        let mut namespaces: Vec<&str> = params
            .keys()
            .filter_map(|key| form::split_namespace(key).map(|(prefix, _)| prefix))
            .collect();
        namespaces.dedup();

        let prefix = match namespaces.as_slice() {
            [prefix] => *prefix,
            [] => {
                return Err(DecodeError::Fields(vec![FieldMismatch::new(
                    "type",
                    MismatchReason::Missing,
                )]))
            }
            [_, rest @ ..] => {
                return Err(DecodeError::Fields(
                    rest.iter()
                        .map(|extra| {
                            FieldMismatch::new(
                                *extra,
                                MismatchReason::NotAllowed(
                                    "a token carries a single payload".to_string(),
                                ),
                            )
                        })
                        .collect(),
                ))
            }
        };

        let token_type = TokenType::from_wire(prefix)
            .map_err(|reason| DecodeError::Fields(vec![FieldMismatch::new(prefix, reason)]))?;
        let mut reader = ParamReader::new(params, prefix);
        match token_type {
            TokenType::Card => {
                let card = CardParams::read(&mut reader);
                reader.finish(card).map(TokenData::Card)
            }
            TokenType::BankAccount => {
                let account = BankAccountParams::read(&mut reader);
                reader.finish(account).map(TokenData::BankAccount)
            }
            TokenType::Pii => {
                let pii = PiiParams::read(&mut reader);
                reader.finish(pii).map(TokenData::Pii)
            }
        }
    }
}

/// Input for creating a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    pub data: TokenData,
    /// Connected-account customer the token is minted for.
    pub customer: Option<String>,
}

impl TokenParams {
    pub fn new(data: TokenData) -> Self {
        Self {
            data,
            customer: None,
        }
    }

    pub fn with_customer(mut self, customer: &str) -> Self {
        self.customer = Some(customer.to_string());
        self
    }

    pub fn to_params(&self) -> PostParams {
        let mut params = self.data.to_params();
        params.extend(form::flatten([("customer", self.customer.clone())]));
        params
    }

    pub fn from_params(params: &PostParams) -> Result<Self, DecodeError> {
        let customer = params.get("customer").cloned();
        let stray: Vec<FieldMismatch> = params
            .keys()
            .filter(|key| key.as_str() != "customer" && form::split_namespace(key).is_none())
            .map(|key| {
                FieldMismatch::new(
                    key.clone(),
                    MismatchReason::NotAllowed("unknown top-level parameter".to_string()),
                )
            })
            .collect();
        if !stray.is_empty() {
            return Err(DecodeError::Fields(stray));
        }
        let payload: PostParams = params
            .iter()
            .filter(|(key, _)| key.as_str() != "customer")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Self {
            data: TokenData::from_params(&payload)?,
            customer,
        })
    }
}

// ---------------------------------------------------------------------------
// Response records
// ---------------------------------------------------------------------------

/// A card as described inside a card token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Card {
    pub id: String,
    pub brand: CardBrand,
    pub last4: String,
    pub exp_month: u8,
    pub exp_year: u16,
    pub funding: CardFunding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<Country>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_zip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvc_check: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

impl Decode for Card {
    fn decode(r: &mut ObjectReader<'_, '_>) -> Option<Self> {
        r.object_kind("card");
        let id = r.required("id");
        let brand = r.required("brand");
        let last4 = r.required("last4");
        let exp_month = r.required("exp_month");
        let exp_year = r.required("exp_year");
        let funding = r.required("funding");
        Some(Self {
            country: r.optional("country"),
            name: r.optional("name"),
            address_line1: r.optional("address_line1"),
            address_line2: r.optional("address_line2"),
            address_city: r.optional("address_city"),
            address_state: r.optional("address_state"),
            address_zip: r.optional("address_zip"),
            address_country: r.optional("address_country"),
            currency: r.optional("currency"),
            cvc_check: r.optional("cvc_check"),
            fingerprint: r.optional("fingerprint"),
            id: id?,
            brand: brand?,
            last4: last4?,
            exp_month: exp_month?,
            exp_year: exp_year?,
            funding: funding?,
        })
    }
}

/// A bank account as described inside a bank-account token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankAccount {
    pub id: String,
    pub country: Country,
    pub currency: Currency,
    pub last4: String,
    pub status: BankAccountStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_holder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_holder_type: Option<AccountHolderType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_number: Option<String>,
}

impl Decode for BankAccount {
    fn decode(r: &mut ObjectReader<'_, '_>) -> Option<Self> {
        r.object_kind("bank_account");
        let id = r.required("id");
        let country = r.required("country");
        let currency = r.required("currency");
        let last4 = r.required("last4");
        let status = r.required("status");
        Some(Self {
            account_holder_name: r.optional("account_holder_name"),
            account_holder_type: r.optional("account_holder_type"),
            bank_name: r.optional("bank_name"),
            fingerprint: r.optional("fingerprint"),
            routing_number: r.optional("routing_number"),
            id: id?,
            country: country?,
            currency: currency?,
            last4: last4?,
            status: status?,
        })
    }
}

/// Payload of a token, tagged on the wire by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenPayload {
    Card { card: Card },
    BankAccount { bank_account: BankAccount },
    Pii,
}

impl TokenPayload {
    pub fn token_type(&self) -> TokenType {
        match self {
            TokenPayload::Card { .. } => TokenType::Card,
            TokenPayload::BankAccount { .. } => TokenType::BankAccount,
            TokenPayload::Pii => TokenType::Pii,
        }
    }

    fn decode_for(token_type: TokenType, r: &mut ObjectReader<'_, '_>) -> Option<Self> {
        let why = format!("token type is `{token_type}`");
        match token_type {
            TokenType::Card => {
                r.reject("bank_account", why);
                r.nested("card").map(|card| TokenPayload::Card { card })
            }
            TokenType::BankAccount => {
                r.reject("card", why);
                r.nested("bank_account")
                    .map(|bank_account| TokenPayload::BankAccount { bank_account })
            }
            TokenType::Pii => {
                r.reject("card", why.clone());
                r.reject("bank_account", why);
                Some(TokenPayload::Pii)
            }
        }
    }
}

/// A single-use token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    pub livemode: bool,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(flatten)]
    pub payload: TokenPayload,
}

impl Token {
    pub fn token_type(&self) -> TokenType {
        self.payload.token_type()
    }

    pub fn card(&self) -> Option<&Card> {
        match &self.payload {
            TokenPayload::Card { card } => Some(card),
            _ => None,
        }
    }

    pub fn bank_account(&self) -> Option<&BankAccount> {
        match &self.payload {
            TokenPayload::BankAccount { bank_account } => Some(bank_account),
            _ => None,
        }
    }
}

impl Decode for Token {
    fn decode(r: &mut ObjectReader<'_, '_>) -> Option<Self> {
        r.object_kind("token");
        let id = r.required("id");
        let created = r.required("created");
        let livemode = r.required("livemode");
        let used = r.required("used");
        let client_ip = r.optional("client_ip");
        let payload = r
            .required::<TokenType>("type")
            .and_then(|token_type| TokenPayload::decode_for(token_type, r));
        Some(Self {
            id: id?,
            created: created?,
            livemode: livemode?,
            used: used?,
            client_ip,
            payload: payload?,
        })
    }
}
