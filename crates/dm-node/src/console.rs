//! # Command Console
//!
//! One JSON command per line in, one JSON response per line out.
//!
//! ```text
//! {"cmd":"upload","caller":"0x01..01","dataset_cid":"bafy..","analysis_cid":"bafy..","is_public":true}
//! {"ok":true,"result":0}
//! {"cmd":"purchase","caller":"0x02..02","id":0,"token":"0x70..70"}
//! {"ok":false,"error":"dataset 0 is not paid","category":"state_conflict"}
//! ```
//!
//! Amounts are accepted as JSON numbers, decimal strings or `0x` hex strings.

use dm_registry::adapters::{InMemoryEventLog, InMemoryTokenLedger};
use dm_registry::domain::entities::UploadRequest;
use dm_registry::domain::value_objects::{Address, DatasetId, U256};
use dm_registry::errors::{MarketError, TransferError};
use dm_registry::ports::inbound::DatasetMarketApi;
use dm_registry::service::Marketplace;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Marketplace wired with the in-memory adapters.
pub type NodeMarket = Marketplace<InMemoryTokenLedger, InMemoryEventLog>;

/// Default page size for `public_page`.
const DEFAULT_PAGE_LIMIT: u64 = 20;

// =============================================================================
// REQUESTS
// =============================================================================

/// Amount argument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AmountArg {
    /// Plain JSON number.
    Number(u64),
    /// Decimal or `0x`-prefixed hex string.
    Text(String),
}

impl Default for AmountArg {
    fn default() -> Self {
        Self::Number(0)
    }
}

impl AmountArg {
    /// Parse into a `U256`.
    pub fn value(&self) -> Result<U256, ConsoleError> {
        match self {
            Self::Number(n) => Ok(U256::from(*n)),
            Self::Text(text) => {
                let text = text.trim();
                let parsed = match text.strip_prefix("0x") {
                    Some(hex) => U256::from_str_radix(hex, 16).ok(),
                    None => U256::from_dec_str(text).ok(),
                };
                parsed.ok_or_else(|| ConsoleError::InvalidAmount(text.to_string()))
            }
        }
    }
}

fn default_limit() -> u64 {
    DEFAULT_PAGE_LIMIT
}

/// A console command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Register a dataset.
    Upload {
        caller: Address,
        dataset_cid: String,
        #[serde(default)]
        analysis_cid: String,
        #[serde(default)]
        is_public: bool,
        #[serde(default)]
        is_private: bool,
        #[serde(default)]
        is_paid: bool,
        #[serde(default)]
        price: AmountArg,
    },
    /// Read a dataset record.
    GetDataset { caller: Address, id: DatasetId },
    /// Count a view.
    IncrementViews { caller: Address, id: DatasetId },
    /// Count a download.
    IncrementDownloads { caller: Address, id: DatasetId },
    /// Buy download rights.
    Purchase {
        caller: Address,
        id: DatasetId,
        token: Address,
    },
    /// Allow-list a payment token.
    AddPaymentToken {
        caller: Address,
        token: Address,
        symbol: String,
    },
    /// Number of datasets.
    TotalDatasets,
    /// One page of the public listing.
    PublicPage {
        #[serde(default)]
        start: u64,
        #[serde(default = "default_limit")]
        limit: u64,
    },
    /// Ids uploaded by the caller.
    MyDatasets { caller: Address },
    /// Ids purchased by the caller.
    MyPurchases { caller: Address },
    /// Earnings of the caller.
    MyEarnings { caller: Address },
    /// Earnings of one dataset.
    DatasetEarnings { caller: Address, id: DatasetId },
    /// Evaluate the view predicate.
    CanView { caller: Address, id: DatasetId },
    /// Evaluate the download predicate.
    CanDownload { caller: Address, id: DatasetId },
    /// Whether a token is allow-listed.
    IsTokenAccepted { token: Address },
    /// The allowlist.
    PaymentTokens,
    /// Events from a sequence number on.
    Events {
        #[serde(default)]
        since: u64,
    },
    /// Service counters.
    Stats,
    /// Credit tokens on the development ledger.
    Mint {
        token: Address,
        to: Address,
        amount: AmountArg,
    },
    /// Set an allowance on the development ledger. Spender defaults to the market.
    Approve {
        token: Address,
        owner: Address,
        #[serde(default)]
        spender: Option<Address>,
        amount: AmountArg,
    },
    /// Balance on the development ledger.
    Balance { token: Address, owner: Address },
}

impl Command {
    /// Returns true for commands that may change ledger state.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Self::Upload { .. }
                | Self::IncrementViews { .. }
                | Self::IncrementDownloads { .. }
                | Self::Purchase { .. }
                | Self::AddPaymentToken { .. }
        )
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Errors surfaced to console clients.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// The line is not a valid command.
    #[error("malformed command: {0}")]
    Malformed(String),

    /// An amount argument did not parse.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The marketplace rejected the call.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The development token ledger rejected the call.
    #[error(transparent)]
    Token(#[from] TransferError),

    /// A result could not be encoded as JSON.
    #[error("encoding result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ConsoleError {
    /// Category reported next to the message.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Malformed(_) | Self::InvalidAmount(_) => "request",
            Self::Market(err) => err.category().as_str(),
            Self::Token(_) => "token_ledger",
            Self::Encode(_) => "internal",
        }
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Command output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error category on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'static str>,
}

impl Response {
    fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
            category: None,
        }
    }

    fn failure(err: &ConsoleError) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(err.to_string()),
            category: Some(err.category()),
        }
    }
}

/// Outcome of one console line.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Line to send back.
    pub response: Response,
    /// A mutating command committed.
    pub committed: bool,
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Executes commands against one marketplace, strictly one at a time.
pub struct Console {
    market: Arc<NodeMarket>,
}

impl Console {
    /// Console over `market`.
    pub fn new(market: Arc<NodeMarket>) -> Self {
        Self { market }
    }

    /// The marketplace behind this console.
    pub fn market(&self) -> &Arc<NodeMarket> {
        &self.market
    }

    /// Parse and execute one line.
    pub fn handle_line(&self, line: &str) -> Outcome {
        let command = match serde_json::from_str::<Command>(line) {
            Ok(command) => command,
            Err(e) => {
                return Outcome {
                    response: Response::failure(&ConsoleError::Malformed(e.to_string())),
                    committed: false,
                }
            }
        };

        let mutating = command.is_mutating();
        match self.execute(command) {
            Ok(result) => Outcome {
                response: Response::success(result),
                committed: mutating,
            },
            Err(err) => {
                debug!(error = %err, category = err.category(), "command failed");
                Outcome {
                    response: Response::failure(&err),
                    committed: false,
                }
            }
        }
    }

    /// Execute a parsed command.
    pub fn execute(&self, command: Command) -> Result<Value, ConsoleError> {
        let market = &self.market;
        let value = match command {
            Command::Upload {
                caller,
                dataset_cid,
                analysis_cid,
                is_public,
                is_private,
                is_paid,
                price,
            } => {
                let request = UploadRequest {
                    dataset_cid: dataset_cid.into(),
                    analysis_cid: analysis_cid.into(),
                    is_public,
                    is_private,
                    is_paid,
                    price: price.value()?,
                };
                json!(market.upload(caller, request)?)
            }
            Command::GetDataset { caller, id } => {
                to_value(&market.get_dataset(caller, id)?)?
            }
            Command::IncrementViews { caller, id } => json!(market.increment_views(caller, id)?),
            Command::IncrementDownloads { caller, id } => {
                json!(market.increment_downloads(caller, id)?)
            }
            Command::Purchase { caller, id, token } => {
                market.purchase(caller, id, token)?;
                json!({ "id": id, "buyer": caller, "token": token })
            }
            Command::AddPaymentToken {
                caller,
                token,
                symbol,
            } => {
                market.add_payment_token(caller, token, &symbol)?;
                market.token_gateway().register_token(token);
                json!({ "token": token, "symbol": symbol })
            }
            Command::TotalDatasets => json!(market.total_datasets()),
            Command::PublicPage { start, limit } => {
                to_value(&market.public_dataset_page(start, limit))?
            }
            Command::MyDatasets { caller } => json!(market.my_dataset_ids(caller)),
            Command::MyPurchases { caller } => json!(market.my_purchased_ids(caller)),
            Command::MyEarnings { caller } => to_value(&market.my_earnings(caller))?,
            Command::DatasetEarnings { caller, id } => {
                to_value(&market.dataset_earnings(caller, id)?)?
            }
            Command::CanView { caller, id } => json!(market.can_view(caller, id)?),
            Command::CanDownload { caller, id } => json!(market.can_download(caller, id)?),
            Command::IsTokenAccepted { token } => json!(market.is_token_accepted(token)),
            Command::PaymentTokens => to_value(&market.payment_tokens())?,
            Command::Events { since } => to_value(&market.event_sink().since(since))?,
            Command::Stats => to_value(&market.stats())?,
            Command::Mint { token, to, amount } => {
                to_value(&market.token_gateway().mint(token, to, amount.value()?)?)?
            }
            Command::Approve {
                token,
                owner,
                spender,
                amount,
            } => {
                let spender = spender.unwrap_or(market.config().market_address);
                let amount = amount.value()?;
                market
                    .token_gateway()
                    .approve(token, owner, spender, amount)?;
                json!({ "token": token, "owner": owner, "spender": spender, "amount": amount })
            }
            Command::Balance { token, owner } => {
                to_value(&market.token_gateway().balance_of(token, owner))?
            }
        };
        Ok(value)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ConsoleError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "failed to encode command result");
        ConsoleError::Encode(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dm_registry::config::MarketConfig;

    const ADMIN: &str = "0xadadadadadadadadadadadadadadadadadadadad";
    const SELLER: &str = "0x0101010101010101010101010101010101010101";
    const BUYER: &str = "0x0202020202020202020202020202020202020202";
    const TOKEN: &str = "0x7070707070707070707070707070707070707070";

    fn console() -> Console {
        let config = MarketConfig::new(ADMIN.parse().unwrap()).with_token(TOKEN.parse().unwrap(), "TKN");
        let market = Marketplace::new(
            config,
            Arc::new(InMemoryTokenLedger::new()),
            Arc::new(InMemoryEventLog::new()),
        )
        .unwrap();
        Console::new(Arc::new(market))
    }

    fn run(console: &Console, line: &str) -> Response {
        console.handle_line(line).response
    }

    #[test]
    fn test_amount_forms() {
        assert_eq!(AmountArg::Number(7).value().unwrap(), U256::from(7));
        assert_eq!(AmountArg::Text("10".into()).value().unwrap(), U256::from(10));
        assert_eq!(AmountArg::Text("0xff".into()).value().unwrap(), U256::from(255));
        assert!(AmountArg::Text("ten".into()).value().is_err());
    }

    #[test]
    fn test_unencodable_result_is_an_error() {
        let mut map = std::collections::BTreeMap::new();
        map.insert((1u8, 2u8), 3u8);
        let err = to_value(&map).unwrap_err();
        assert!(matches!(err, ConsoleError::Encode(_)));
        assert_eq!(err.category(), "internal");
    }

    #[test]
    fn test_upload_and_read() {
        let console = console();
        let line = format!(
            r#"{{"cmd":"upload","caller":"{SELLER}","dataset_cid":"A","analysis_cid":"R","is_public":true,"is_paid":true,"price":"10"}}"#
        );
        let outcome = console.handle_line(&line);
        assert!(outcome.committed);
        assert_eq!(outcome.response.result, Some(json!(0)));

        let response = run(&console, &format!(r#"{{"cmd":"get_dataset","caller":"{BUYER}","id":0}}"#));
        assert!(response.ok);
        let result = response.result.unwrap();
        assert_eq!(result["dataset_cid"], "A");
        assert_eq!(result["uploader"], SELLER);

        let total = run(&console, r#"{"cmd":"total_datasets"}"#);
        assert_eq!(total.result, Some(json!(1)));
    }

    #[test]
    fn test_errors_carry_category() {
        let console = console();
        let response = run(
            &console,
            &format!(r#"{{"cmd":"upload","caller":"{SELLER}","dataset_cid":"A","is_public":true,"is_private":true}}"#),
        );
        assert!(!response.ok);
        assert_eq!(response.category, Some("validation"));

        let response = run(&console, r#"{"cmd":"fly"}"#);
        assert_eq!(response.category, Some("request"));

        let outcome = console.handle_line(&format!(
            r#"{{"cmd":"purchase","caller":"{BUYER}","id":3,"token":"{TOKEN}"}}"#
        ));
        assert!(!outcome.committed);
        assert_eq!(outcome.response.category, Some("not_found"));
    }

    #[test]
    fn test_purchase_session() {
        let console = console();
        run(
            &console,
            &format!(r#"{{"cmd":"upload","caller":"{SELLER}","dataset_cid":"A","is_public":true,"is_paid":true,"price":10}}"#),
        );
        run(&console, &format!(r#"{{"cmd":"mint","token":"{TOKEN}","to":"{BUYER}","amount":50}}"#));
        run(&console, &format!(r#"{{"cmd":"approve","token":"{TOKEN}","owner":"{BUYER}","amount":50}}"#));

        let bought = console.handle_line(&format!(
            r#"{{"cmd":"purchase","caller":"{BUYER}","id":0,"token":"{TOKEN}"}}"#
        ));
        assert!(bought.response.ok, "{:?}", bought.response);
        assert!(bought.committed);

        let again = run(
            &console,
            &format!(r#"{{"cmd":"purchase","caller":"{BUYER}","id":0,"token":"{TOKEN}"}}"#),
        );
        assert_eq!(again.category, Some("state_conflict"));

        let earnings = run(&console, &format!(r#"{{"cmd":"my_earnings","caller":"{SELLER}"}}"#));
        assert_eq!(earnings.result, Some(to_value(&U256::from(10)).unwrap()));

        let mine = run(&console, &format!(r#"{{"cmd":"my_purchases","caller":"{BUYER}"}}"#));
        assert_eq!(mine.result, Some(json!([0])));

        let page = run(&console, r#"{"cmd":"public_page"}"#).result.unwrap();
        assert_eq!(page["next_start"], Value::Null);
        assert_eq!(page["datasets"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn test_reads_do_not_commit() {
        let console = console();
        let outcome = console.handle_line(r#"{"cmd":"payment_tokens"}"#);
        assert!(outcome.response.ok);
        assert!(!outcome.committed);
        assert_eq!(outcome.response.result.unwrap()[0]["symbol"], "TKN");
    }
}
