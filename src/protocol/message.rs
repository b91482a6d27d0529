//! Typed requests and responses.
//!
//! Both sides work with [`Request`] and [`Response`]; the flat wire mapping
//! only exists inside [`WireCodec`](crate::core::wire::WireCodec). Field names
//! follow the wire table:
//!
//! | action   | request fields       | success fields                                   |
//! |----------|----------------------|--------------------------------------------------|
//! | login    | username, secret     | account_id, username, name, account_number      |
//! | balance  | account_id           | balance, account_number                          |
//! | deposit  | account_id, amount   | message, new_balance                             |
//! | withdraw | account_id, amount   | message, new_balance                             |
//! | logout   |                      | message                                          |

use crate::bank::account::{AccountId, AccountSummary};
use crate::core::wire::WireMessage;
use crate::error::{constants, BankError, Result};
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const STATUS_OK: &str = "ok";
pub const STATUS_ERROR: &str = "error";

/// Discriminant of a [`Request`], used to type the matching response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Login,
    Balance,
    Deposit,
    Withdraw,
    Logout,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Login => "login",
            RequestKind::Balance => "balance",
            RequestKind::Deposit => "deposit",
            RequestKind::Withdraw => "withdraw",
            RequestKind::Logout => "logout",
        }
    }
}

impl FromStr for RequestKind {
    type Err = BankError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "login" => Ok(RequestKind::Login),
            "balance" => Ok(RequestKind::Balance),
            "deposit" => Ok(RequestKind::Deposit),
            "withdraw" => Ok(RequestKind::Withdraw),
            "logout" => Ok(RequestKind::Logout),
            _ => Err(BankError::Validation(constants::ERR_INVALID_ACTION.to_string())),
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client to server message
#[derive(Clone, PartialEq, Eq)]
pub enum Request {
    Login { username: String, secret: String },
    Balance { account_id: AccountId },
    Deposit { account_id: AccountId, amount: Decimal },
    Withdraw { account_id: AccountId, amount: Decimal },
    Logout,
}

// Hand-written so secrets never reach the logs
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("secret", &"<redacted>")
                .finish(),
            Request::Balance { account_id } => f
                .debug_struct("Balance")
                .field("account_id", account_id)
                .finish(),
            Request::Deposit { account_id, amount } => f
                .debug_struct("Deposit")
                .field("account_id", account_id)
                .field("amount", amount)
                .finish(),
            Request::Withdraw { account_id, amount } => f
                .debug_struct("Withdraw")
                .field("account_id", account_id)
                .field("amount", amount)
                .finish(),
            Request::Logout => f.write_str("Logout"),
        }
    }
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Login { .. } => RequestKind::Login,
            Request::Balance { .. } => RequestKind::Balance,
            Request::Deposit { .. } => RequestKind::Deposit,
            Request::Withdraw { .. } => RequestKind::Withdraw,
            Request::Logout => RequestKind::Logout,
        }
    }

    /// Account the request acts on, if any
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Request::Balance { account_id }
            | Request::Deposit { account_id, .. }
            | Request::Withdraw { account_id, .. } => Some(*account_id),
            Request::Login { .. } | Request::Logout => None,
        }
    }

    pub fn to_wire(&self) -> WireMessage {
        let mut map = WireMessage::new();
        map.insert("action".into(), self.kind().as_str().into());
        match self {
            Request::Login { username, secret } => {
                map.insert("username".into(), username.as_str().into());
                map.insert("secret".into(), secret.as_str().into());
            }
            Request::Balance { account_id } => {
                map.insert("account_id".into(), account_id.get().into());
            }
            Request::Deposit { account_id, amount } | Request::Withdraw { account_id, amount } => {
                map.insert("account_id".into(), account_id.get().into());
                map.insert("amount".into(), decimal_value(*amount));
            }
            Request::Logout => {}
        }
        map
    }

    /// Build a typed request from a decoded mapping.
    ///
    /// # Errors
    /// Returns `BankError::Validation` for an unknown action or a missing or
    /// ill-typed field. These are answered, not treated as framing errors.
    pub fn from_wire(map: &WireMessage) -> Result<Self> {
        let kind: RequestKind = require_str(map, "action")?.parse()?;
        let request = match kind {
            RequestKind::Login => Request::Login {
                username: require_str(map, "username")?.to_string(),
                secret: require_str(map, "secret")?.to_string(),
            },
            RequestKind::Balance => Request::Balance {
                account_id: require_account_id(map)?,
            },
            RequestKind::Deposit => Request::Deposit {
                account_id: require_account_id(map)?,
                amount: require_decimal(map, "amount")?,
            },
            RequestKind::Withdraw => Request::Withdraw {
                account_id: require_account_id(map)?,
                amount: require_decimal(map, "amount")?,
            },
            RequestKind::Logout => Request::Logout,
        };
        Ok(request)
    }
}

/// Server to client message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    LoggedIn(AccountSummary),
    Balance {
        balance: Decimal,
        account_number: String,
    },
    Transaction {
        message: String,
        new_balance: Decimal,
    },
    LoggedOut {
        message: String,
    },
    Error {
        message: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error {
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        !matches!(self, Response::Error { .. })
    }

    pub fn to_wire(&self) -> WireMessage {
        let mut map = WireMessage::new();
        let status = if self.is_ok() { STATUS_OK } else { STATUS_ERROR };
        map.insert("status".into(), status.into());
        match self {
            Response::LoggedIn(summary) => {
                map.insert("account_id".into(), summary.account_id.get().into());
                map.insert("username".into(), summary.username.as_str().into());
                map.insert("name".into(), summary.name.as_str().into());
                map.insert(
                    "account_number".into(),
                    summary.account_number.as_str().into(),
                );
            }
            Response::Balance {
                balance,
                account_number,
            } => {
                map.insert("balance".into(), decimal_value(*balance));
                map.insert("account_number".into(), account_number.as_str().into());
            }
            Response::Transaction {
                message,
                new_balance,
            } => {
                map.insert("message".into(), message.as_str().into());
                map.insert("new_balance".into(), decimal_value(*new_balance));
            }
            Response::LoggedOut { message } | Response::Error { message } => {
                map.insert("message".into(), message.as_str().into());
            }
        }
        map
    }

    /// Type a response mapping, given the kind of request it answers
    pub fn from_wire(kind: RequestKind, map: &WireMessage) -> Result<Self> {
        let status = require_str(map, "status").map_err(into_codec)?;
        if status == STATUS_ERROR {
            let message = require_str(map, "message").map_err(into_codec)?;
            return Ok(Response::error(message));
        }
        if status != STATUS_OK {
            return Err(BankError::Codec(format!("Unknown status '{status}'")));
        }

        let response = match kind {
            RequestKind::Login => Response::LoggedIn(AccountSummary {
                account_id: require_account_id(map)?,
                username: require_str(map, "username")?.to_string(),
                name: require_str(map, "name")?.to_string(),
                account_number: require_str(map, "account_number")?.to_string(),
            }),
            RequestKind::Balance => Response::Balance {
                balance: require_decimal(map, "balance")?,
                account_number: require_str(map, "account_number")?.to_string(),
            },
            RequestKind::Deposit | RequestKind::Withdraw => Response::Transaction {
                message: require_str(map, "message")?.to_string(),
                new_balance: require_decimal(map, "new_balance")?,
            },
            RequestKind::Logout => Response::LoggedOut {
                message: require_str(map, "message")?.to_string(),
            },
        };
        Ok(response)
    }
}

fn into_codec(err: BankError) -> BankError {
    BankError::Codec(err.to_string())
}

fn missing(field: &str) -> BankError {
    BankError::Validation(format!("Missing or invalid field '{field}'"))
}

fn require_str<'a>(map: &'a WireMessage, field: &str) -> Result<&'a str> {
    map.get(field).and_then(Value::as_str).ok_or_else(|| missing(field))
}

fn require_account_id(map: &WireMessage) -> Result<AccountId> {
    map.get("account_id")
        .and_then(Value::as_u64)
        .map(AccountId::new)
        .ok_or_else(|| missing("account_id"))
}

/// Accept a JSON number or a numeric string, parsed without going through f64
fn require_decimal(map: &WireMessage, field: &str) -> Result<Decimal> {
    let text = match map.get(field) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        _ => return Err(missing(field)),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| missing(field))
}

/// Emit a decimal as an exact JSON number
fn decimal_value(amount: Decimal) -> Value {
    serde_json::from_str(&amount.to_string()).unwrap_or_else(|_| Value::String(amount.to_string()))
}
