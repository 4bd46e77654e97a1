//! Line protocol parsing
//!
//! Commands are case-insensitive, arguments case-preserving, tokens split on
//! whitespace. Parsing produces either a typed [`Command`] or a reject with
//! an optional usage line for the caller.

use types::prelude::*;

pub const USAGE_AUTH: &str = "USAGE: AUTH <PASSKEY> <CLIENTID>";
pub const USAGE_NEWL: &str = "USAGE: NEWL <BUY|SELL> <SYMBOL> <QTY> <PRICE>";
pub const USAGE_NEWM: &str = "USAGE: NEWM <BUY|SELL> <SYMBOL> <QTY>";
pub const USAGE_CANC: &str = "USAGE: CANC <ORDERID>";
pub const USAGE_SUB: &str = "USAGE: SUB <GROUP>";
pub const USAGE_UNSUB: &str = "USAGE: UNSUB <GROUP>";
pub const USAGE_QUOTE: &str = "USAGE: QUOTE <SYMBOL>";
pub const USAGE_SEND: &str = "USAGE: SEND <GROUP> <MESSAGE>";
pub const USAGE_DEBUG: &str = "USAGE: DEBUG <AUTH <SECRET>|LIST|ORDERS|INSTRUMENTS>";

/// A fully tokenized request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping,
    Auth { passkey: String, client: ClientId },
    New { side: Side, symbol: Symbol, qty: Qty, price: Option<Price> },
    Cancel { id: OrderId },
    Sub { group: String },
    Unsub { group: String },
    Quote { symbol: Symbol },
    Send { group: String, message: String },
    DebugAuth { secret: String },
    DebugList,
    DebugOrders,
    DebugInstruments,
}

/// Why a line failed to parse, plus the usage hint to echo back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub reject: Reject,
    pub usage: Option<&'static str>,
}

impl ParseError {
    fn new(reject: impl Into<Reject>, usage: Option<&'static str>) -> Self {
        Self {
            reject: reject.into(),
            usage,
        }
    }
}

fn parse_side(token: &str) -> Result<Side, ParseError> {
    match token {
        "BUY" => Ok(Side::Bid),
        "SELL" => Ok(Side::Ask),
        _ => Err(ParseError::new(ClientInputError::BadSide, None)),
    }
}

fn parse_symbol(token: &str) -> Result<Symbol, ParseError> {
    Symbol::try_new(token).ok_or_else(|| ParseError::new(ClientInputError::BadSymbol, None))
}

fn parse_qty(token: &str) -> Result<Qty, ParseError> {
    match token.parse::<u64>() {
        Ok(units) if units > 0 => Ok(Qty::new(units)),
        _ => Err(ParseError::new(ClientInputError::BadQty, None)),
    }
}

fn parse_price(token: &str) -> Result<Price, ParseError> {
    match token.parse::<u64>() {
        Ok(ticks) if ticks > 0 => Ok(Price::new(ticks)),
        _ => Err(ParseError::new(ClientInputError::BadPrice, None)),
    }
}

/// Parse one request line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Ok(None);
    };
    let cmd = first.to_ascii_uppercase();

    let command = match cmd.as_str() {
        "PING" => Command::Ping,

        "AUTH" => {
            if parts.len() < 3 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_AUTH)));
            }
            Command::Auth {
                passkey: parts[1].to_string(),
                client: ClientId::new(parts[2]),
            }
        }

        "NEWL" => {
            if parts.len() < 5 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_NEWL)));
            }
            Command::New {
                side: parse_side(parts[1])?,
                symbol: parse_symbol(parts[2])?,
                qty: parse_qty(parts[3])?,
                price: Some(parse_price(parts[4])?),
            }
        }

        "NEWM" => {
            if parts.len() < 4 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_NEWM)));
            }
            Command::New {
                side: parse_side(parts[1])?,
                symbol: parse_symbol(parts[2])?,
                qty: parse_qty(parts[3])?,
                price: None,
            }
        }

        "CANC" => {
            if parts.len() < 2 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_CANC)));
            }
            // An unparseable id cannot name any live order.
            let id = OrderId::parse(parts[1])
                .ok_or_else(|| ParseError::new(Reject::NotFound, None))?;
            Command::Cancel { id }
        }

        "SUB" => {
            if parts.len() < 2 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_SUB)));
            }
            Command::Sub {
                group: parts[1].to_string(),
            }
        }

        "UNSUB" => {
            if parts.len() < 2 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_UNSUB)));
            }
            Command::Unsub {
                group: parts[1].to_string(),
            }
        }

        "QUOTE" => {
            if parts.len() < 2 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_QUOTE)));
            }
            Command::Quote {
                symbol: parse_symbol(parts[1])?,
            }
        }

        "SEND" => {
            if parts.len() < 3 {
                return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_SEND)));
            }
            Command::Send {
                group: parts[1].to_string(),
                message: parts[2..].join(" "),
            }
        }

        "DEBUG" => {
            let sub = parts.get(1).map(|s| s.to_ascii_uppercase());
            match sub.as_deref() {
                Some("AUTH") if parts.len() >= 3 => Command::DebugAuth {
                    secret: parts[2].to_string(),
                },
                Some("LIST") => Command::DebugList,
                Some("ORDERS") => Command::DebugOrders,
                Some("INSTRUMENTS") => Command::DebugInstruments,
                _ => {
                    return Err(ParseError::new(ClientInputError::BadCommand, Some(USAGE_DEBUG)))
                }
            }
        }

        _ => return Err(ParseError::new(ClientInputError::BadCommand, None)),
    };

    Ok(Some(command))
}
