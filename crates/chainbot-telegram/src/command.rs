//! Parsing of slash commands.

use chainbot_core::types::{Chain, Timeframe};
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Help,
    AddWallet {
        name: String,
        chain: Chain,
        private_key: String,
    },
    Wallets,
    RemoveWallet {
        name: String,
        chain: Chain,
    },
    /// No name means every wallet.
    Balance {
        name: Option<String>,
        chain: Option<Chain>,
    },
    Token {
        name: String,
        chain: Chain,
        token: String,
    },
    Deposit {
        name: String,
        chain: Option<Chain>,
    },
    Send {
        name: String,
        chain: Chain,
        to: String,
        amount: Decimal,
    },
    SendToken {
        name: String,
        chain: Chain,
        token: String,
        to: String,
        amount: Decimal,
    },
    Gas {
        name: String,
        chain: Chain,
        to: String,
        amount: Decimal,
        token: Option<String>,
    },
    Tx {
        chain: Chain,
        hash: String,
    },
    History,
    Settings,
    SetChain(Chain),
    SetSlippage(Decimal),
    Notifications(bool),
    Strategies,
    AddStrategy {
        strategy_type: String,
        symbol: String,
        timeframe: Timeframe,
        parameters: Value,
    },
    MyStrategies,
    StartStrategy(i64),
    StopStrategy(i64),
    RemoveStrategy(i64),
    /// `None` clears the stop.
    StopLoss {
        id: i64,
        pct: Option<Decimal>,
    },
    Portfolio,
    Trades,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Missing arguments; carries the usage line.
    Usage(&'static str),
    Unknown(String),
    Invalid(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Usage(usage) => write!(f, "Usage: {usage}"),
            ParseError::Unknown(name) => {
                write!(f, "Unknown command /{name}. Send /help for the list of commands.")
            }
            ParseError::Invalid(message) => f.write_str(message),
        }
    }
}

/// Usage line per command, in the order `/help` shows them.
pub const USAGE: &[(&str, &str)] = &[
    ("start", "/start"),
    ("help", "/help"),
    ("addwallet", "/addwallet <name> <chain> <private_key>"),
    ("wallets", "/wallets"),
    ("removewallet", "/removewallet <name> <chain>"),
    ("balance", "/balance [name] [chain]"),
    ("token", "/token <name> <chain> <token_address>"),
    ("deposit", "/deposit <name> [chain]"),
    ("send", "/send <name> <chain> <to> <amount>"),
    ("sendtoken", "/sendtoken <name> <chain> <token> <to> <amount>"),
    ("gas", "/gas <name> <chain> <to> <amount> [token]"),
    ("tx", "/tx <chain> <hash>"),
    ("history", "/history"),
    ("settings", "/settings"),
    ("setchain", "/setchain <chain>"),
    ("setslippage", "/setslippage <percent>"),
    ("notifications", "/notifications <on|off>"),
    ("strategies", "/strategies"),
    ("addstrategy", "/addstrategy <type> <symbol> <timeframe> [json parameters]"),
    ("mystrategies", "/mystrategies"),
    ("startstrategy", "/startstrategy <id>"),
    ("stopstrategy", "/stopstrategy <id>"),
    ("removestrategy", "/removestrategy <id>"),
    ("stoploss", "/stoploss <id> <percent|off>"),
    ("portfolio", "/portfolio"),
    ("trades", "/trades"),
];

fn usage(name: &str) -> &'static str {
    USAGE
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, u)| *u)
        .unwrap_or("/help")
}

struct Args<'a> {
    name: &'a str,
    items: Vec<&'a str>,
}

impl<'a> Args<'a> {
    fn require(&self, count: usize) -> Result<(), ParseError> {
        if self.items.len() < count {
            return Err(ParseError::Usage(usage(self.name)));
        }
        Ok(())
    }

    fn get(&self, index: usize) -> Option<&'a str> {
        self.items.get(index).copied()
    }

    fn string(&self, index: usize) -> Result<String, ParseError> {
        self.get(index)
            .map(str::to_string)
            .ok_or(ParseError::Usage(usage(self.name)))
    }

    fn chain(&self, index: usize) -> Result<Chain, ParseError> {
        let raw = self.get(index).ok_or(ParseError::Usage(usage(self.name)))?;
        parse_chain(raw)
    }

    fn amount(&self, index: usize) -> Result<Decimal, ParseError> {
        let raw = self.get(index).ok_or(ParseError::Usage(usage(self.name)))?;
        Decimal::from_str(raw)
            .or_else(|_| Decimal::from_scientific(raw))
            .map_err(|_| ParseError::Invalid(format!("'{raw}' is not a valid number")))
    }

    fn id(&self, index: usize) -> Result<i64, ParseError> {
        let raw = self.get(index).ok_or(ParseError::Usage(usage(self.name)))?;
        raw.trim_start_matches('#')
            .parse()
            .map_err(|_| ParseError::Invalid(format!("'{raw}' is not a valid strategy id")))
    }
}

fn parse_chain(raw: &str) -> Result<Chain, ParseError> {
    raw.parse().map_err(|_| {
        let names: Vec<&str> = Chain::ALL.iter().map(Chain::as_str).collect();
        ParseError::Invalid(format!(
            "Unsupported chain '{raw}'. Use one of: {}",
            names.join(", ")
        ))
    })
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "on" | "yes" | "true" | "1" => Some(true),
        "off" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl Command {
    /// Parse a message. `None` when the text is not a command.
    pub fn parse(text: &str) -> Option<Result<Command, ParseError>> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;
        let mut parts = body.split_whitespace();
        let head = parts.next()?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        if name.is_empty() {
            return None;
        }
        let args = Args {
            name: USAGE
                .iter()
                .map(|(n, _)| *n)
                .find(|n| *n == name)
                .unwrap_or("help"),
            items: parts.collect(),
        };
        Some(Self::build(&name, &args))
    }

    fn build(name: &str, args: &Args<'_>) -> Result<Command, ParseError> {
        let command = match name {
            "start" => Command::Start,
            "help" => Command::Help,
            "addwallet" => {
                args.require(3)?;
                Command::AddWallet {
                    name: args.string(0)?,
                    chain: args.chain(1)?,
                    private_key: args.string(2)?,
                }
            }
            "wallets" => Command::Wallets,
            "removewallet" => {
                args.require(2)?;
                Command::RemoveWallet {
                    name: args.string(0)?,
                    chain: args.chain(1)?,
                }
            }
            "balance" => Command::Balance {
                name: args.get(0).map(str::to_string),
                chain: args.get(1).map(parse_chain).transpose()?,
            },
            "token" => {
                args.require(3)?;
                Command::Token {
                    name: args.string(0)?,
                    chain: args.chain(1)?,
                    token: args.string(2)?,
                }
            }
            "deposit" => {
                args.require(1)?;
                Command::Deposit {
                    name: args.string(0)?,
                    chain: args.get(1).map(parse_chain).transpose()?,
                }
            }
            "send" => {
                args.require(4)?;
                Command::Send {
                    name: args.string(0)?,
                    chain: args.chain(1)?,
                    to: args.string(2)?,
                    amount: args.amount(3)?,
                }
            }
            "sendtoken" => {
                args.require(5)?;
                Command::SendToken {
                    name: args.string(0)?,
                    chain: args.chain(1)?,
                    token: args.string(2)?,
                    to: args.string(3)?,
                    amount: args.amount(4)?,
                }
            }
            "gas" => {
                args.require(4)?;
                Command::Gas {
                    name: args.string(0)?,
                    chain: args.chain(1)?,
                    to: args.string(2)?,
                    amount: args.amount(3)?,
                    token: args.get(4).map(str::to_string),
                }
            }
            "tx" => {
                args.require(2)?;
                Command::Tx {
                    chain: args.chain(0)?,
                    hash: args.string(1)?,
                }
            }
            "history" => Command::History,
            "settings" => Command::Settings,
            "setchain" => {
                args.require(1)?;
                Command::SetChain(args.chain(0)?)
            }
            "setslippage" => {
                args.require(1)?;
                let raw = args.get(0).unwrap_or_default().trim_end_matches('%');
                let pct = Decimal::from_str(raw)
                    .map_err(|_| ParseError::Invalid(format!("'{raw}' is not a valid percentage")))?;
                Command::SetSlippage(pct)
            }
            "notifications" => {
                args.require(1)?;
                let raw = args.get(0).unwrap_or_default();
                let on = parse_switch(raw).ok_or(ParseError::Usage(usage("notifications")))?;
                Command::Notifications(on)
            }
            "strategies" => Command::Strategies,
            "addstrategy" => {
                args.require(3)?;
                let timeframe_raw = args.get(2).unwrap_or_default();
                let timeframe = timeframe_raw.parse().map_err(|_| {
                    ParseError::Invalid(format!(
                        "Unknown timeframe '{timeframe_raw}'. Use 1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w or 1M"
                    ))
                })?;
                let parameters = if args.items.len() > 3 {
                    let raw = args.items[3..].join(" ");
                    let value: Value = serde_json::from_str(&raw)
                        .map_err(|e| ParseError::Invalid(format!("Invalid parameters JSON: {e}")))?;
                    if !value.is_object() {
                        return Err(ParseError::Invalid(
                            "Parameters must be a JSON object".to_string(),
                        ));
                    }
                    value
                } else {
                    Value::Object(Default::default())
                };
                Command::AddStrategy {
                    strategy_type: args.string(0)?.to_lowercase(),
                    symbol: args.string(1)?.to_uppercase(),
                    timeframe,
                    parameters,
                }
            }
            "mystrategies" => Command::MyStrategies,
            "startstrategy" => {
                args.require(1)?;
                Command::StartStrategy(args.id(0)?)
            }
            "stopstrategy" => {
                args.require(1)?;
                Command::StopStrategy(args.id(0)?)
            }
            "removestrategy" => {
                args.require(1)?;
                Command::RemoveStrategy(args.id(0)?)
            }
            "stoploss" => {
                args.require(2)?;
                let raw = args.get(1).unwrap_or_default().trim_end_matches('%');
                let pct = if raw.eq_ignore_ascii_case("off") {
                    None
                } else {
                    let pct = Decimal::from_str(raw).map_err(|_| {
                        ParseError::Invalid(format!("'{raw}' is not a valid percentage"))
                    })?;
                    if pct <= Decimal::ZERO || pct >= Decimal::ONE_HUNDRED {
                        return Err(ParseError::Invalid(
                            "Stop-loss must be between 0 and 100 percent".to_string(),
                        ));
                    }
                    Some(pct)
                };
                Command::StopLoss {
                    id: args.id(0)?,
                    pct,
                }
            }
            "portfolio" => Command::Portfolio,
            "trades" => Command::Trades,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }

    /// Whether the message carries a secret and must not linger in the chat.
    pub fn is_sensitive(&self) -> bool {
        matches!(self, Command::AddWallet { .. })
    }
}
