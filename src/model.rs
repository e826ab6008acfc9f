use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// A raw ticker statistic reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Buy,
    Sell,
    High,
    Low,
    Avg,
    Vol,
    Vwap,
    Last,
}

impl Field {
    /// Every field, in display order.
    pub const ALL: [Field; 8] = [
        Field::Buy,
        Field::Sell,
        Field::High,
        Field::Low,
        Field::Avg,
        Field::Vol,
        Field::Vwap,
        Field::Last,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Buy => "buy",
            Field::Sell => "sell",
            Field::High => "high",
            Field::Low => "low",
            Field::Avg => "avg",
            Field::Vol => "vol",
            Field::Vwap => "vwap",
            Field::Last => "last",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid ticker json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field `{0}` is missing from the ticker")]
    MissingField(Field),

    #[error("field `{0}` is not numeric")]
    NotNumeric(Field),
}

/// One statistic as the source reported it.
///
/// `raw` keeps the exact text the exchange sent so the report never reformats it.
#[derive(Debug, Clone, PartialEq)]
pub struct Stat {
    pub raw: String,
    pub value: f64,
}

impl Stat {
    /// Try to read a statistic from a json number, a numeric string, or a Mt.Gox style
    /// `{"value": ...}` object.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self {
                raw: n.to_string(),
                value: n.as_f64()?,
            }),
            Value::String(s) => {
                let parsed: f64 = s.trim().parse().ok()?;
                parsed.is_finite().then(|| Self {
                    raw: s.clone(),
                    value: parsed,
                })
            }
            Value::Object(obj) => {
                let nested = obj.get("value")?;
                if nested.is_number() || nested.is_string() {
                    Self::from_value(nested)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct Envelope {
    ticker: Map<String, Value>,
}

/// Immutable market statistics from one successful poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    stats: Vec<Stat>,
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Parse a response body, taking the snapshot from its `ticker` object.
    ///
    /// Any missing or non-numeric field rejects the whole response.
    pub fn from_body(body: &str) -> Result<Self, ParseError> {
        let envelope: Envelope = serde_json::from_str(body)?;
        Self::from_ticker(&envelope.ticker)
    }

    fn from_ticker(ticker: &Map<String, Value>) -> Result<Self, ParseError> {
        let stats = Field::ALL
            .iter()
            .map(|&field| {
                let value = ticker
                    .get(field.name())
                    .ok_or(ParseError::MissingField(field))?;
                Stat::from_value(value).ok_or(ParseError::NotNumeric(field))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            stats,
            fetched_at: Utc::now(),
        })
    }

    pub fn stat(&self, field: Field) -> &Stat {
        &self.stats[field.index()]
    }

    pub fn value(&self, field: Field) -> f64 {
        self.stat(field).value
    }

    /// Sell minus buy, rounded to four decimal places.
    pub fn spread(&self) -> f64 {
        round_half_up((self.value(Field::Sell) - self.value(Field::Buy)) * 10_000.0) / 10_000.0
    }
}

/// Round to the nearest integer with ties going toward positive infinity.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}
