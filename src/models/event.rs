use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::amount::from_base_units;
use crate::models::parse_timestamp;

/// Storage name for a contract's events, `events_<address>`. Used as the
/// Postgres table and the Mongo collection, so the address is validated
/// before it is ever interpolated into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTable(String);

impl EventTable {
    pub fn for_contract(address: &str) -> AppResult<Self> {
        let address = address.trim().to_ascii_lowercase();
        let valid = address.len() == 42
            && address.starts_with("0x")
            && address[2..].chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(AppError::InvalidArgument(format!(
                "not a contract address: {}",
                address
            )));
        }
        Ok(Self(format!("events_{}", address)))
    }

    pub fn contract_address(&self) -> &str {
        &self.0["events_".len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A marketplace event normalized from one raw `asset_events` entry.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_id: i64,
    pub event_type: String,
    pub event_timestamp: DateTime<Utc>,
    pub asset_id: String,
    pub asset_name: Option<String>,
    pub asset_contract: String,
    pub starting_price: Option<BigDecimal>,
    pub listing_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
    pub bid_amount: Option<BigDecimal>,
    pub total_price: Option<BigDecimal>,
    raw: Value,
}

impl Event {
    pub fn from_value(raw: Value) -> AppResult<Self> {
        let asset = raw
            .get("asset")
            .filter(|a| a.is_object())
            .ok_or_else(|| missing("asset"))?;

        let event_id = raw.get("id").and_then(as_i64).ok_or_else(|| missing("id"))?;

        let event_type = raw
            .get("event_type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| missing("event_type"))?
            .to_string();

        let event_timestamp = raw
            .get("event_timestamp")
            .and_then(|t| t.as_str())
            .ok_or_else(|| missing("event_timestamp"))
            .and_then(parse_timestamp)?;

        let asset_id = match asset.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(missing("asset.id")),
        };

        let asset_name = asset.get("name").and_then(|n| n.as_str()).map(String::from);

        let asset_contract = asset
            .get("asset_contract")
            .and_then(|c| c.get("address"))
            .and_then(|a| a.as_str())
            .ok_or_else(|| missing("asset.asset_contract.address"))?
            .to_string();

        let listing_time = match raw.get("listing_time").and_then(|t| t.as_str()) {
            Some(t) => Some(parse_timestamp(t)?),
            None => None,
        };

        Ok(Self {
            event_id,
            event_type,
            event_timestamp,
            asset_id,
            asset_name,
            asset_contract,
            starting_price: from_base_units(raw.get("starting_price"))?,
            listing_time,
            duration_secs: raw.get("duration").and_then(as_i64),
            bid_amount: from_base_units(raw.get("bid_amount"))?,
            total_price: from_base_units(raw.get("total_price"))?,
            raw,
        })
    }

    /// End of the listing window, when both start and duration are known.
    pub fn listing_end(&self) -> Option<DateTime<Utc>> {
        let start = self.listing_time?;
        let secs = self.duration_secs?;
        start.checked_add_signed(Duration::seconds(secs))
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

fn missing(field: &str) -> AppError {
    AppError::InvalidArgument(format!("event is missing {}", field))
}

/// Ids and durations arrive either as JSON numbers or numeric strings.
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
