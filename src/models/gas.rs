use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Raw `result` object of the gas oracle; every field arrives as a string.
#[derive(Debug, Deserialize)]
struct OracleResult {
    #[serde(rename = "LastBlock")]
    last_block: String,
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: String,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: String,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: String,
    #[serde(rename = "suggestBaseFee")]
    suggest_base_fee: String,
    #[serde(rename = "gasUsedRatio")]
    gas_used_ratio: String,
}

/// One gas oracle sample, prices in gwei.
#[derive(Debug, Clone, PartialEq)]
pub struct GasPrice {
    pub last_block: i64,
    pub safe_gas: BigDecimal,
    pub norm_gas: BigDecimal,
    pub fast_gas: BigDecimal,
    pub base_fee: BigDecimal,
    pub gas_used_ratio: String,
}

impl GasPrice {
    /// Parses the body of a successful oracle response.
    pub fn from_response(body: &Value) -> AppResult<Self> {
        let result = body
            .get("result")
            .filter(|r| r.is_object())
            .ok_or_else(|| {
                AppError::InvalidArgument(format!("gas oracle returned no result: {}", body))
            })?;
        let raw: OracleResult = serde_json::from_value(result.clone())?;

        Ok(Self {
            last_block: raw.last_block.trim().parse().map_err(|_| {
                AppError::InvalidArgument(format!("bad LastBlock: {}", raw.last_block))
            })?,
            safe_gas: decimal("SafeGasPrice", &raw.safe_gas_price)?,
            norm_gas: decimal("ProposeGasPrice", &raw.propose_gas_price)?,
            fast_gas: decimal("FastGasPrice", &raw.fast_gas_price)?,
            base_fee: decimal("suggestBaseFee", &raw.suggest_base_fee)?,
            gas_used_ratio: raw.gas_used_ratio,
        })
    }
}

fn decimal(field: &str, raw: &str) -> AppResult<BigDecimal> {
    BigDecimal::from_str(raw.trim())
        .map_err(|_| AppError::InvalidArgument(format!("bad {}: {}", field, raw)))
}
