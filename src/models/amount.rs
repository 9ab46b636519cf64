use bigdecimal::BigDecimal;
use serde_json::Value;
use std::str::FromStr;

use crate::error::{AppError, AppResult};

/// Decimal places of the chain's native unit (wei → ether).
pub const BASE_UNIT_DECIMALS: i64 = 18;

/// Normalizes a monetary field.
///
/// Strings carry integer base units and are scaled down by 10^18. Numbers are
/// taken to be already converted and pass through unchanged. `null` or a
/// missing field yields `None`.
pub fn from_base_units(value: Option<&Value>) -> AppResult<Option<BigDecimal>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let units = BigDecimal::from_str(s.trim())
                .map_err(|_| AppError::InvalidArgument(format!("not an amount: {}", s)))?;
            let (digits, scale) = units.into_bigint_and_exponent();
            Ok(Some(BigDecimal::new(digits, scale + BASE_UNIT_DECIMALS)))
        }
        Some(Value::Number(n)) => BigDecimal::from_str(&n.to_string())
            .map(Some)
            .map_err(|_| AppError::InvalidArgument(format!("not an amount: {}", n))),
        Some(other) => Err(AppError::InvalidArgument(format!(
            "unexpected amount type: {}",
            other
        ))),
    }
}
