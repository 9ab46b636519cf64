use async_trait::async_trait;
use std::sync::Arc;

use crate::datasource::{GasOracle, OracleResponse};
use crate::error::AppResult;
use crate::models::GasPrice;
use crate::scheduler::Job;
use crate::storage::RelationalStore;

/// Samples the gas oracle once per tick and stores the result.
///
/// A non-200 answer is only logged; the next tick is the retry.
pub struct GasPriceJob {
    oracle: Arc<dyn GasOracle>,
    store: Arc<dyn RelationalStore>,
}

impl GasPriceJob {
    pub fn new(oracle: Arc<dyn GasOracle>, store: Arc<dyn RelationalStore>) -> Self {
        Self { oracle, store }
    }
}

#[async_trait]
impl Job for GasPriceJob {
    async fn execute(&self) -> AppResult<()> {
        let body = match self.oracle.fetch_gas_oracle().await? {
            OracleResponse::Success(body) => body,
            OracleResponse::Failed(status) => {
                tracing::warn!("Gas oracle failed with code {}", status.as_u16());
                return Ok(());
            }
        };

        let price = GasPrice::from_response(&body)?;
        tracing::debug!("Gas {:?}", price);

        let row = self.store.insert_gas_price(&price).await?;
        tracing::info!("Gas added to DB (row {})", row);
        Ok(())
    }
}
