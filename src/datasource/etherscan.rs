use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::config::EtherscanConfig;
use crate::datasource::http::RetryingClient;
use crate::datasource::{GasOracle, OracleResponse};
use crate::error::AppResult;

/// Etherscan gas tracker. Each call is a single request; a failed status is
/// reported back rather than retried.
#[derive(Clone)]
pub struct EtherscanGasOracle {
    client: Client,
    api_url: String,
    api_key: String,
}

impl EtherscanGasOracle {
    pub fn new(config: &EtherscanConfig) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl GasOracle for EtherscanGasOracle {
    async fn fetch_gas_oracle(&self) -> AppResult<OracleResponse> {
        let url = RetryingClient::build_url(
            &self.api_url,
            &[
                ("module", Some("gastracker".to_string())),
                ("action", Some("gasoracle".to_string())),
                ("apikey", Some(self.api_key.clone())),
            ],
        )?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Ok(OracleResponse::Failed(status));
        }

        let body: Value = response.json().await?;
        Ok(OracleResponse::Success(body))
    }
}
