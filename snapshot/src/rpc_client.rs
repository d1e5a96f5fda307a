use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use log::{debug, trace, warn};
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;
use url::Url;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Invalid RPC url '{0}'")]
    InvalidUrl(String),
    #[error("Unable to build HTTP client: {0}")]
    Client(String),
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {0}: {1}")]
    Http(u16, String),
    #[error("Failed to parse JSON response: {0}")]
    Parse(String),
    #[error("RPC error {code}: {message}")]
    JsonRpc { code: i64, message: String },
    #[error("No result in response")]
    MissingResult,
    #[error("Invalid hex result: {0}")]
    InvalidHex(String),
}

impl RpcError {
    // Node side rejections and malformed payloads will not change on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RpcError::Timeout(_) | RpcError::Connect(_) | RpcError::Network(_) | RpcError::Http(..)
        )
    }
}

/// Read-only access to an EVM chain.
#[async_trait]
pub trait EthCall: Send + Sync {
    /// Chain id reported by the endpoint
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// Execute a call against the latest block and return the raw output
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError>;
}

/// Configuration for RPC retries and timeouts
#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub connection_timeout: Duration,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, serde::Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, serde::Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 client over HTTP
pub struct RpcClient {
    client: Client,
    url: Url,
    config: RpcClientConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(rpc_url: &str) -> Result<Self, RpcError> {
        Self::with_config(rpc_url, RpcClientConfig::default())
    }

    pub fn with_config(rpc_url: &str, config: RpcClientConfig) -> Result<Self, RpcError> {
        let url = Url::parse(rpc_url).map_err(|_| RpcError::InvalidUrl(rpc_url.to_string()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(RpcError::InvalidUrl(rpc_url.to_string()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Make a JSON-RPC request with retry logic
    async fn make_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                if log::log_enabled!(log::Level::Warn) {
                    warn!(
                        "Retrying {} on {} (attempt {}/{})",
                        method, self.url, attempt, self.config.max_retries
                    );
                }
                sleep(self.config.retry_delay).await;
            }

            match self.make_single_request(method, params.clone()).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() {
                        debug!("Not retrying {} due to non-retryable error: {}", method, e);
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(RpcError::MissingResult))
    }

    /// Make a single JSON-RPC request without retry logic
    async fn make_single_request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        if log::log_enabled!(log::Level::Trace) {
            trace!("JSON-RPC request {} #{} to {}", method, request.id, self.url);
        }

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout(self.config.request_timeout)
                } else if e.is_connect() {
                    RpcError::Connect(e.to_string())
                } else {
                    RpcError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown error").to_string(),
            ));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Parse(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(RpcError::JsonRpc {
                code: error.code,
                message: error.message,
            });
        }

        rpc_response.result.ok_or(RpcError::MissingResult)
    }
}

#[async_trait]
impl EthCall for RpcClient {
    // Single attempt, never retried
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let result = self.make_single_request("eth_chainId", Value::Array(Vec::new())).await?;
        parse_quantity(&result)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcError> {
        let params = json!([
            {
                "to": to.to_string(),
                "data": format!("0x{}", hex::encode(&data)),
            },
            "latest"
        ]);
        let result = self.make_request("eth_call", params).await?;
        parse_data(&result)
    }
}

fn as_hex_str(value: &Value) -> Result<&str, RpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| RpcError::InvalidHex(value.to_string()))?;
    Ok(s.strip_prefix("0x").unwrap_or(s))
}

/// Parse a hex encoded quantity such as `"0x2105"`
pub fn parse_quantity(value: &Value) -> Result<u64, RpcError> {
    let digits = as_hex_str(value)?;
    if digits.is_empty() {
        return Err(RpcError::InvalidHex(value.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|_| RpcError::InvalidHex(value.to_string()))
}

/// Parse hex encoded call output such as `"0x"` or `"0x00ff"`
pub fn parse_data(value: &Value) -> Result<Bytes, RpcError> {
    let digits = as_hex_str(value)?;
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|_| RpcError::InvalidHex(value.to_string()))
}
