//! 基于 reqwest 的 JSON 传输
//!
//! 每次调用 `POST {api_url}/bot{token}/{method}`，请求体为 JSON 参数；
//! 远端对失败请求同样返回响应信封（如 400/429），因此不以 HTTP 状态码判定失败。
//!
use super::{ApiResponse, Transport};
use crate::config::BotConfig;
use crate::error::{BotError, BotResult};
use async_trait::async_trait;
use serde_json::Value;

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
}

impl HttpTransport {
    /// 请求超时需大于长轮询超时，否则 `getUpdates` 会在服务端返回前被客户端中断
    pub fn new(config: &BotConfig) -> BotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &BotConfig) -> Self {
        let base = format!(
            "{}/bot{}",
            config.api_url.trim_end_matches('/'),
            config.token
        );
        Self { client, base }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, method: &str, params: &Value) -> BotResult<ApiResponse> {
        let response = self
            .client
            .post(format!("{}/{}", self.base, method))
            .json(params)
            .send()
            .await?;

        let status = response.status();
        response.json::<ApiResponse>().await.map_err(|e| {
            BotError::transport(format!("{method}: unreadable response (status {status}): {}", e.without_url()))
        })
    }
}
