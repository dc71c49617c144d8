//! 出站调用（Api）
//!
//! 所有远端方法都经过同一个通用入口 `call(method, params)`：
//! - 在同步阶段捕获原始调用点，保证错误轨迹指向调用者而非通用调用层；
//! - 将失败响应转换为结构化的 `ApiError`；
//! - 支持两种交付方式：抛出（`call`，拒绝以 `Err` 返回）与抑制
//!   （`call_suppressed`，拒绝以 `Outcome::Rejected` 值返回），二者内容与轨迹一致；
//! - 可选的限流重试（`call_with_retries` / `retry::with_retries`）。
//!
//! 按方法名生成的薄封装见 `methods`，传输协议见 `Transport`。
//!
#[cfg(feature = "http")]
pub mod http;
mod methods;
pub mod retry;
pub mod types;

use crate::channels;
use crate::error::{ApiError, BotResult, CallSite};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use retry::with_retries;

/// 传输协议：发送一次请求并返回响应信封
///
/// 传输只负责编码与收发；HTTP 层面的成功与否由信封中的 `ok` 决定。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, method: &str, params: &Value) -> BotResult<ApiResponse>;
}

/// 响应信封 `{ok, result?, description?, error_code?, parameters?}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ResponseParameters>,
}

/// 失败响应中的机器可读附加信息
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrate_to_chat_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiResponse {
    pub fn success(result: Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            ..Default::default()
        }
    }

    pub fn failure(code: i64, description: impl Into<String>) -> Self {
        Self {
            ok: false,
            error_code: Some(code),
            description: Some(description.into()),
            ..Default::default()
        }
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.parameters.get_or_insert_with(Default::default).retry_after = Some(seconds);
        self
    }

    /// 失败信封转换为结构化错误
    fn into_api_error(self, method: &str, params: Value, call_site: CallSite) -> ApiError {
        let parameters = self.parameters.unwrap_or_default();
        let detail = (!parameters.extra.is_empty()).then(|| Value::Object(parameters.extra));

        ApiError::builder()
            .method(method)
            .params(params)
            .code(self.error_code.unwrap_or_default())
            .description(self.description.unwrap_or_else(|| "unknown error".to_string()))
            .maybe_retry_after(parameters.retry_after.map(Duration::from_secs))
            .maybe_migrate_to_chat_id(parameters.migrate_to_chat_id)
            .maybe_detail(detail)
            .call_site(call_site)
            .build()
    }
}

/// 抑制模式下一次调用的结果：正常值或以值返回的远端拒绝
#[derive(Debug)]
pub enum Outcome<T> {
    Value(T),
    Rejected(ApiError),
}

impl<T> Outcome<T> {
    /// 转为抛出模式
    pub fn into_result(self) -> BotResult<T> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Rejected(err) => Err(err.into()),
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejected(&self) -> Option<&ApiError> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Rejected(err) => Some(err),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }
}

/// 远端 API 句柄，克隆成本低
#[derive(Clone)]
pub struct Api {
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}

impl Api {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// 基于配置创建 HTTP 传输
    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::config::BotConfig) -> BotResult<Self> {
        Ok(Self::new(Arc::new(HttpTransport::new(config)?)))
    }

    /// 抛出模式：远端拒绝以 `Err(BotError::Api)` 返回
    #[track_caller]
    pub fn call<P, T>(
        &self,
        method: &str,
        params: P,
    ) -> impl Future<Output = BotResult<T>> + Send + 'static
    where
        P: Serialize,
        T: DeserializeOwned + Send + 'static,
    {
        let call = self.prepare(method, params);
        async move { call.execute::<T>().await?.into_result() }
    }

    /// 抑制模式：远端拒绝以 `Outcome::Rejected` 值返回，传输/序列化错误仍以 `Err` 返回
    #[track_caller]
    pub fn call_suppressed<P, T>(
        &self,
        method: &str,
        params: P,
    ) -> impl Future<Output = BotResult<Outcome<T>>> + Send + 'static
    where
        P: Serialize,
        T: DeserializeOwned + Send + 'static,
    {
        let call = self.prepare(method, params);
        async move { call.execute::<T>().await }
    }

    /// 抛出模式 + 限流重试：每次重试复用同一个调用点
    #[track_caller]
    pub fn call_with_retries<P, T>(
        &self,
        method: &str,
        params: P,
    ) -> impl Future<Output = BotResult<T>> + Send + 'static
    where
        P: Serialize,
        T: DeserializeOwned + Send + 'static,
    {
        let call = self.prepare(method, params);
        async move {
            with_retries(|| {
                let call = call.clone();
                async move { call.execute::<T>().await?.into_result().map(Outcome::Value) }
            })
            .await?
            .into_result()
        }
    }

    #[track_caller]
    fn prepare<P: Serialize>(&self, method: &str, params: P) -> PreparedCall {
        PreparedCall {
            transport: self.transport.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params).map(|v| match v {
                Value::Null => Value::Object(Map::new()),
                other => other,
            }),
            call_site: CallSite::capture(),
        }
    }
}

/// 已捕获调用点、尚未执行的调用
struct PreparedCall {
    transport: Arc<dyn Transport>,
    method: String,
    params: Result<Value, serde_json::Error>,
    call_site: CallSite,
}

impl Clone for PreparedCall {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            method: self.method.clone(),
            // serde_json::Error 不可克隆；失败的序列化在首次执行时即返回，不会进入重试
            params: match &self.params {
                Ok(v) => Ok(v.clone()),
                Err(e) => Err(serde::ser::Error::custom(e.to_string())),
            },
            call_site: self.call_site.clone(),
        }
    }
}

impl PreparedCall {
    async fn execute<T: DeserializeOwned>(self) -> BotResult<Outcome<T>> {
        let params = self.params?;
        tracing::debug!(target: channels::API, method = %self.method, %params, "call");

        let response = self.transport.send(&self.method, &params).await?;
        if response.ok {
            let result = response.result.unwrap_or(Value::Null);
            return Ok(Outcome::Value(serde_json::from_value(result)?));
        }

        let err = response.into_api_error(&self.method, params, self.call_site);
        tracing::debug!(
            target: channels::API,
            method = %err.method(),
            code = err.code(),
            retry_after = ?err.retry_after(),
            "call rejected: {}",
            err.description()
        );
        Ok(Outcome::Rejected(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, Value)>>,
        reply: Mutex<Option<ApiResponse>>,
    }

    #[async_trait]
    impl Transport for Recording {
        async fn send(&self, method: &str, params: &Value) -> BotResult<ApiResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), params.clone()));
            Ok(self
                .reply
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| ApiResponse::success(json!(true))))
        }
    }

    #[tokio::test]
    async fn unit_params_are_sent_as_empty_object() {
        let transport = Arc::new(Recording::default());
        let api = Api::new(transport.clone());

        let ok: bool = api.call("close", ()).await.unwrap();
        assert!(ok);
        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls[0], ("close".to_string(), json!({})));
    }

    #[tokio::test]
    async fn failure_envelope_carries_detail() {
        let transport = Arc::new(Recording::default());
        let mut reply = ApiResponse::failure(400, "Bad Request: group chat was upgraded");
        reply.parameters = Some(ResponseParameters {
            migrate_to_chat_id: Some(-100123),
            extra: Map::from_iter([("hint".to_string(), json!("migrate"))]),
            ..Default::default()
        });
        *transport.reply.lock().unwrap() = Some(reply);
        let api = Api::new(transport);

        let outcome = api
            .call_suppressed::<_, Value>("sendMessage", json!({"chat_id": -1}))
            .await
            .unwrap();
        let err = outcome.rejected().unwrap();
        assert_eq!(err.code(), 400);
        assert_eq!(err.migrate_to_chat_id(), Some(-100123));
        assert_eq!(err.detail(), Some(&json!({"hint": "migrate"})));
        assert_eq!(err.params(), &json!({"chat_id": -1}));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn result_type_mismatch_is_a_serde_error() {
        let transport = Arc::new(Recording::default());
        let api = Api::new(transport);

        let err = api.call::<_, i64>("close", ()).await.unwrap_err();
        assert!(matches!(err, BotError::Serde { .. }));
    }
}
