//! 配置
//!
//! `BotConfig`（令牌、API 地址、请求超时）与 `PollingConfig`（拉取参数、退避与停机等待）
//! 均可从环境变量加载；未设置的项使用默认值。
//!
use crate::error::{BotError, BotResult};
use crate::update::UpdateKind;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// 连接配置
#[derive(Clone)]
pub struct BotConfig {
    /// 机器人令牌（`BOT_TOKEN`，必填）
    pub token: String,
    /// API 根地址（`BOT_API_URL`）
    pub api_url: String,
    /// 单次请求超时（`BOT_REQUEST_TIMEOUT_SECS`），需大于长轮询超时
    pub request_timeout: Duration,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl BotConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn from_env() -> BotResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> BotResult<Self> {
        let token = get("BOT_TOKEN")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| BotError::config("BOT_TOKEN must be set"))?;

        let mut config = Self::new(token.trim());
        if let Some(url) = get("BOT_API_URL").filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }
        if let Some(secs) = parse::<u64>(&get, "BOT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

/// 长轮询配置
#[derive(Clone, Debug)]
pub struct PollingConfig {
    /// 起始游标
    pub offset: i64,
    /// 单批最大更新数（1..=100）
    pub limit: u32,
    /// 服务端长轮询超时
    pub timeout: Duration,
    /// 允许的更新类型；`None` 表示沿用服务端设置
    pub allowed_updates: Option<Vec<UpdateKind>>,
    /// 拉取失败后的固定退避
    pub backoff: Duration,
    /// 停机时等待在途处理的上限
    pub drain_timeout: Duration,
    /// 通过分发队列并发处理；关闭时在轮询循环内逐条等待分发完成
    pub use_queue: bool,
    /// 首次拉取前删除 webhook
    pub delete_webhook: bool,
    /// 删除 webhook 时丢弃积压的更新
    pub drop_pending_updates: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 100,
            timeout: Duration::from_secs(30),
            allowed_updates: None,
            backoff: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(10),
            use_queue: true,
            delete_webhook: false,
            drop_pending_updates: false,
        }
    }
}

impl PollingConfig {
    pub fn from_env() -> BotResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> BotResult<Self> {
        let mut config = Self::default();
        if let Some(limit) = parse::<u32>(&get, "BOT_POLL_LIMIT")? {
            if !(1..=100).contains(&limit) {
                return Err(BotError::config(format!(
                    "BOT_POLL_LIMIT must be within 1..=100, got {limit}"
                )));
            }
            config.limit = limit;
        }
        if let Some(secs) = parse::<u64>(&get, "BOT_POLL_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse::<u64>(&get, "BOT_POLL_BACKOFF_MS")? {
            config.backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64>(&get, "BOT_DRAIN_TIMEOUT_MS")? {
            config.drain_timeout = Duration::from_millis(ms);
        }
        if let Some(list) = get("BOT_ALLOWED_UPDATES") {
            let kinds = list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(UpdateKind::from_str)
                .collect::<BotResult<Vec<_>>>()?;
            config.allowed_updates = Some(kinds);
        }
        Ok(config)
    }

    /// 本地过滤：与发给服务端的 `allowed_updates` 保持一致
    pub fn allows(&self, kind: UpdateKind) -> bool {
        self.allowed_updates
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&kind))
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> BotResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| BotError::config(format!("{key}: {e}"))),
    }
}
