//! 统一错误定义
//!
//! 聚焦出站调用（远端拒绝、传输、序列化）与更新判别的最小必要集合：
//! - `ApiError`：远端拒绝的结构化错误，携带方法、参数、错误码、限流提示与原始调用点；
//! - `BotError`：本 crate 所有操作的统一错误类型。
//!
use bon::Builder;
use serde_json::Value;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 远端限流错误码
pub const TOO_MANY_REQUESTS: i64 = 429;

/// 原始调用点：在发起调用的同步阶段捕获，异步执行开始之前
#[derive(Clone, Debug)]
pub struct CallSite {
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

impl CallSite {
    /// 捕获调用者位置；堆栈仅在 `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` 开启时采集
    #[track_caller]
    pub fn capture() -> Self {
        Self {
            location: Location::caller(),
            backtrace: Arc::new(Backtrace::capture()),
        }
    }

    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

/// 远端拒绝的调用
#[derive(Debug, Clone, Builder)]
pub struct ApiError {
    /// 远端方法名
    #[builder(into)]
    method: String,
    /// 发送的参数
    #[builder(default)]
    params: Value,
    /// 远端错误码
    code: i64,
    /// 远端错误描述
    #[builder(into)]
    description: String,
    /// 限流提示：需等待的时长
    retry_after: Option<Duration>,
    /// 群组迁移后的新 chat id
    migrate_to_chat_id: Option<i64>,
    /// 其它机器可读的附加信息
    detail: Option<Value>,
    /// 原始调用点
    call_site: Option<CallSite>,
}

impl ApiError {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn params(&self) -> &Value {
        &self.params
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    pub fn migrate_to_chat_id(&self) -> Option<i64> {
        self.migrate_to_chat_id
    }

    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    pub fn call_site(&self) -> Option<&CallSite> {
        self.call_site.as_ref()
    }

    /// 是否为限流错误：带有等待提示，或错误码为 429（此时可能没有提示）
    pub fn is_rate_limited(&self) -> bool {
        self.retry_after.is_some() || self.code == TOO_MANY_REQUESTS
    }

    pub fn with_call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = Some(call_site);
        self
    }

    /// 对外报告的调用轨迹
    ///
    /// 首行为 `"<method>: <description>"`，随后是原始调用者的 `file:line:column`，
    /// 若采集了堆栈则追加调用点的堆栈帧，而非通用调用层内部的帧。
    pub fn trace(&self) -> String {
        let mut out = self.to_string();
        if let Some(site) = &self.call_site {
            let loc = site.location();
            out.push_str(&format!(
                "\n    at {}:{}:{}",
                loc.file(),
                loc.line(),
                loc.column()
            ));
            if site.backtrace().status() == BacktraceStatus::Captured {
                let frames = caller_frames(&site.backtrace().to_string());
                if !frames.is_empty() {
                    out.push('\n');
                    out.push_str(&frames);
                }
            }
        }
        out
    }
}

// 堆栈采集与通用调用层自身的帧
const PLUMBING_FRAMES: [&str; 3] = [
    "std::backtrace",
    "botwire_core::error::CallSite",
    "botwire_core::api::",
];

/// 去掉渲染后堆栈开头属于调用层内部的帧，从原始调用者开始保留
fn caller_frames(rendered: &str) -> String {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in rendered.lines() {
        let is_header = line
            .trim_start()
            .split_once(": ")
            .is_some_and(|(n, _)| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()));
        if !is_header {
            if let Some(frame) = frames.last_mut() {
                frame.push(line);
                continue;
            }
        }
        frames.push(vec![line]);
    }
    frames
        .into_iter()
        .skip_while(|frame| PLUMBING_FRAMES.iter().any(|p| frame[0].contains(p)))
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.method, self.description)
    }
}

impl std::error::Error for ApiError {}

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BotError {
    // --- 出站调用 ---
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("transport error: {reason}")]
    Transport { reason: String },
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 更新判别 ---
    #[error("unsupported update kind: update_id={update_id}, kind={kind}")]
    UnsupportedKind { update_id: i64, kind: String },
    #[error("malformed update: update_id={update_id}, reason={reason}")]
    MalformedUpdate { update_id: i64, reason: String },

    // --- 配置 ---
    #[error("invalid config: {reason}")]
    Config { reason: String },
}

impl BotError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        self.as_api().is_some_and(ApiError::is_rate_limited)
    }
}

/// 统一 Result 类型别名
pub type BotResult<T> = Result<T, BotError>;

#[cfg(feature = "http")]
impl From<reqwest::Error> for BotError {
    // 请求地址中含有令牌，不能进入错误信息
    fn from(err: reqwest::Error) -> Self {
        BotError::Transport {
            reason: err.without_url().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejected() -> ApiError {
        ApiError::builder()
            .method("sendMessage")
            .params(json!({"chat_id": 1}))
            .code(400)
            .description("Bad Request: chat not found")
            .build()
    }

    #[test]
    fn display_is_method_and_description() {
        assert_eq!(rejected().to_string(), "sendMessage: Bad Request: chat not found");
        let err: BotError = rejected().into();
        assert_eq!(err.to_string(), "sendMessage: Bad Request: chat not found");
    }

    #[test]
    fn trace_begins_with_message_and_points_at_caller() {
        let line = line!() + 1;
        let err = rejected().with_call_site(CallSite::capture());
        let trace = err.trace();

        assert!(trace.starts_with("sendMessage: Bad Request: chat not found\n"));
        assert!(trace.contains(&format!("{}:{}", file!(), line)));
    }

    #[test]
    fn internal_frames_are_stripped_from_the_top() {
        let rendered = "\
   0: std::backtrace::Backtrace::create
             at /rustc/library/std/src/backtrace.rs:331:13
   1: botwire_core::error::CallSite::capture
             at ./src/error.rs:32:35
   2: botwire_core::api::Api::call
             at ./src/api/mod.rs:170:24
   3: echo_bot::reply
             at ./src/main.rs:40:9
   4: botwire_core::api::Api::call_with_retries
             at ./src/api/mod.rs:200:1";

        let frames = caller_frames(rendered);
        assert!(frames.starts_with("   3: echo_bot::reply\n"));
        assert!(frames.contains("./src/main.rs:40:9"));
        assert!(!frames.contains("CallSite::capture"));
        assert!(!frames.contains("Backtrace::create"));
        // 调用者之后的帧原样保留
        assert!(frames.ends_with("./src/api/mod.rs:200:1"));
    }

    #[test]
    fn rate_limit_classification() {
        let limited = ApiError::builder()
            .method("sendMessage")
            .code(TOO_MANY_REQUESTS)
            .description("Too Many Requests: retry after 3")
            .retry_after(Duration::from_secs(3))
            .build();
        assert!(limited.is_rate_limited());
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(3)));
        assert!(BotError::from(limited).is_rate_limited());

        let hinted = ApiError::builder()
            .method("sendMessage")
            .code(400)
            .description("Bad Request: flood control")
            .retry_after(Duration::from_secs(1))
            .build();
        assert!(hinted.is_rate_limited());

        assert!(!rejected().is_rate_limited());
        assert!(!BotError::transport("connection reset").is_rate_limited());
    }
}
