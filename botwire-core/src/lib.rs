//! Bot API 客户端核心库（botwire-core）
//!
//! 提供长轮询机器人客户端的更新摄取与分发核心，用于在应用中实现：
//! - 更新模型（`update`）：带游标的原始更新与固定的更新类型集合
//! - 上下文（`context`）：按更新类型构造的类型化上下文与判别工厂
//! - 出站调用（`api`）：通用 `call(method, params)` 入口、调用点保留与限流重试
//! - 长轮询（`polling`）：游标管理、失败退避、保序并发的分发队列与优雅停机
//! - 配置（`config`）与统一错误类型（`error`）
//!
//! 本 crate 不包含路由/中间件引擎，仅通过 `Dispatcher` 协议将上下文交给外部处理；
//! 传输层通过 `Transport` 协议解耦，默认提供基于 reqwest 的 JSON 实现。
//!
//! 典型用法：
//! 1. 通过 `BotConfig::from_env` 读取令牌与 API 地址，构造 `Api`；
//! 2. 实现 `Dispatcher`（或使用 botwire-router 中的路由表）；
//! 3. 使用 `Poller::builder()` 组装轮询器并 `start`；
//! 4. 停机时调用 `PollingHandle::stop(timeout)` 等待在途处理完成。
//!
pub mod api;
pub mod channels;
pub mod config;
pub mod context;
pub mod error;
#[cfg(feature = "polling")]
pub mod polling;
pub mod update;

pub use api::{Api, Outcome, Transport};
pub use config::{BotConfig, PollingConfig};
pub use context::{Context, ContextFactory};
pub use error::{ApiError, BotError, BotResult};
pub use update::{Update, UpdateKind};

// 允许在本 crate 内部通过 ::botwire_core 进行自引用，
// 以便 `bot_methods!` 生成的代码在本 crate 中也能解析到 ::botwire_core 路径。
extern crate self as botwire_core;
