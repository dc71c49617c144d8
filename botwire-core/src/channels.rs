//! 日志通道
//!
//! 以 `tracing` target 的形式区分两类调试输出，便于通过 `RUST_LOG` 单独开启，
//! 例如 `RUST_LOG=botwire::api=debug`。
//!

/// 出站调用（每次 `call` 的请求、拒绝与限流重试）
pub const API: &str = "botwire::api";

/// 更新摄取（拉取、退避、判别与分发）
pub const UPDATES: &str = "botwire::updates";
