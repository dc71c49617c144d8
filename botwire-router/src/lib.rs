//! 参考分发器（botwire-router）
//!
//! 以更新类型为键的并发处理器表，实现 `botwire_core::polling::Dispatcher`：
//! - 同一类型可注册多个处理器，按注册顺序依次执行，首个失败即中止并上抛；
//! - 没有对应处理器的类型交给兜底处理器，仍无处理器时忽略。
//!
//! 不提供过滤器、组合或中间件去重等路由 DSL 能力。
//!
pub mod error;
pub mod handler;
pub mod router;

pub use error::RouterError;
pub use handler::UpdateHandler;
pub use router::KindRouter;
