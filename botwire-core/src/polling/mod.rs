//! 长轮询子系统（polling）
//!
//! 提供更新拉取与分发的协议与运行时：
//! - `UpdateSource`：按游标拉取一批更新（`Api` 通过 `getUpdates` 实现）；
//! - `Dispatcher`：外部路由/中间件引擎的不透明入口；
//! - `DispatchQueue`：保序启动、无上限并发、可限时排空的分发队列；
//! - `Poller`：游标管理、失败退避与逐条判别，返回可停机的 `PollingHandle`。
//!
pub mod poller;
pub mod queue;

pub use poller::{Poller, PollingHandle};
pub use queue::DispatchQueue;

use crate::api::Api;
use crate::channels;
use crate::context::Context;
use crate::error::BotResult;
use crate::update::{Update, UpdateKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;

/// 分发器：消费判别后的上下文
///
/// 失败由分发器自行处理或返回；队列与轮询循环只负责记录，不做重试。
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, ctx: Context) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Dispatcher for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn dispatch(&self, ctx: Context) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}

/// 一次拉取的参数；除游标外按配置原样转发
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    pub offset: i64,
    pub limit: u32,
    /// 长轮询超时（秒）
    pub timeout: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_updates: Option<Vec<UpdateKind>>,
}

/// 更新来源
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// 拉取 `offset` 及之后的更新；可在服务端阻塞至长轮询超时
    async fn fetch(&self, request: &FetchRequest) -> BotResult<Vec<Update>>;

    /// 首次拉取前的准备，例如删除 webhook
    async fn prepare(&self, _drop_pending_updates: bool) -> BotResult<()> {
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for Api {
    /// 整批只要求是数组；解析失败的元素记录后跳过，不影响同批其它更新
    async fn fetch(&self, request: &FetchRequest) -> BotResult<Vec<Update>> {
        let batch = self.get_updates(request).await?;
        Ok(batch.iter().filter_map(parse_update).collect())
    }

    async fn prepare(&self, drop_pending_updates: bool) -> BotResult<()> {
        self.delete_webhook(json!({ "drop_pending_updates": drop_pending_updates }))
            .await
            .map(|_| ())
    }
}

fn parse_update(raw: &Value) -> Option<Update> {
    match Update::deserialize(raw) {
        Ok(update) => Some(update),
        Err(err) => {
            tracing::warn!(target: channels::UPDATES, %raw, "unreadable update skipped: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_elements_are_dropped_individually() {
        let batch = [
            json!({"update_id": 5, "message": {"text": "a"}}),
            json!({"update_id": "6", "message": {"text": "b"}}),
            json!("garbage"),
            json!({"update_id": 7, "poll": {"id": "p"}}),
        ];
        let ids: Vec<i64> = batch.iter().filter_map(parse_update).map(|u| u.id()).collect();
        assert_eq!(ids, vec![5, 7]);
    }
}
