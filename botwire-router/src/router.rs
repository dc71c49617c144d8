use crate::{error::RouterError, handler::UpdateHandler};
use async_trait::async_trait;
use botwire_core::context::{MessageLifecycle, UpdateContext};
use botwire_core::channels;
use botwire_core::polling::Dispatcher;
use botwire_core::{Context, UpdateKind};
use dashmap::DashMap;
use std::sync::{Arc, PoisonError, RwLock};

type HandlerRef = Arc<dyn UpdateHandler>;

/// 基于内存的类型路由表
/// - 通过 `UpdateKind` 注册处理器，同一类型可注册多个
/// - 运行时先取出处理器快照，再按注册顺序依次执行
#[derive(Default)]
pub struct KindRouter {
    handlers: DashMap<UpdateKind, Vec<HandlerRef>>,
    fallback: RwLock<Vec<HandlerRef>>,
}

impl KindRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册某一更新类型的处理器
    pub fn on<H>(&self, kind: UpdateKind, handler: H) -> &Self
    where
        H: UpdateHandler + 'static,
    {
        self.push(kind, Arc::new(handler));
        self
    }

    /// 为全部五种消息生命周期注册同一个处理器
    pub fn on_message<H>(&self, handler: H) -> &Self
    where
        H: UpdateHandler + 'static,
    {
        let handler: HandlerRef = Arc::new(handler);
        for lifecycle in MessageLifecycle::PRIORITY {
            self.push(lifecycle.kind(), handler.clone());
        }
        self
    }

    /// 注册兜底处理器：仅在该类型没有专属处理器时执行
    pub fn fallback<H>(&self, handler: H) -> &Self
    where
        H: UpdateHandler + 'static,
    {
        self.fallback
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
        self
    }

    pub fn handler_count(&self, kind: UpdateKind) -> usize {
        self.handlers.get(&kind).map_or(0, |h| h.len())
    }

    fn push(&self, kind: UpdateKind, handler: HandlerRef) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    fn snapshot(&self, kind: UpdateKind) -> Vec<HandlerRef> {
        // 不跨 await 持有分片锁
        if let Some(handlers) = self.handlers.get(&kind) {
            return handlers.clone();
        }
        self.fallback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 路由一个上下文，返回执行的处理器数量
    pub async fn route(&self, ctx: Context) -> Result<usize, RouterError> {
        let kind = ctx.kind();
        let handlers = self.snapshot(kind);
        if handlers.is_empty() {
            return Err(RouterError::NoHandler { kind });
        }

        for (index, handler) in handlers.iter().enumerate() {
            handler
                .handle(ctx.clone())
                .await
                .map_err(|e| RouterError::Handler {
                    kind,
                    index,
                    reason: format!("{e:#}"),
                })?;
        }
        Ok(handlers.len())
    }
}

#[async_trait]
impl Dispatcher for KindRouter {
    async fn dispatch(&self, ctx: Context) -> anyhow::Result<()> {
        let update_id = ctx.update_id();
        match self.route(ctx).await {
            Ok(_) => Ok(()),
            Err(RouterError::NoHandler { kind }) => {
                tracing::debug!(target: channels::UPDATES, update_id, %kind, "no handler, ignored");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
