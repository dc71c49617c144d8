//! 长轮询循环（Poller）
//!
//! 统一编排“拉取 → 判别 → 分发”的长驻任务：
//! - 游标由循环独占：每读到一条更新立即推进到 `update_id + 1`，而非处理完成之后；
//! - 拉取失败（传输或远端错误）时游标不变，按固定退避休眠后继续，循环不会自行退出；
//! - 单条更新的判别或分发失败只记录日志，不影响同批后续更新；
//! - 提供停止拉取并限时等待在途分发的 `PollingHandle`。
//!
use super::{Dispatcher, DispatchQueue, FetchRequest, UpdateSource};
use crate::api::Api;
use crate::channels;
use crate::config::PollingConfig;
use crate::context::{Context, ContextFactory, UpdateContext};
use crate::error::BotError;
use crate::update::Update;
use bon::Builder;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::poller_builder::{IsUnset, SetDispatcher, State as BuilderState};

/// Poller：
/// - 按游标从 `UpdateSource` 拉取更新（默认即 `api` 的 `getUpdates`）
/// - 经 `ContextFactory` 判别后交给分发队列或直接交给分发器
#[derive(Builder)]
pub struct Poller {
    /// 上下文持有的 API 句柄，亦为默认的更新来源
    api: Api,
    /// 覆盖更新来源
    source: Option<Arc<dyn UpdateSource>>,
    dispatcher: Arc<dyn Dispatcher>,
    #[builder(default)]
    factory: ContextFactory,
    #[builder(default)]
    config: PollingConfig,
}

impl<S: BuilderState> PollerBuilder<S> {
    pub fn dispatch_with<D>(self, dispatcher: D) -> PollerBuilder<SetDispatcher<S>>
    where
        D: Dispatcher + 'static,
        <S as BuilderState>::Dispatcher: IsUnset,
    {
        self.dispatcher(Arc::new(dispatcher))
    }
}

impl Poller {
    /// 启动轮询，返回可用于停机/等待的句柄
    pub fn start(self: Arc<Self>) -> PollingHandle {
        let token = CancellationToken::new();

        let queue = {
            let dispatcher = self.dispatcher.clone();
            DispatchQueue::new(move |ctx: Context| {
                let dispatcher = dispatcher.clone();
                async move { dispatch_logged(dispatcher.as_ref(), ctx).await }
            })
        };

        let task = tokio::spawn(Self::poll_loop(self.clone(), token.clone(), queue.clone()));

        PollingHandle {
            token,
            task: Some(task),
            queue,
            drain_timeout: self.config.drain_timeout,
        }
    }

    fn fetch_request(&self, offset: i64) -> FetchRequest {
        FetchRequest {
            offset,
            limit: self.config.limit,
            timeout: self.config.timeout.as_secs(),
            allowed_updates: self.config.allowed_updates.clone(),
        }
    }

    async fn poll_loop(
        self: Arc<Self>,
        token: CancellationToken,
        queue: DispatchQueue<Context>,
    ) {
        let source: Arc<dyn UpdateSource> = match &self.source {
            Some(source) => source.clone(),
            None => Arc::new(self.api.clone()),
        };

        if self.config.delete_webhook {
            tokio::select! {
                _ = token.cancelled() => return,
                prepared = source.prepare(self.config.drop_pending_updates) => {
                    if let Err(err) = prepared {
                        tracing::warn!(target: channels::UPDATES, "prepare failed: {err}");
                    }
                }
            }
        }

        let mut offset = self.config.offset;
        tracing::info!(target: channels::UPDATES, offset, "polling started");

        loop {
            let request = self.fetch_request(offset);
            let fetched = tokio::select! {
                _ = token.cancelled() => break,
                fetched = source.fetch(&request) => fetched,
            };

            match fetched {
                Ok(updates) => {
                    tracing::debug!(
                        target: channels::UPDATES,
                        offset,
                        count = updates.len(),
                        "fetched"
                    );
                    for update in updates {
                        offset = offset.max(update.id().saturating_add(1));
                        self.process(update, &queue).await;
                    }
                }
                Err(err) => {
                    let backoff_ms = self.config.backoff.as_millis() as u64;
                    tracing::error!(
                        target: channels::UPDATES,
                        offset,
                        backoff_ms,
                        "fetch failed: {err}"
                    );
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.config.backoff) => {}
                    }
                }
            }
        }

        tracing::info!(target: channels::UPDATES, offset, "polling stopped");
    }

    async fn process(&self, update: Update, queue: &DispatchQueue<Context>) {
        let update_id = update.id();
        let update = Arc::new(update);

        let discriminated = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.factory.discriminate(&self.api, update)
        }));
        let ctx = match discriminated {
            Ok(Ok(ctx)) => ctx,
            Ok(Err(err @ BotError::UnsupportedKind { .. })) => {
                tracing::warn!(target: channels::UPDATES, update_id, "skipped: {err}");
                return;
            }
            Ok(Err(err)) => {
                tracing::error!(target: channels::UPDATES, update_id, "discrimination failed: {err}");
                return;
            }
            Err(_) => {
                tracing::error!(target: channels::UPDATES, update_id, "context constructor panicked");
                return;
            }
        };

        if !self.config.allows(ctx.kind()) {
            tracing::debug!(target: channels::UPDATES, update_id, kind = %ctx.kind(), "filtered");
            return;
        }

        if self.config.use_queue {
            queue.submit(ctx);
        } else {
            dispatch_logged(self.dispatcher.as_ref(), ctx).await;
        }
    }
}

async fn dispatch_logged(dispatcher: &dyn Dispatcher, ctx: Context) {
    let update_id = ctx.update_id();
    let kind = ctx.kind();

    match AssertUnwindSafe(dispatcher.dispatch(ctx)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            tracing::error!(target: channels::UPDATES, update_id, %kind, "dispatch failed: {err:#}");
        }
        Err(_) => {
            tracing::error!(target: channels::UPDATES, update_id, %kind, "dispatch panicked");
        }
    }
}

/// 轮询运行句柄：用于优雅关闭与等待任务结束
pub struct PollingHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
    queue: DispatchQueue<Context>,
    drain_timeout: Duration,
}

impl PollingHandle {
    /// 停止拉取（中断进行中的长轮询或退避），不等待
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn queue(&self) -> &DispatchQueue<Context> {
        &self.queue
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// 等待轮询任务结束（需先 `shutdown`）
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// 停止拉取并限时等待在途分发；返回是否在超时前排空
    pub async fn stop(mut self, timeout: Duration) -> bool {
        self.shutdown();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(target: channels::UPDATES, "polling task failed: {err}");
            }
        }
        self.queue.stop(timeout).await
    }

    /// 以配置的 `drain_timeout` 停止
    pub async fn stop_gracefully(self) -> bool {
        let timeout = self.drain_timeout;
        self.stop(timeout).await
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
