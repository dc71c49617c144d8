//! 分发队列（DispatchQueue）
//!
//! 每个提交的条目恰好交给处理函数一次：
//! - 处理函数按 `submit` 的顺序被调用（同步部分按 FIFO 执行），返回的 future 各自 spawn，
//!   并发不设上限，慢处理不会阻塞后续条目的启动；
//! - 在途处理记录在 pending 集合中，结束（成功、失败或 panic）时移除；
//!   处理函数同步部分的 panic 只影响该条目；
//! - `stop(timeout)` 等待队列与 pending 集合同时为空或超时，随后永久停用队列：
//!   不会取消在途处理，只是不再启动新条目。
//!
//! 需要在 tokio 运行时内使用。
//!
use crate::channels;
use futures_util::future::BoxFuture;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

type HandlerFn<T> = Arc<dyn Fn(T) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct DispatchQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for DispatchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T> {
    handler: HandlerFn<T>,
    state: Mutex<State<T>>,
    drained: Notify,
}

struct State<T> {
    items: VecDeque<T>,
    pending: HashSet<u64>,
    next_id: u64,
    active: bool,
    // 同一时刻只有一个排空循环，保证跨线程提交时的启动顺序
    draining: bool,
}

impl<T> State<T> {
    fn is_idle(&self) -> bool {
        self.items.is_empty() && self.pending.is_empty()
    }
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> DispatchQueue<T> {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: HandlerFn<T> =
            Arc::new(move |item| -> BoxFuture<'static, ()> { Box::pin(handler(item)) });
        Self {
            inner: Arc::new(Inner {
                handler,
                state: Mutex::new(State {
                    items: VecDeque::new(),
                    pending: HashSet::new(),
                    next_id: 0,
                    active: true,
                    draining: false,
                }),
                drained: Notify::new(),
            }),
        }
    }

    /// 入队并执行一次排空
    pub fn submit(&self, item: T) {
        {
            let mut state = self.inner.lock();
            state.items.push_back(item);
            if state.draining {
                return;
            }
            state.draining = true;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let (item, id) = {
                let mut state = self.inner.lock();
                let next = if state.active {
                    state.items.pop_front()
                } else {
                    None
                };
                let Some(item) = next else {
                    state.draining = false;
                    return;
                };
                let id = state.next_id;
                state.next_id += 1;
                state.pending.insert(id);
                (item, id)
            };

            let settle = Settle {
                inner: self.inner.clone(),
                id,
            };
            // 同步部分的 panic 在此吸收，排空循环照常继续
            let handler = &self.inner.handler;
            let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(item))) {
                Ok(fut) => fut,
                Err(_) => {
                    tracing::error!(target: channels::UPDATES, "handler panicked before start");
                    drop(settle);
                    continue;
                }
            };
            tokio::spawn(async move {
                let _settle = settle;
                fut.await;
            });
        }
    }

    /// 等待排空或超时，随后永久停用；返回是否在超时前排空
    pub async fn stop(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, self.idle()).await.is_ok();
        self.inner.lock().active = false;
        drained
    }

    async fn idle(&self) {
        loop {
            let notified = self.inner.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.lock().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// 尚未启动的条目数
    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 在途处理数
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }
}

// 在途处理的结算：正常结束与 panic 展开都会在 drop 时移除
struct Settle<T> {
    inner: Arc<Inner<T>>,
    id: u64,
}

impl<T> Drop for Settle<T> {
    fn drop(&mut self) {
        let idle = {
            let mut state = self.inner.lock();
            state.pending.remove(&self.id);
            state.is_idle()
        };
        if idle {
            self.inner.drained.notify_waiters();
        }
    }
}
