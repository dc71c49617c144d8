use async_trait::async_trait;
use botwire_core::Context;
use std::future::Future;

/// 单个更新处理器
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, ctx: Context) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> UpdateHandler for F
where
    F: Fn(Context) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, ctx: Context) -> anyhow::Result<()> {
        (self)(ctx).await
    }
}
