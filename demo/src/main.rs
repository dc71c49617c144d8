//! 回显机器人
//!
//! 环境变量见 `BotConfig::from_env` / `PollingConfig::from_env`，日志级别由 `RUST_LOG` 控制。
//! Ctrl-C 后停止拉取，并在 `BOT_DRAIN_TIMEOUT_MS` 内等待在途回复完成。
//!
use anyhow::Result;
use botwire_core::context::{ChatContext, MessageContext, UpdateContext};
use botwire_core::polling::Poller;
use botwire_core::{Api, BotConfig, BotError, Context, Outcome, PollingConfig, UpdateKind};
use botwire_router::KindRouter;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

async fn echo(msg: &MessageContext) -> Result<()> {
    // 编辑与频道消息不回显
    if msg.lifecycle().is_edit() || msg.lifecycle().is_channel() {
        return Ok(());
    }
    let (Some(chat_id), Some(text)) = (msg.chat_id(), msg.text().or(msg.caption())) else {
        return Ok(());
    };

    // 抑制模式：输入状态失败不影响回复
    let typing = msg
        .api()
        .call_suppressed::<_, bool>(
            "sendChatAction",
            json!({ "chat_id": chat_id, "action": "typing" }),
        )
        .await?;
    if let Outcome::Rejected(err) = typing {
        tracing::warn!("{}", err.trace());
    }

    let params = json!({
        "chat_id": chat_id,
        "text": text,
        "reply_parameters": { "message_id": msg.message_id() },
    });
    match msg
        .api()
        .call_with_retries::<_, Value>("sendMessage", params)
        .await
    {
        Ok(_) => Ok(()),
        Err(BotError::Api(err)) if err.migrate_to_chat_id().is_some() => {
            tracing::warn!(
                from = chat_id,
                to = ?err.migrate_to_chat_id(),
                "chat migrated, reply dropped"
            );
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn router() -> KindRouter {
    let router = KindRouter::new();
    router
        .on_message(|ctx: Context| async move {
            match ctx.as_message() {
                Some(msg) => echo(msg).await,
                None => Ok(()),
            }
        })
        .on(UpdateKind::CallbackQuery, |ctx: Context| async move {
            if let Some(cb) = ctx.as_callback_query() {
                let text = cb.data().map(|d| format!("you pressed {d}"));
                cb.answer(text.as_deref()).await?;
            }
            Ok::<_, anyhow::Error>(())
        })
        .fallback(|ctx: Context| async move {
            tracing::debug!(update_id = ctx.update_id(), kind = %ctx.kind(), "unhandled");
            Ok::<_, anyhow::Error>(())
        });
    router
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let bot = BotConfig::from_env()?;
    let polling = PollingConfig {
        delete_webhook: true,
        ..PollingConfig::from_env()?
    };
    let drain_timeout = polling.drain_timeout;

    let api = Api::from_config(&bot)?;
    let me = api.get_me().await?;
    tracing::info!(id = me.id, username = ?me.username, "connected");

    let poller = Arc::new(
        Poller::builder()
            .api(api)
            .dispatch_with(router())
            .config(polling)
            .build(),
    );
    let handle = poller.start();

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    if handle.stop_gracefully().await {
        tracing::info!("drained");
    } else {
        tracing::warn!(?drain_timeout, "in-flight replies still running at exit");
    }
    Ok(())
}
