/// 长轮询（内存版）示例
/// 展示 Feed -> Poller -> DispatchQueue -> Dispatcher -> Api 的闭环，
/// 以及分发失败不影响游标推进、停机时等待在途处理
use anyhow::Result as AnyResult;
use async_trait::async_trait;
use botwire_core::api::{Api, ApiResponse, Transport};
use botwire_core::context::{Context, UpdateContext};
use botwire_core::polling::{FetchRequest, Poller, UpdateSource};
use botwire_core::{BotResult, PollingConfig, Update};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

// ============================================================================
// 内存更新源（UpdateSource）
// ============================================================================

struct InMemoryFeed {
    rx: Mutex<mpsc::UnboundedReceiver<Update>>,
}

#[async_trait]
impl UpdateSource for InMemoryFeed {
    async fn fetch(&self, request: &FetchRequest) -> BotResult<Vec<Update>> {
        let mut rx = self.rx.lock().await;
        let wait = Duration::from_secs(request.timeout);

        let mut batch = Vec::new();
        // 长轮询：没有新更新时阻塞到超时
        if let Ok(Some(first)) = tokio::time::timeout(wait, rx.recv()).await {
            batch.push(first);
        }
        while batch.len() < request.limit as usize {
            match rx.try_recv() {
                Ok(update) => batch.push(update),
                Err(_) => break,
            }
        }
        batch.retain(|u| u.id() >= request.offset);
        Ok(batch)
    }
}

// ============================================================================
// 打印请求的传输（Transport）
// ============================================================================

struct PrintingTransport;

#[async_trait]
impl Transport for PrintingTransport {
    async fn send(&self, method: &str, params: &Value) -> BotResult<ApiResponse> {
        println!("-> {method} {params}");
        if params["text"] == "forbidden" {
            return Ok(ApiResponse::failure(403, "Forbidden: bot was blocked by the user"));
        }
        Ok(ApiResponse::success(json!({"message_id": 1000})))
    }
}

fn message(id: i64, text: &str) -> BotResult<Update> {
    Update::from_value(json!({
        "update_id": id,
        "message": {"message_id": id, "chat": {"id": 42}, "text": text}
    }))
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> AnyResult<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let api = Api::new(Arc::new(PrintingTransport));

    let poller = Arc::new(
        Poller::builder()
            .api(api)
            .source(Arc::new(InMemoryFeed { rx: Mutex::new(rx) }))
            .dispatch_with(|ctx: Context| async move {
                let Some(msg) = ctx.as_message() else {
                    return Ok(());
                };
                tokio::time::sleep(Duration::from_millis(50)).await;
                let text = format!("echo: {}", msg.text().unwrap_or_default());
                match msg.reply(&text).await {
                    Ok(_) => println!("<- replied to update {}", ctx.update_id()),
                    Err(err) => {
                        // 失败只影响本条更新
                        if let Some(api_err) = err.as_api() {
                            println!("<- {}", api_err.trace());
                        }
                        return Err(err.into());
                    }
                }
                Ok::<_, anyhow::Error>(())
            })
            .config(PollingConfig {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })
            .build(),
    );
    let handle = poller.start();

    tx.send(message(1, "hello")?)?;
    tx.send(message(2, "forbidden")?)?;
    tx.send(Update::from_value(json!({"update_id": 3, "poll": {"id": "p1"}}))?)?;
    tx.send(message(4, "bye")?)?;

    tokio::time::sleep(Duration::from_millis(20)).await;
    let drained = handle.stop(Duration::from_secs(1)).await;
    println!("drained = {drained}");
    Ok(())
}
