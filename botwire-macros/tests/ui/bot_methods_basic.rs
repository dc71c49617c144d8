use botwire_core::Api;
use botwire_core::error::BotResult;
use botwire_macros::bot_methods;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;

// 任意提供 `call(method, params)` 的类型都可作为目标
struct Scoped {
    api: Api,
}

impl Scoped {
    #[track_caller]
    fn call<P, T>(&self, method: &str, params: P) -> impl Future<Output = BotResult<T>> + Send + 'static
    where
        P: Serialize,
        T: DeserializeOwned + Send + 'static,
    {
        self.api.call(method, params)
    }
}

bot_methods! {
    impl Scoped {
        /// 关闭
        fn close() -> bool = "close";
        fn pin_message(params) -> bool = "pinChatMessage";
        fn forward(params) -> Value = "forwardMessage";
    }
}

fn main() {
    assert_eq!(Scoped::METHODS, &["close", "pinChatMessage", "forwardMessage"]);

    fn assert_send_static<F: Future + Send + 'static>(_: F) {}

    let api = Api::new(std::sync::Arc::new(NoTransport));
    let scoped = Scoped { api };
    assert_send_static(scoped.close());
    assert_send_static(scoped.pin_message(serde_json::json!({"chat_id": 1, "message_id": 2})));
    assert_send_static(scoped.forward(()));
}

struct NoTransport;

#[async_trait::async_trait]
impl botwire_core::Transport for NoTransport {
    async fn send(
        &self,
        method: &str,
        _params: &Value,
    ) -> BotResult<botwire_core::api::ApiResponse> {
        Err(botwire_core::BotError::transport(method))
    }
}
