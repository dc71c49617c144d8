//! 按方法名生成的薄封装
//!
//! 每个封装都是 `#[track_caller]` 的同步函数，直接转发给 `Api::call`，
//! 因此错误轨迹中的调用点是封装的调用者。方法目录本身不在本 crate 的职责内，
//! 这里只收录轮询与示例所需的少量方法；其它方法可直接使用 `Api::call`。
//!
use super::Api;
use super::types::User;
use botwire_macros::bot_methods;
use serde_json::Value;

bot_methods! {
    impl Api {
        /// 获取机器人自身账号信息
        fn get_me() -> User = "getMe";

        /// 长轮询拉取一批更新；逐条解析由调用方负责
        fn get_updates(params) -> Vec<Value> = "getUpdates";

        /// 删除 webhook；长轮询与 webhook 互斥
        fn delete_webhook(params) -> bool = "deleteWebhook";

        fn send_message(params) -> Value = "sendMessage";

        fn edit_message_text(params) -> Value = "editMessageText";

        fn answer_callback_query(params) -> bool = "answerCallbackQuery";

        fn send_chat_action(params) -> bool = "sendChatAction";
    }
}
