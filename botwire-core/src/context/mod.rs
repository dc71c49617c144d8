//! 上下文（Context）
//!
//! 每条更新在判别后被包装为一个类型化上下文，交给外部分发器：
//! - `ContextEnvelope`：构造所需的全部输入（API 句柄、原始更新、更新类型）；
//! - `UpdateContext` 等能力 trait：以默认方法提供通用读取，由各上下文显式实现；
//! - `Context`：分发用的和类型，消息类的五种生命周期共用 `MessageContext`。
//!
//! 判别与构造表见 `factory`。
//!
mod factory;

pub use factory::{ContextConstructor, ContextFactory};

use crate::api::Api;
use crate::error::BotResult;
use crate::update::{Update, UpdateKind};
use serde_json::{Value, json};
use std::future::Future;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// 构造上下文的输入
#[derive(Clone, Debug)]
pub struct ContextEnvelope {
    api: Api,
    update: Arc<Update>,
    kind: UpdateKind,
}

impl ContextEnvelope {
    pub fn new(api: Api, update: Arc<Update>, kind: UpdateKind) -> Self {
        Self { api, update, kind }
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn update(&self) -> &Arc<Update> {
        &self.update
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    pub fn update_id(&self) -> i64 {
        self.update.id()
    }

    /// 与 `kind` 对应的负载
    pub fn payload(&self) -> &Value {
        self.update.field(self.kind.as_str()).unwrap_or(&NULL)
    }
}

/// 所有上下文共有的读取能力
pub trait UpdateContext {
    fn envelope(&self) -> &ContextEnvelope;

    fn kind(&self) -> UpdateKind {
        self.envelope().kind()
    }

    fn update_id(&self) -> i64 {
        self.envelope().update_id()
    }

    fn payload(&self) -> &Value {
        self.envelope().payload()
    }

    fn update(&self) -> &Update {
        self.envelope().update()
    }

    fn api(&self) -> &Api {
        self.envelope().api()
    }
}

/// 带发送者的上下文
pub trait SenderContext: UpdateContext {
    fn from_id(&self) -> Option<i64> {
        self.payload().pointer("/from/id").and_then(Value::as_i64)
    }

    fn from_username(&self) -> Option<&str> {
        self.payload()
            .pointer("/from/username")
            .and_then(Value::as_str)
    }
}

/// 归属某个会话的上下文
pub trait ChatContext: UpdateContext {
    fn chat_id(&self) -> Option<i64> {
        let payload = self.payload();
        payload
            .pointer("/chat/id")
            .or_else(|| payload.pointer("/message/chat/id"))
            .and_then(Value::as_i64)
    }
}

/// 共用同一消息负载形态的五种生命周期，按判别优先级排列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLifecycle {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    BusinessMessage,
}

impl MessageLifecycle {
    pub const PRIORITY: [MessageLifecycle; 5] = [
        MessageLifecycle::Message,
        MessageLifecycle::EditedMessage,
        MessageLifecycle::ChannelPost,
        MessageLifecycle::EditedChannelPost,
        MessageLifecycle::BusinessMessage,
    ];

    pub fn kind(&self) -> UpdateKind {
        match self {
            MessageLifecycle::Message => UpdateKind::Message,
            MessageLifecycle::EditedMessage => UpdateKind::EditedMessage,
            MessageLifecycle::ChannelPost => UpdateKind::ChannelPost,
            MessageLifecycle::EditedChannelPost => UpdateKind::EditedChannelPost,
            MessageLifecycle::BusinessMessage => UpdateKind::BusinessMessage,
        }
    }

    pub fn from_kind(kind: UpdateKind) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|l| l.kind() == kind)
    }

    /// 按优先级检查原始更新上实际存在的生命周期字段
    pub fn resolve(update: &Update) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|l| update.field(l.kind().as_str()).is_some())
    }

    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            MessageLifecycle::EditedMessage | MessageLifecycle::EditedChannelPost
        )
    }

    pub fn is_channel(&self) -> bool {
        matches!(
            self,
            MessageLifecycle::ChannelPost | MessageLifecycle::EditedChannelPost
        )
    }
}

/// 消息类上下文
#[derive(Clone, Debug)]
pub struct MessageContext {
    envelope: ContextEnvelope,
    lifecycle: MessageLifecycle,
}

impl MessageContext {
    pub fn new(envelope: ContextEnvelope, lifecycle: MessageLifecycle) -> Self {
        Self {
            envelope,
            lifecycle,
        }
    }

    pub fn lifecycle(&self) -> MessageLifecycle {
        self.lifecycle
    }

    pub fn message_id(&self) -> Option<i64> {
        self.payload().get("message_id").and_then(Value::as_i64)
    }

    pub fn text(&self) -> Option<&str> {
        self.payload().get("text").and_then(Value::as_str)
    }

    pub fn caption(&self) -> Option<&str> {
        self.payload().get("caption").and_then(Value::as_str)
    }

    /// 在同一会话中回复本消息
    #[track_caller]
    pub fn reply(
        &self,
        text: &str,
    ) -> impl Future<Output = BotResult<Value>> + Send + 'static {
        let mut params = json!({
            "chat_id": self.chat_id(),
            "text": text,
        });
        if let Some(id) = self.message_id() {
            params["reply_parameters"] = json!({ "message_id": id });
        }
        if let Some(conn) = self.payload().get("business_connection_id") {
            params["business_connection_id"] = conn.clone();
        }
        self.api().send_message(params)
    }
}

impl UpdateContext for MessageContext {
    fn envelope(&self) -> &ContextEnvelope {
        &self.envelope
    }
}

impl SenderContext for MessageContext {}
impl ChatContext for MessageContext {}

/// 回调查询上下文
#[derive(Clone, Debug)]
pub struct CallbackQueryContext {
    envelope: ContextEnvelope,
}

impl CallbackQueryContext {
    pub fn new(envelope: ContextEnvelope) -> Self {
        Self { envelope }
    }

    pub fn id(&self) -> Option<&str> {
        self.payload().get("id").and_then(Value::as_str)
    }

    pub fn data(&self) -> Option<&str> {
        self.payload().get("data").and_then(Value::as_str)
    }

    /// 应答回调查询；`text` 为空时只结束客户端的加载状态
    #[track_caller]
    pub fn answer(
        &self,
        text: Option<&str>,
    ) -> impl Future<Output = BotResult<bool>> + Send + 'static {
        let mut params = json!({ "callback_query_id": self.id() });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        self.api().answer_callback_query(params)
    }
}

impl UpdateContext for CallbackQueryContext {
    fn envelope(&self) -> &ContextEnvelope {
        &self.envelope
    }
}

impl SenderContext for CallbackQueryContext {}
impl ChatContext for CallbackQueryContext {}

/// 其余更新类型的通用上下文
#[derive(Clone, Debug)]
pub struct GenericContext {
    envelope: ContextEnvelope,
}

impl GenericContext {
    pub fn new(envelope: ContextEnvelope) -> Self {
        Self { envelope }
    }
}

impl UpdateContext for GenericContext {
    fn envelope(&self) -> &ContextEnvelope {
        &self.envelope
    }
}

impl SenderContext for GenericContext {}
impl ChatContext for GenericContext {}

/// 分发给外部分发器的上下文
#[derive(Clone, Debug)]
pub enum Context {
    Message(MessageContext),
    CallbackQuery(CallbackQueryContext),
    Generic(GenericContext),
}

impl Context {
    pub fn as_message(&self) -> Option<&MessageContext> {
        match self {
            Context::Message(ctx) => Some(ctx),
            _ => None,
        }
    }

    pub fn as_callback_query(&self) -> Option<&CallbackQueryContext> {
        match self {
            Context::CallbackQuery(ctx) => Some(ctx),
            _ => None,
        }
    }
}

impl UpdateContext for Context {
    fn envelope(&self) -> &ContextEnvelope {
        match self {
            Context::Message(ctx) => ctx.envelope(),
            Context::CallbackQuery(ctx) => ctx.envelope(),
            Context::Generic(ctx) => ctx.envelope(),
        }
    }
}

impl SenderContext for Context {}
impl ChatContext for Context {}
