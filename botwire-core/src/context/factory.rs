//! 上下文工厂（ContextFactory）
//!
//! 更新类型 → 构造函数的查找表，以及一次性的判别：
//! 1. 更新类型 = 除 `update_id` 外唯一被填充的字段名；
//! 2. 消息类字段（五种生命周期共用同一负载形态）在构造前按固定优先级解析出具体生命周期，
//!    直接构造该生命周期的上下文，不会先构造再丢弃一个通用上下文；
//! 3. 查表构造；没有构造函数的类型视为不支持。
//!
use super::{
    CallbackQueryContext, Context, ContextEnvelope, GenericContext, MessageContext,
    MessageLifecycle,
};
use crate::api::Api;
use crate::error::{BotError, BotResult};
use crate::update::{Update, UpdateKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 构造函数：由构造输入得到上下文
pub type ContextConstructor = Arc<dyn Fn(ContextEnvelope) -> Context + Send + Sync>;

#[derive(Clone)]
pub struct ContextFactory {
    constructors: HashMap<UpdateKind, ContextConstructor>,
}

impl fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.constructors.keys().map(UpdateKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("ContextFactory").field("kinds", &kinds).finish()
    }
}

impl Default for ContextFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        for kind in UpdateKind::ALL {
            if let Some(lifecycle) = MessageLifecycle::from_kind(kind) {
                factory.register(kind, move |envelope| {
                    Context::Message(MessageContext::new(envelope, lifecycle))
                });
            } else if kind == UpdateKind::CallbackQuery {
                factory.register(kind, |envelope| {
                    Context::CallbackQuery(CallbackQueryContext::new(envelope))
                });
            } else {
                factory.register(kind, |envelope| {
                    Context::Generic(GenericContext::new(envelope))
                });
            }
        }
        factory
    }
}

impl ContextFactory {
    /// 不含任何构造函数的工厂
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// 注册（或覆盖）某一更新类型的构造函数
    pub fn register<F>(&mut self, kind: UpdateKind, constructor: F) -> &mut Self
    where
        F: Fn(ContextEnvelope) -> Context + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
        self
    }

    /// 移除某一更新类型的构造函数，此后该类型视为不支持
    pub fn unregister(&mut self, kind: UpdateKind) -> &mut Self {
        self.constructors.remove(&kind);
        self
    }

    pub fn supports(&self, kind: UpdateKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// 判别一条更新的具体类型；消息类字段解析为具体生命周期
    pub fn resolve_kind(&self, update: &Update) -> BotResult<UpdateKind> {
        let name = update.kind_name()?;
        let kind = UpdateKind::from_field(name).ok_or_else(|| BotError::UnsupportedKind {
            update_id: update.id(),
            kind: name.to_string(),
        })?;

        if MessageLifecycle::from_kind(kind).is_none() {
            return Ok(kind);
        }
        MessageLifecycle::resolve(update)
            .map(|lifecycle| lifecycle.kind())
            .ok_or_else(|| BotError::MalformedUpdate {
                update_id: update.id(),
                reason: format!("{name} carries no message payload"),
            })
    }

    /// 判别并构造上下文
    pub fn discriminate(&self, api: &Api, update: Arc<Update>) -> BotResult<Context> {
        let kind = self.resolve_kind(&update)?;
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or_else(|| BotError::UnsupportedKind {
                update_id: update.id(),
                kind: kind.to_string(),
            })?;

        Ok(constructor(ContextEnvelope::new(api.clone(), update, kind)))
    }
}
