//! 更新模型（Update）
//!
//! 远端推送的原始更新：一个服务端分配、单调不减的 `update_id`，
//! 以及固定命名集合中恰好一个被填充的负载字段。
//!
use crate::error::{BotError, BotResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 更新类型：负载字段名的封闭集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    BusinessConnection,
    BusinessMessage,
    EditedBusinessMessage,
    DeletedBusinessMessages,
    MessageReaction,
    MessageReactionCount,
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
    PurchasedPaidMedia,
    Poll,
    PollAnswer,
    MyChatMember,
    ChatMember,
    ChatJoinRequest,
    ChatBoost,
    RemovedChatBoost,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 23] = [
        UpdateKind::Message,
        UpdateKind::EditedMessage,
        UpdateKind::ChannelPost,
        UpdateKind::EditedChannelPost,
        UpdateKind::BusinessConnection,
        UpdateKind::BusinessMessage,
        UpdateKind::EditedBusinessMessage,
        UpdateKind::DeletedBusinessMessages,
        UpdateKind::MessageReaction,
        UpdateKind::MessageReactionCount,
        UpdateKind::InlineQuery,
        UpdateKind::ChosenInlineResult,
        UpdateKind::CallbackQuery,
        UpdateKind::ShippingQuery,
        UpdateKind::PreCheckoutQuery,
        UpdateKind::PurchasedPaidMedia,
        UpdateKind::Poll,
        UpdateKind::PollAnswer,
        UpdateKind::MyChatMember,
        UpdateKind::ChatMember,
        UpdateKind::ChatJoinRequest,
        UpdateKind::ChatBoost,
        UpdateKind::RemovedChatBoost,
    ];

    /// 负载字段名
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::Message => "message",
            UpdateKind::EditedMessage => "edited_message",
            UpdateKind::ChannelPost => "channel_post",
            UpdateKind::EditedChannelPost => "edited_channel_post",
            UpdateKind::BusinessConnection => "business_connection",
            UpdateKind::BusinessMessage => "business_message",
            UpdateKind::EditedBusinessMessage => "edited_business_message",
            UpdateKind::DeletedBusinessMessages => "deleted_business_messages",
            UpdateKind::MessageReaction => "message_reaction",
            UpdateKind::MessageReactionCount => "message_reaction_count",
            UpdateKind::InlineQuery => "inline_query",
            UpdateKind::ChosenInlineResult => "chosen_inline_result",
            UpdateKind::CallbackQuery => "callback_query",
            UpdateKind::ShippingQuery => "shipping_query",
            UpdateKind::PreCheckoutQuery => "pre_checkout_query",
            UpdateKind::PurchasedPaidMedia => "purchased_paid_media",
            UpdateKind::Poll => "poll",
            UpdateKind::PollAnswer => "poll_answer",
            UpdateKind::MyChatMember => "my_chat_member",
            UpdateKind::ChatMember => "chat_member",
            UpdateKind::ChatJoinRequest => "chat_join_request",
            UpdateKind::ChatBoost => "chat_boost",
            UpdateKind::RemovedChatBoost => "removed_chat_boost",
        }
    }

    pub fn from_field(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_field(s.trim()).ok_or_else(|| BotError::config(format!("unknown update kind: {s}")))
    }
}

/// 原始更新
///
/// 反序列化只要求 `update_id`，其余字段原样保留；负载字段的唯一性
/// 在判别阶段校验，以便单条畸形更新不影响整批的游标推进。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    #[serde(rename = "update_id")]
    id: i64,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Update {
    pub fn from_value(raw: Value) -> BotResult<Self> {
        Ok(serde_json::from_value(raw)?)
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// 取出非空的字段
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// 唯一被填充的负载字段名
    pub fn kind_name(&self) -> BotResult<&str> {
        let mut populated = self
            .fields
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, _)| k.as_str());

        match (populated.next(), populated.next()) {
            (Some(name), None) => Ok(name),
            (None, _) => Err(BotError::MalformedUpdate {
                update_id: self.id,
                reason: "no payload field".to_string(),
            }),
            (Some(first), Some(second)) => Err(BotError::MalformedUpdate {
                update_id: self.id,
                reason: format!("several payload fields: {first}, {second}"),
            }),
        }
    }

    /// 已知的更新类型；未知字段名返回 `None`
    pub fn kind(&self) -> Option<UpdateKind> {
        self.kind_name().ok().and_then(UpdateKind::from_field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_is_the_single_populated_field() {
        let update = Update::from_value(json!({"update_id": 1, "message": {"text": "hi"}})).unwrap();
        assert_eq!(update.id(), 1);
        assert_eq!(update.kind_name().unwrap(), "message");
        assert_eq!(update.kind(), Some(UpdateKind::Message));
        assert_eq!(update.field("message").unwrap()["text"], "hi");
    }

    #[test]
    fn null_fields_are_not_payloads() {
        let update =
            Update::from_value(json!({"update_id": 2, "message": null, "poll": {"id": "p"}}))
                .unwrap();
        assert_eq!(update.kind(), Some(UpdateKind::Poll));
        assert!(update.field("message").is_none());
    }

    #[test]
    fn zero_or_several_payloads_are_malformed() {
        let empty = Update::from_value(json!({"update_id": 3})).unwrap();
        assert!(matches!(
            empty.kind_name(),
            Err(BotError::MalformedUpdate { update_id: 3, .. })
        ));

        let double =
            Update::from_value(json!({"update_id": 4, "message": {}, "poll": {}})).unwrap();
        assert!(matches!(double.kind_name(), Err(BotError::MalformedUpdate { .. })));
        assert_eq!(double.kind(), None);
    }

    #[test]
    fn unknown_field_has_a_name_but_no_kind() {
        let update = Update::from_value(json!({"update_id": 5, "story": {}})).unwrap();
        assert_eq!(update.kind_name().unwrap(), "story");
        assert_eq!(update.kind(), None);
    }

    #[test]
    fn missing_update_id_fails_to_parse() {
        assert!(matches!(
            Update::from_value(json!({"message": {}})),
            Err(BotError::Serde { .. })
        ));
    }

    #[test]
    fn kind_names_round_trip_through_serde() {
        for kind in UpdateKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
            assert_eq!(kind.as_str().parse::<UpdateKind>().unwrap(), kind);
        }
        assert!("stories".parse::<UpdateKind>().is_err());
    }
}
