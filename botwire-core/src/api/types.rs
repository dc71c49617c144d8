//! 出站调用用到的最小返回类型
//!
use serde::{Deserialize, Serialize};

/// `getMe` 返回的机器人账号
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}
