use serde::{Deserialize, Serialize};

use crate::value_objects::{UserId, Username};

/// 用户目录中的用户记录。目录由外部系统维护，这里只读。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Username,
}
