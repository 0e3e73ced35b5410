use chrono::{DateTime, Datelike, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 知識樹表格中的一位維護人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    pub id: String,
}

/// 富文本欄位中的一個超連結片段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub token: String,
    pub text: String,
    pub mention_type: String,
}

/// One parsed row of the knowledge-tree bitable.
///
/// Re-derived from the raw row on every query; it carries no state of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub multi_line_text: String,
    pub maintainers: Vec<Maintainer>,
    pub one_line_introduction: String,
    /// Empty means the entry has not been linked to a wiki node yet.
    pub node_link: Vec<Link>,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub like_count: i64,
}

impl Record {
    /// 有維護節點連結才算一筆有效的知識樹紀錄
    pub fn is_linked(&self) -> bool {
        !self.node_link.is_empty()
    }

    pub fn period(&self, offset: FixedOffset) -> Option<Period> {
        Period::from_timestamp_millis(self.timestamp, offset)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub id: String,
    pub name: String,
}

impl GroupMember {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Handle to one bitable table; one table per reporting period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Table {
    pub app_token: String,
    pub table_id: String,
}

/// A reporting period: one calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Buckets a millisecond timestamp into its month under the given offset.
    /// Sub-second precision is dropped before conversion.
    pub fn from_timestamp_millis(millis: i64, offset: FixedOffset) -> Option<Self> {
        let utc = DateTime::from_timestamp(millis.div_euclid(1000), 0)?;
        Some(Self::of(&utc.with_timezone(&offset)))
    }

    pub fn of(time: &DateTime<FixedOffset>) -> Self {
        Self {
            year: time.year(),
            month: time.month(),
        }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self::new(self.year - 1, 12)
        } else {
            Self::new(self.year, self.month - 1)
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// 推送目標：個人私訊或群組
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    User(String),
    Group(String),
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recipient::User(id) => write!(f, "user {}", id),
            Recipient::Group(id) => write!(f, "chat {}", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: Recipient,
    pub text: String,
}

impl OutboundMessage {
    pub fn to_user(user_id: &str, text: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::User(user_id.to_string()),
            text: text.into(),
        }
    }

    pub fn to_group(group_id: &str, text: impl Into<String>) -> Self {
        Self {
            recipient: Recipient::Group(group_id.to_string()),
            text: text.into(),
        }
    }
}
