//! Outbound message texts. The mention markup and headers are consumed by the
//! Feishu client as-is, so they must stay byte-exact.

use crate::domain::model::GroupMember;

pub const REMIND_PERSON_IN_CHARGE: &str = "请及时创建本月的维护记录";
pub const REMIND_GROUP_MEMBERS_START: &str = "请及时开始写本月的知识树文档";

pub const PROGRESS_HEADER: &str = "滴滴！查询知识树进度：\n";
pub const PROGRESS_LINK_PREFIX: &str = " \n知识树维护链接：";
pub const MONTHLY_REPORT_HEADER: &str = "滴滴！本月未完成知识树的同学：\n";
pub const ALL_COMPLETED: &str = "滴滴！本月知识树文档已全部完成。\n";

pub fn mention(member: &GroupMember) -> String {
    format!("<at user_id=\"{}\">{}</at>", member.id, member.name)
}

pub fn mentions(members: &[GroupMember]) -> String {
    members.iter().map(mention).collect()
}

/// 月中提醒：標記尚未完成的同學並附上知識樹連結
pub fn progress_nudge(members: &[GroupMember], knowledge_tree_url: &str) -> String {
    format!(
        "{}{}{}{}",
        PROGRESS_HEADER,
        mentions(members),
        PROGRESS_LINK_PREFIX,
        knowledge_tree_url
    )
}

pub fn monthly_report(members: &[GroupMember]) -> String {
    if members.is_empty() {
        ALL_COMPLETED.to_string()
    } else {
        format!("{}{}", MONTHLY_REPORT_HEADER, mentions(members))
    }
}
