use crate::domain::model::{GroupMember, Record};
use std::collections::HashSet;

/// Ids credited as maintainer on at least one linked record.
pub fn compliant_ids(records: &[Record]) -> HashSet<&str> {
    records
        .iter()
        .filter(|record| record.is_linked())
        .flat_map(|record| record.maintainers.iter().map(|m| m.id.as_str()))
        .collect()
}

/// Members with no linked record this period, excluding the whitelist.
/// Keeps roster order.
pub fn non_compliant<S: AsRef<str>>(
    members: &[GroupMember],
    records: &[Record],
    white_list: &[S],
) -> Vec<GroupMember> {
    let written = compliant_ids(records);
    let exempt: HashSet<&str> = white_list.iter().map(|id| id.as_ref()).collect();

    members
        .iter()
        .filter(|member| {
            !written.contains(member.id.as_str()) && !exempt.contains(member.id.as_str())
        })
        .cloned()
        .collect()
}
