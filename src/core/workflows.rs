use crate::core::compliance::non_compliant;
use crate::core::messages;
use crate::core::table_selector::TableSelector;
use crate::domain::model::{GroupMember, OutboundMessage, Period, Recipient};
use crate::domain::ports::{ConfigProvider, DocumentStore, GroupDirectory, Messenger};
use crate::utils::error::{RemindError, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::str::FromStr;

/// The three calendar-driven workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    FirstDay,
    ProgressCheck,
    MonthlyReport,
}

impl Trigger {
    pub const ALL: [Trigger; 3] = [
        Trigger::FirstDay,
        Trigger::ProgressCheck,
        Trigger::MonthlyReport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Trigger::FirstDay => "first-day",
            Trigger::ProgressCheck => "remind",
            Trigger::MonthlyReport => "report",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Trigger {
    type Err = RemindError;

    fn from_str(s: &str) -> Result<Self> {
        Trigger::ALL
            .into_iter()
            .find(|trigger| trigger.name() == s)
            .ok_or_else(|| RemindError::Validation {
                message: format!("Unknown trigger '{}', expected first-day, remind or report", s),
            })
    }
}

#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn handle(&self, trigger: Trigger, now: DateTime<FixedOffset>) -> Result<usize>;
}

/// 每月一號：私訊負責人建立紀錄並提醒群組開始撰寫
pub fn plan_first_day<C: ConfigProvider + ?Sized>(config: &C) -> Vec<OutboundMessage> {
    vec![
        OutboundMessage::to_user(config.person_in_charge_id(), messages::REMIND_PERSON_IN_CHARGE),
        OutboundMessage::to_group(config.group_id(), messages::REMIND_GROUP_MEMBERS_START),
    ]
}

/// Nothing is sent when everybody is done.
pub fn plan_progress_check<C: ConfigProvider + ?Sized>(
    pending: &[GroupMember],
    config: &C,
) -> Vec<OutboundMessage> {
    if pending.is_empty() {
        return Vec::new();
    }
    vec![OutboundMessage::to_group(
        config.group_id(),
        messages::progress_nudge(pending, config.knowledge_tree_url()),
    )]
}

/// Always exactly one message: either the roll-call or the all-complete notice.
pub fn plan_monthly_report<C: ConfigProvider + ?Sized>(
    pending: &[GroupMember],
    config: &C,
) -> Vec<OutboundMessage> {
    vec![OutboundMessage::to_group(
        config.group_id(),
        messages::monthly_report(pending),
    )]
}

pub struct ReminderService<G, D, M, C>
where
    G: GroupDirectory,
    D: DocumentStore,
    M: Messenger,
    C: ConfigProvider,
{
    directory: G,
    store: D,
    messenger: M,
    config: C,
    offset: FixedOffset,
}

impl<G, D, M, C> ReminderService<G, D, M, C>
where
    G: GroupDirectory,
    D: DocumentStore,
    M: Messenger,
    C: ConfigProvider,
{
    pub fn new(directory: G, store: D, messenger: M, config: C, offset: FixedOffset) -> Self {
        Self {
            directory,
            store,
            messenger,
            config,
            offset,
        }
    }

    /// Roster members without a linked record in the latest table.
    pub async fn pending_members(&self) -> Result<Vec<GroupMember>> {
        let members = self
            .directory
            .list_group_members(self.config.group_id())
            .await?;

        let selector = TableSelector::new(&self.store, self.offset);
        let records = match selector.latest_table(self.config.node_token()).await? {
            Some(table) => {
                tracing::debug!("Using latest table {}", table.table_id);
                selector.records(&table).await?
            }
            None => {
                tracing::warn!("Knowledge tree document has no tables, treating as no records");
                Vec::new()
            }
        };
        tracing::info!(
            "Loaded {} group members and {} records",
            members.len(),
            records.len()
        );

        let pending = non_compliant(&members, &records, self.config.white_list());
        let names: Vec<&str> = pending.iter().map(|m| m.name.as_str()).collect();
        tracing::info!("{} members have not written: {:?}", pending.len(), names);
        Ok(pending)
    }

    pub async fn remind_first_day(&self) -> Result<usize> {
        self.deliver(plan_first_day(&self.config)).await
    }

    pub async fn send_remind_message(&self) -> Result<usize> {
        let pending = self.pending_members().await?;
        let planned = plan_progress_check(&pending, &self.config);
        if planned.is_empty() {
            tracing::info!("✅ All group members have written the knowledge tree document");
        }
        self.deliver(planned).await
    }

    pub async fn send_monthly_report(&self, now: DateTime<FixedOffset>) -> Result<usize> {
        // 午夜觸發時回報的是剛結束的月份
        let period = Period::of(&now).previous();
        tracing::info!("Building monthly report for {}", period);
        let pending = self.pending_members().await?;
        self.deliver(plan_monthly_report(&pending, &self.config)).await
    }

    /// Sends in order and stops at the first failure.
    pub async fn deliver(&self, planned: Vec<OutboundMessage>) -> Result<usize> {
        let mut sent = 0;
        for message in planned {
            tracing::debug!("Sending to {}: {}", message.recipient, message.text);
            let result = match &message.recipient {
                Recipient::User(id) => self.messenger.send_direct_message(id, &message.text).await,
                Recipient::Group(id) => self.messenger.send_group_message(id, &message.text).await,
            };
            result.map_err(|e| match e {
                RemindError::SendFailure { .. } => e,
                other => RemindError::SendFailure {
                    target: message.recipient.to_string(),
                    reason: other.to_string(),
                },
            })?;
            sent += 1;
        }
        Ok(sent)
    }
}

#[async_trait]
impl<G, D, M, C> TriggerHandler for ReminderService<G, D, M, C>
where
    G: GroupDirectory,
    D: DocumentStore,
    M: Messenger,
    C: ConfigProvider,
{
    async fn handle(&self, trigger: Trigger, now: DateTime<FixedOffset>) -> Result<usize> {
        match trigger {
            Trigger::FirstDay => self.remind_first_day().await,
            Trigger::ProgressCheck => self.send_remind_message().await,
            Trigger::MonthlyReport => self.send_monthly_report(now).await,
        }
    }
}
