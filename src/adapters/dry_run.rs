use crate::domain::model::OutboundMessage;
use crate::domain::ports::Messenger;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Logs outgoing messages instead of delivering them (`--dry-run`).
#[derive(Debug, Default)]
pub struct DryRunMessenger {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl DryRunMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 目前為止攔截到的訊息
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    fn record(&self, message: OutboundMessage) {
        tracing::info!("🔍 DRY RUN - would send to {}:\n{}", message.recipient, message.text);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
    }
}

#[async_trait]
impl Messenger for DryRunMessenger {
    async fn send_direct_message(&self, user_id: &str, text: &str) -> Result<()> {
        self.record(OutboundMessage::to_user(user_id, text));
        Ok(())
    }

    async fn send_group_message(&self, group_id: &str, text: &str) -> Result<()> {
        self.record(OutboundMessage::to_group(group_id, text));
        Ok(())
    }
}
