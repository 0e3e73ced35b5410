// Adapters layer: concrete implementations of the domain ports.

pub mod dry_run;
pub mod feishu;

pub use dry_run::DryRunMessenger;
pub use feishu::FeishuClient;
