pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;

pub use adapters::{DryRunMessenger, FeishuClient};
pub use config::AppConfig;
pub use core::scheduler::{CalendarRule, Scheduler};
pub use core::workflows::{ReminderService, Trigger, TriggerHandler};
pub use utils::error::{RemindError, Result};
