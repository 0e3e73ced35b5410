use crate::core::workflows::Trigger;
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "ktree-remind")]
#[command(about = "Knowledge-tree progress reminders for a Feishu group")]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/config.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Log outgoing messages instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Run a single workflow now and exit (first-day, remind, report)
    #[arg(long, value_name = "TRIGGER")]
    pub once: Option<Trigger>,
}
