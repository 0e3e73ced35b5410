use chrono::Utc;
use clap::Parser;
use ktree_remind::core::ConfigProvider;
use ktree_remind::domain::ports::Messenger;
use ktree_remind::utils::error::ErrorSeverity;
use ktree_remind::utils::{logger, validation::Validate};
use ktree_remind::{
    AppConfig, CliArgs, DryRunMessenger, FeishuClient, RemindError, ReminderService, Scheduler,
    TriggerHandler,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    logger::init_logger(logger::LogFormat::from_flag(args.json_logs), args.verbose);

    tracing::info!("🚀 Starting ktree-remind v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("📁 Loading configuration from: {}", args.config);

    let config = match AppConfig::from_file(&args.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };
    tracing::info!(
        "✅ Configuration loaded: group {}, {} whitelisted members",
        config.group_id(),
        config.white_list().len()
    );

    let offset = config.offset().unwrap_or_else(|e| exit_with(e));
    let rules = config.schedule.rules();

    let client = Arc::new(FeishuClient::new(&config.feishu).unwrap_or_else(|e| exit_with(e)));
    let messenger: Arc<dyn Messenger> = if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - messages will be logged, not sent");
        Arc::new(DryRunMessenger::new())
    } else {
        client.clone()
    };

    let service = ReminderService::new(client.clone(), client, messenger, config, offset);

    if let Some(trigger) = args.once {
        let now = Utc::now().with_timezone(&offset);
        tracing::info!("Running '{}' once", trigger);
        match service.handle(trigger, now).await {
            Ok(sent) => {
                tracing::info!("✅ '{}' completed, {} messages sent", trigger, sent);
                return Ok(());
            }
            Err(e) => exit_with(e),
        }
    }

    // 排程缺任何一項都不允許啟動
    let mut scheduler = Scheduler::new(service, offset);
    if let Err(e) = scheduler.register_all(rules) {
        exit_with(e);
    }

    scheduler.run().await;
    Ok(())
}

fn exit_with(e: RemindError) -> ! {
    tracing::error!("❌ {} (Severity: {:?})", e, e.severity());
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,   // 下個週期可重試
        ErrorSeverity::High => 1,     // 配置錯誤
        ErrorSeverity::Critical => 3, // 排程不完整
    };
    std::process::exit(exit_code);
}
