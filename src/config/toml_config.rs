use crate::core::scheduler::CalendarRule;
use crate::core::workflows::Trigger;
use crate::core::ConfigProvider;
use crate::utils::error::{RemindError, Result};
use crate::utils::validation::{self, Validate};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub feishu: FeishuConfig,
    pub info: InfoConfig,
    #[serde(default)]
    pub white_list: Vec<String>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeishuConfig {
    pub app_id: String,
    pub app_secret: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub timeout_seconds: Option<u64>,
    /// Id type of chat members and the whitelist (`open_id`, `user_id`, `union_id`).
    #[serde(default = "default_member_id_type")]
    pub member_id_type: String,
    /// Id type of `info.person_in_charge_id`; falls back to `member_id_type`.
    #[serde(default)]
    pub person_in_charge_id_type: Option<String>,
}

impl FeishuConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    /// `receive_id_type` for direct messages to the person in charge.
    pub fn direct_message_id_type(&self) -> &str {
        self.person_in_charge_id_type
            .as_deref()
            .unwrap_or(&self.member_id_type)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoConfig {
    pub group_id: String,
    pub node_token: String,
    pub person_in_charge_id: String,
    pub knowledge_tree_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 部署時區，分鐘為單位 (UTC+8 = 480)
    pub utc_offset_minutes: i32,
    pub first_day_hour: u32,
    pub check_days: Vec<u32>,
    pub check_hour: u32,
    pub report_hour: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 480,
            first_day_hour: 10,
            check_days: vec![15, 23],
            check_hour: 10,
            report_hour: 0,
        }
    }
}

fn default_base_url() -> String {
    "https://open.feishu.cn".to_string()
}

fn default_member_id_type() -> String {
    "open_id".to_string()
}

const MEMBER_ID_TYPES: [&str; 3] = ["open_id", "user_id", "union_id"];

impl ScheduleConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            RemindError::InvalidConfigValueError {
                field: "schedule.utc_offset_minutes".to_string(),
                value: self.utc_offset_minutes.to_string(),
                reason: "Offset must be within ±24 hours".to_string(),
            }
        })
    }

    /// 一號提醒、月中檢查 (15/23 號) 與月初午夜的月報
    pub fn rules(&self) -> Vec<(Trigger, CalendarRule)> {
        vec![
            (
                Trigger::FirstDay,
                CalendarRule::monthly(&[1], self.first_day_hour, 0),
            ),
            (
                Trigger::ProgressCheck,
                CalendarRule::monthly(&self.check_days, self.check_hour, 0),
            ),
            (
                Trigger::MonthlyReport,
                CalendarRule::monthly(&[1], self.report_hour, 0),
            ),
        ]
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RemindError::Io)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RemindError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${FEISHU_APP_SECRET})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RemindError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        self.schedule.offset()
    }
}

impl ConfigProvider for AppConfig {
    fn group_id(&self) -> &str {
        &self.info.group_id
    }

    fn person_in_charge_id(&self) -> &str {
        &self.info.person_in_charge_id
    }

    fn node_token(&self) -> &str {
        &self.info.node_token
    }

    fn knowledge_tree_url(&self) -> &str {
        &self.info.knowledge_tree_url
    }

    fn white_list(&self) -> &[String] {
        &self.white_list
    }
}

fn validate_id_type(field: &str, value: &str) -> Result<()> {
    if MEMBER_ID_TYPES.contains(&value) {
        return Ok(());
    }
    Err(RemindError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: format!("Valid id types: {}", MEMBER_ID_TYPES.join(", ")),
    })
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_non_empty_string("feishu.app_id", &self.feishu.app_id)?;
        validation::validate_non_empty_string("feishu.app_secret", &self.feishu.app_secret)?;
        if self.feishu.app_secret.starts_with("${") {
            return Err(RemindError::MissingConfigError {
                field: format!("feishu.app_secret (unset {})", self.feishu.app_secret),
            });
        }
        validation::validate_url("feishu.base_url", &self.feishu.base_url)?;
        validate_id_type("feishu.member_id_type", &self.feishu.member_id_type)?;
        if let Some(id_type) = &self.feishu.person_in_charge_id_type {
            validate_id_type("feishu.person_in_charge_id_type", id_type)?;
        }

        validation::validate_non_empty_string("info.group_id", &self.info.group_id)?;
        validation::validate_non_empty_string("info.node_token", &self.info.node_token)?;
        validation::validate_non_empty_string(
            "info.person_in_charge_id",
            &self.info.person_in_charge_id,
        )?;
        validation::validate_url("info.knowledge_tree_url", &self.info.knowledge_tree_url)?;
        validation::validate_id_list("white_list", &self.white_list)?;

        validation::validate_range(
            "schedule.utc_offset_minutes",
            self.schedule.utc_offset_minutes,
            -12 * 60,
            14 * 60,
        )?;
        validation::validate_range("schedule.first_day_hour", self.schedule.first_day_hour, 0, 23)?;
        validation::validate_range("schedule.check_hour", self.schedule.check_hour, 0, 23)?;
        validation::validate_range("schedule.report_hour", self.schedule.report_hour, 0, 23)?;
        for day in &self.schedule.check_days {
            validation::validate_range("schedule.check_days", *day, 1, 31)?;
        }
        Ok(())
    }
}
