use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemindError {
    #[error("Field '{field}' is malformed: {reason}")]
    ParseField { field: String, reason: String },

    #[error("Failed to register schedule '{rule}': {reason}")]
    ScheduleRegistration { rule: String, reason: String },

    #[error("Failed to send message to {target}: {reason}")]
    SendFailure { target: String, reason: String },

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Feishu API returned code {code}: {msg}")]
    FeishuApi { code: i64, msg: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    Validation { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// 單列資料問題，略過即可
    Low,
    /// 單次觸發失敗，下個週期會再執行
    Medium,
    /// 配置錯誤，無法啟動
    High,
    /// 排程不完整，必須中止
    Critical,
}

impl RemindError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RemindError::ParseField { .. } => ErrorSeverity::Low,
            RemindError::SendFailure { .. }
            | RemindError::Api(_)
            | RemindError::FeishuApi { .. }
            | RemindError::Serialization(_) => ErrorSeverity::Medium,
            RemindError::Io(_)
            | RemindError::ConfigValidationError { .. }
            | RemindError::InvalidConfigValueError { .. }
            | RemindError::MissingConfigError { .. }
            | RemindError::Validation { .. } => ErrorSeverity::High,
            RemindError::ScheduleRegistration { .. } => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RemindError::ParseField { .. } => "檢查知識樹表格中該欄位的類型是否被修改",
            RemindError::ScheduleRegistration { .. } => "檢查 [schedule] 區段的日期與時間設定",
            RemindError::SendFailure { .. } => "確認機器人仍在群組內且具有發送訊息權限",
            RemindError::Api(_) => "檢查網路連線與 feishu.base_url 設定",
            RemindError::FeishuApi { .. } => "確認應用權限 (im, wiki, docx, bitable) 已開通",
            RemindError::Io(_) => "確認配置檔案路徑存在且可讀取",
            RemindError::Serialization(_) => "API 回應格式與預期不符，請檢查 API 版本",
            RemindError::ConfigValidationError { .. }
            | RemindError::InvalidConfigValueError { .. }
            | RemindError::MissingConfigError { .. }
            | RemindError::Validation { .. } => "修正配置檔案後重新啟動",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.severity() {
            ErrorSeverity::Low => format!("資料警告: {}", self),
            ErrorSeverity::Medium => format!("本次執行失敗: {}", self),
            ErrorSeverity::High => format!("配置錯誤: {}", self),
            ErrorSeverity::Critical => format!("嚴重錯誤: {}", self),
        }
    }

    pub fn parse_field(field: &str, reason: impl Into<String>) -> Self {
        RemindError::ParseField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RemindError>;
