//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。错误总是局限在单个元素或单个任务上，
//! 不会中断整页翻译。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误（连接失败、请求发送失败等）
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 接口返回非 2xx 状态
    #[error("API 请求失败 (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// 模型返回内容不符合预期格式
    #[error("API 返回格式不正确")]
    InvalidResponse,

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 设置持久化错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// DOM 操作错误
    #[error("DOM 操作错误: {0}")]
    DomError(String),

    /// 占位符还原错误
    #[error("占位符还原错误: {0}")]
    PlaceholderError(String),

    /// 译文语言与目标语言不符
    #[error("译文语言不符: 期望 {expected}")]
    LanguageMismatch { expected: String },

    /// 批量翻译结果形状不符
    #[error("批量翻译结果不匹配: 期望 {expected} 条, 实际 {actual} 条")]
    BatchMismatch { expected: usize, actual: usize },

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 请求队列已关闭
    #[error("请求队列已关闭")]
    QueueClosed,

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkError(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ApiError { status, .. } => *status == 429 || *status >= 500,
            TranslationError::InvalidResponse => true,
            TranslationError::LanguageMismatch { .. } => true,
            TranslationError::BatchMismatch { .. } => true,
            TranslationError::CacheError(_) => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::StorageError(_) => false,
            TranslationError::DomError(_) => false,
            TranslationError::PlaceholderError(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::QueueClosed => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::ApiError { .. } => ErrorSeverity::Error,
            TranslationError::InvalidResponse => ErrorSeverity::Error,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::StorageError(_) => ErrorSeverity::Warning,
            TranslationError::DomError(_) => ErrorSeverity::Error,
            TranslationError::PlaceholderError(_) => ErrorSeverity::Warning,
            TranslationError::LanguageMismatch { .. } => ErrorSeverity::Warning,
            TranslationError::BatchMismatch { .. } => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::QueueClosed => ErrorSeverity::Critical,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::ApiError { .. } => ErrorCategory::Endpoint,
            TranslationError::InvalidResponse => ErrorCategory::ModelOutput,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::DomError(_) => ErrorCategory::Dom,
            TranslationError::PlaceholderError(_) => ErrorCategory::ModelOutput,
            TranslationError::LanguageMismatch { .. } => ErrorCategory::ModelOutput,
            TranslationError::BatchMismatch { .. } => ErrorCategory::ModelOutput,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::QueueClosed => ErrorCategory::Concurrency,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::ConfigError(ref mut msg)
            | TranslationError::NetworkError(ref mut msg)
            | TranslationError::InvalidInput(ref mut msg)
            | TranslationError::CacheError(ref mut msg)
            | TranslationError::StorageError(ref mut msg)
            | TranslationError::DomError(ref mut msg)
            | TranslationError::PlaceholderError(ref mut msg)
            | TranslationError::TimeoutError(ref mut msg)
            | TranslationError::ParseError(ref mut msg)
            | TranslationError::SerializationError(ref mut msg)
            | TranslationError::InternalError(ref mut msg) => {
                *msg = format!("{} (上下文: {})", msg, context);
            }
            TranslationError::ApiError { ref mut message, .. } => {
                *message = format!("{} (上下文: {})", message, context);
            }
            // 这几类错误的文案是固定的
            TranslationError::InvalidResponse
            | TranslationError::LanguageMismatch { .. }
            | TranslationError::BatchMismatch { .. }
            | TranslationError::QueueClosed => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Endpoint,
    ModelOutput,
    Input,
    Cache,
    Storage,
    Dom,
    Timeout,
    Parsing,
    Serialization,
    Concurrency,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StorageError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<toml::ser::Error> for TranslationError {
    fn from(error: toml::ser::Error) -> Self {
        TranslationError::SerializationError(format!("TOML序列化错误: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(format!("请求超时: {}", error))
        } else if let Some(status) = error.status() {
            TranslationError::ApiError {
                status: status.as_u16(),
                message: error.to_string(),
            }
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<crate::env::EnvError> for TranslationError {
    fn from(error: crate::env::EnvError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误统计信息
#[derive(Debug, Clone, Default)]
pub struct ErrorStats {
    pub total_errors: usize,
    pub by_category: std::collections::HashMap<ErrorCategory, usize>,
    pub by_severity: std::collections::HashMap<ErrorSeverity, usize>,
    pub retryable_errors: usize,
    pub critical_errors: usize,
}

impl ErrorStats {
    /// 记录错误
    pub fn record_error(&mut self, error: &TranslationError) {
        self.total_errors += 1;

        let category = error.category();
        *self.by_category.entry(category).or_insert(0) += 1;

        let severity = error.severity();
        *self.by_severity.entry(severity).or_insert(0) += 1;

        if error.is_retryable() {
            self.retryable_errors += 1;
        }

        if severity == ErrorSeverity::Critical {
            self.critical_errors += 1;
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建 DOM 错误
    pub fn dom_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::DomError(msg.to_string())
    }

    /// 创建存储错误
    pub fn storage_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::StorageError(msg.to_string())
    }
}
