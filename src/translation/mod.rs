//! 翻译模块
//!
//! 提供页面翻译的完整流程，采用清晰的模块化架构：
//! - **pipeline**: 文本处理管道（分类、选择、占位符编解码、分块）
//! - **core**: 模型客户端、请求队列、翻译服务、页面编排与 DOM 写回
//! - **storage**: 翻译结果缓存
//! - **config**: 配置管理
//! - **host**: 页面宿主抽象（计算样式、几何、视口、地址）
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use std::sync::Arc;
//! use nws_translator::parsers::html::dom::parse_html;
//! use nws_translator::translation::{
//!     ConfigManager, HttpModelClient, MemoryStore, PageTranslator, StaticPageHost,
//!     TranslationService,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(ConfigManager::load(Arc::new(MemoryStore::new()))?);
//! let client = Arc::new(HttpModelClient::new(config.model_config().clone())?);
//! let service = Arc::new(TranslationService::new(client, &config));
//!
//! let dom = parse_html("<p>Hello world</p>")?;
//! let host = Rc::new(StaticPageHost::new("about:blank"));
//! let translator = PageTranslator::new(dom.document.clone(), host, config, service);
//! let report = translator.translate_page(Some("中文"), None).await?;
//! println!("翻译了 {} 个元素", report.translated);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块 - 翻译设置、模型接口、重试与缓存配置
pub mod config;

/// 核心模块 - 客户端、队列、服务、编排器与写回
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 页面宿主抽象
pub mod host;

/// 文本处理管道模块 - 分类、选择、占位符和分块
pub mod pipeline;

/// 存储管理模块 - 翻译结果缓存
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use core::{
    HttpModelClient, ModelClient, MutationRecord, PageEvent, PageReport, PageTranslator,
    TaskKind, TranslationService,
};

pub use config::{
    constants, AppConfig, ConfigManager, JsonFileStore, MemoryStore, ModelConfig, RetryPolicy,
    SettingsStore, TranslationConfig, TranslationMode,
};

pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};

pub use host::{ComputedStyle, PageHost, Rect, StaticPageHost};

pub use pipeline::{DomSelector, ElementStatus, TargetLanguage, TextClassifier};

pub use storage::{CacheStats, TranslationCache};

// ============================================================================
// 便利函数
// ============================================================================

/// 初始化日志
///
/// 日志级别取自 `NWS_LOG_LEVEL`，未设置时使用 `default_level`；
/// 已经初始化过时静默返回。
#[cfg(feature = "cli")]
pub fn init_logging(default_level: &str) {
    use crate::env::{core::LogLevel, EnvVar};
    use tracing_subscriber::EnvFilter;

    let level = match LogLevel::get_override() {
        Ok(Some(level)) => level,
        Ok(None) => default_level.to_string(),
        Err(e) => {
            eprintln!("{}", e);
            default_level.to_string()
        }
    };

    let filter = EnvFilter::try_new(format!("nws_translator={}", level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 检查文本是否应该翻译（使用默认设置和给定目标语言）
///
/// # Examples
///
/// ```rust
/// use nws_translator::translation::should_translate;
///
/// assert!(should_translate("Hello world", "中文"));
/// assert!(!should_translate("12345", "中文"));
/// assert!(!should_translate("你好世界这是中文", "中文"));
/// ```
pub fn should_translate(text: &str, target_language: &str) -> bool {
    let config = TranslationConfig::default_with_lang(target_language);
    TextClassifier::new().should_translate(text, &config)
}

/// 检查翻译配置文件是否存在
pub fn config_file_exists() -> bool {
    config::config_file_exists()
}

/// 生成示例配置文件
pub fn generate_example_config(path: &str) -> TranslationResult<()> {
    ConfigManager::generate_example_config(path)?;
    tracing::info!("已生成示例配置文件: {}", path);
    Ok(())
}

/// 翻译模块版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
