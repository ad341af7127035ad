//! 配置管理器
//!
//! 提供统一的配置接口，支持设置存储、文件配置、环境变量和默认值。
//! 翻译设置通过显式 setter 修改，每次修改都会重新持久化并广播给订阅者。

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::constants;
use super::store::SettingsStore;
use crate::translation::error::{helpers::config_error, TranslationError, TranslationResult};

/// 翻译模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslationMode {
    /// 译文以新块的形式追加在原文之后
    #[default]
    Bilingual,
    /// 译文直接替换原文
    Replace,
}

impl TranslationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationMode::Bilingual => "bilingual",
            TranslationMode::Replace => "replace",
        }
    }
}

impl fmt::Display for TranslationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranslationMode {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bilingual" | "dual" => Ok(TranslationMode::Bilingual),
            "replace" => Ok(TranslationMode::Replace),
            other => Err(config_error(format!("未知的翻译模式: {}", other))),
        }
    }
}

/// 翻译设置（按模块名持久化为一个 JSON 对象）
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub target_language: String,
    pub translation_mode: TranslationMode,
    pub concurrent_limit: usize,
    pub viewport_margin: f64,
    pub min_text_length: usize,
    pub max_chunk_size: usize,
    pub enable_selection_translation: bool,
    pub enable_viewport_translation: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_language: constants::DEFAULT_TARGET_LANGUAGE.to_string(),
            translation_mode: TranslationMode::Bilingual,
            concurrent_limit: constants::DEFAULT_CONCURRENT_LIMIT,
            viewport_margin: constants::DEFAULT_VIEWPORT_MARGIN,
            min_text_length: constants::MIN_TEXT_LENGTH,
            max_chunk_size: constants::DEFAULT_MAX_CHUNK_SIZE,
            enable_selection_translation: true,
            enable_viewport_translation: true,
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(target_language: &str) -> Self {
        Self {
            target_language: target_language.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_language.trim().is_empty() {
            return Err(TranslationError::ConfigError("目标语言不能为空".to_string()));
        }

        if self.concurrent_limit == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.max_chunk_size == 0 {
            return Err(TranslationError::ConfigError("分块大小不能为0".to_string()));
        }

        if !self.viewport_margin.is_finite() || self.viewport_margin < 0.0 {
            return Err(TranslationError::ConfigError("视口边距必须是非负数".to_string()));
        }

        Ok(())
    }

    /// 应用环境变量覆盖（仅覆盖显式设置的变量）
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{translation, EnvVar};

        if let Some(target) = translation::TargetLang::get_override()? {
            self.target_language = target;
        }

        if let Some(mode) = translation::Mode::get_override()? {
            self.translation_mode = mode.parse()?;
        }

        if let Some(limit) = translation::ConcurrentLimit::get_override()? {
            self.concurrent_limit = limit;
        }

        if let Some(chunk) = translation::MaxChunkSize::get_override()? {
            self.max_chunk_size = chunk;
        }

        if let Some(margin) = translation::ViewportMargin::get_override()? {
            self.viewport_margin = margin;
        }

        Ok(())
    }
}

/// 模型接口配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
    /// 请求超时（秒），未设置时交给 HTTP 客户端
    pub timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: constants::DEFAULT_API_URL.to_string(),
            model: constants::DEFAULT_MODEL.to_string(),
            temperature: constants::DEFAULT_TEMPERATURE,
            api_key: None,
            timeout_secs: None,
        }
    }
}

impl ModelConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> TranslationResult<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(TranslationError::ConfigError(format!(
                "模型接口地址无效: {}",
                self.endpoint
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslationError::ConfigError("temperature 必须在 0 到 2 之间".to_string()));
        }

        Ok(())
    }

    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{translation, EnvVar};

        if let Some(url) = translation::ApiUrl::get_override()? {
            tracing::info!("环境变量覆盖 API URL: {}", url);
            self.endpoint = url;
        }

        if let Some(model) = translation::Model::get_override()? {
            self.model = model;
        }

        if let Some(key) = translation::ApiKey::get_override()? {
            self.api_key = Some(key).filter(|k| !k.is_empty());
        }

        if let Some(timeout) = translation::RequestTimeout::get_override()? {
            self.timeout_secs = Some(timeout.as_secs());
        }

        Ok(())
    }
}

/// 网络请求重试策略
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// 额外重试次数，0 表示失败立即上报
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::DEFAULT_MAX_RETRIES,
            base_delay_ms: constants::DEFAULT_RETRY_DELAY_MS,
            max_delay_ms: constants::MAX_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// 不重试
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 第 `attempt` 次重试前的等待时间（指数退避）
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// 缓存配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: constants::DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// 配置文件的完整结构
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub translation: TranslationConfig,
    pub model: ModelConfig,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn validate(&self) -> TranslationResult<()> {
        self.translation.validate()?;
        self.model.validate()?;
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(TranslationError::ConfigError("启用缓存时缓存大小不能为0".to_string()));
        }
        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> TranslationResult<()> {
        use crate::env::{cache, translation, EnvVar};

        self.translation.apply_env_overrides()?;
        self.model.apply_env_overrides()?;

        if let Some(retries) = translation::MaxRetries::get_override()? {
            self.retry.max_retries = retries;
        }
        if let Some(enabled) = cache::Enabled::get_override()? {
            self.cache.enabled = enabled;
        }
        if let Some(capacity) = cache::Capacity::get_override()? {
            self.cache.capacity = capacity;
        }

        Ok(())
    }
}

/// 配置管理器
///
/// 持有当前翻译设置的 watch 通道；编排器订阅它以响应实时修改。
pub struct ConfigManager {
    settings: watch::Sender<TranslationConfig>,
    model: ModelConfig,
    retry: RetryPolicy,
    cache: CacheConfig,
    store: Arc<dyn SettingsStore>,
}

impl ConfigManager {
    /// 加载配置：默认值 → 配置文件 → 环境变量 → 已持久化的设置
    pub fn load(store: Arc<dyn SettingsStore>) -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides()?;
        Self::with_store(config, store)
    }

    /// 以给定配置为基础创建管理器，并叠加存储中已保存的翻译设置
    pub fn with_store(config: AppConfig, store: Arc<dyn SettingsStore>) -> TranslationResult<Self> {
        config.validate()?;

        let mut settings = config.translation;
        match store.load(constants::SETTINGS_MODULE) {
            Ok(Some(value)) => match serde_json::from_value::<TranslationConfig>(value) {
                Ok(saved) if saved.validate().is_ok() => {
                    tracing::debug!("已加载持久化的翻译设置");
                    settings = saved;
                }
                Ok(_) => tracing::warn!("持久化的翻译设置无效，已忽略"),
                Err(e) => tracing::warn!("解析持久化的翻译设置失败: {}", e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("读取设置存储失败: {}", e),
        }

        let (settings, _) = watch::channel(settings);

        Ok(Self {
            settings,
            model: config.model,
            retry: config.retry,
            cache: config.cache,
            store,
        })
    }

    /// 获取当前翻译设置的快照
    pub fn config(&self) -> TranslationConfig {
        self.settings.borrow().clone()
    }

    /// 订阅翻译设置变化
    pub fn subscribe(&self) -> watch::Receiver<TranslationConfig> {
        self.settings.subscribe()
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.cache
    }

    /// 修改设置：校验、持久化、广播
    ///
    /// 只有校验失败才返回错误。存储写入失败时修改仍然生效，只是不会保留到下次启动。
    pub fn update<F>(&self, change: F) -> TranslationResult<()>
    where
        F: FnOnce(&mut TranslationConfig),
    {
        self.apply(change, true)
    }

    /// 修改设置但不写入存储，只对本次运行有效
    pub fn update_transient<F>(&self, change: F) -> TranslationResult<()>
    where
        F: FnOnce(&mut TranslationConfig),
    {
        self.apply(change, false)
    }

    fn apply<F>(&self, change: F, persist: bool) -> TranslationResult<()>
    where
        F: FnOnce(&mut TranslationConfig),
    {
        let mut next = self.config();
        change(&mut next);
        next.validate()?;

        if *self.settings.borrow() == next {
            return Ok(());
        }

        if persist {
            if let Err(e) = self.persist(&next) {
                tracing::warn!("保存翻译设置失败，修改仅在本次运行中有效: {}", e);
            }
        }
        self.settings.send_replace(next);
        Ok(())
    }

    fn persist(&self, config: &TranslationConfig) -> TranslationResult<()> {
        let value = serde_json::to_value(config)?;
        self.store.save(constants::SETTINGS_MODULE, &value)
    }

    pub fn set_target_language(&self, language: &str) -> TranslationResult<()> {
        let language = language.trim().to_string();
        self.update(|c| c.target_language = language)
    }

    pub fn set_translation_mode(&self, mode: TranslationMode) -> TranslationResult<()> {
        self.update(|c| c.translation_mode = mode)
    }

    pub fn set_concurrent_limit(&self, limit: usize) -> TranslationResult<()> {
        self.update(|c| c.concurrent_limit = limit)
    }

    pub fn set_viewport_margin(&self, margin: f64) -> TranslationResult<()> {
        self.update(|c| c.viewport_margin = margin)
    }

    pub fn set_min_text_length(&self, length: usize) -> TranslationResult<()> {
        self.update(|c| c.min_text_length = length)
    }

    pub fn set_max_chunk_size(&self, size: usize) -> TranslationResult<()> {
        self.update(|c| c.max_chunk_size = size)
    }

    pub fn set_selection_translation_enabled(&self, enabled: bool) -> TranslationResult<()> {
        self.update(|c| c.enable_selection_translation = enabled)
    }

    pub fn set_viewport_translation_enabled(&self, enabled: bool) -> TranslationResult<()> {
        self.update(|c| c.enable_viewport_translation = enabled)
    }

    /// 从搜索路径加载配置文件
    pub fn load_config() -> TranslationResult<AppConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(AppConfig::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &str) -> TranslationResult<AppConfig> {
        let expanded = shellexpand::tilde(path);
        let content = std::fs::read_to_string(expanded.as_ref())
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        let config: AppConfig = if expanded.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))?
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let content = toml::to_string_pretty(&AppConfig::default())?;
        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;
        Ok(())
    }
}
