//! 设置存储
//!
//! 每个模块名对应一个 JSON 对象。文件实现把它写成 `<dir>/<module>.json`，
//! 内存实现用于测试和无持久化场景。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;

use crate::translation::error::{helpers::storage_error, TranslationResult};

/// 键值设置存储
pub trait SettingsStore: Send + Sync {
    /// 读取模块设置，不存在时返回 `None`
    fn load(&self, module: &str) -> TranslationResult<Option<Value>>;

    /// 覆盖写入模块设置
    fn save(&self, module: &str, value: &Value) -> TranslationResult<()>;
}

/// 基于 JSON 文件的设置存储
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// 默认位置：`NWS_SETTINGS_DIR`，否则为平台配置目录
    pub fn default_location() -> TranslationResult<Self> {
        use crate::env::{core::SettingsDir, EnvVar};

        if let Some(dir) = SettingsDir::get_override()? {
            return Ok(Self::new(dir));
        }

        directories::ProjectDirs::from("", "", "nws-translator")
            .map(|dirs| Self::new(dirs.config_dir()))
            .ok_or_else(|| storage_error("无法确定配置目录"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, module: &str) -> PathBuf {
        self.dir.join(format!("{}.json", module))
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self, module: &str) -> TranslationResult<Option<Value>> {
        let path = self.path_for(module);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path)?;
        let value: Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            return Err(storage_error(format!("{} 不是 JSON 对象", path.display())));
        }
        Ok(Some(value))
    }

    fn save(&self, module: &str, value: &Value) -> TranslationResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(module);
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, content)?;
        tracing::debug!("设置已写入 {}", path.display());
        Ok(())
    }
}

/// 内存设置存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, module: &str) -> TranslationResult<Option<Value>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| storage_error("设置存储锁已损坏"))?;
        Ok(entries.get(module).cloned())
    }

    fn save(&self, module: &str, value: &Value) -> TranslationResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| storage_error("设置存储锁已损坏"))?;
        entries.insert(module.to_string(), value.clone());
        Ok(())
    }
}
