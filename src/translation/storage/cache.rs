//! 翻译缓存模块
//!
//! 进程内 LRU 缓存，键为 `blake3(目标语言 | 任务类型 | 原文)`。

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use blake3::Hasher;
use lru::LruCache;

use crate::translation::config::{constants, CacheConfig};

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub translated_text: String,
    pub created_at: Instant,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn new(translated_text: String) -> Self {
        Self {
            translated_text,
            created_at: Instant::now(),
            access_count: 0,
        }
    }

    /// 检查条目是否过期
    pub fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.map(|ttl| self.created_at.elapsed() > ttl).unwrap_or(false)
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CacheStats {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub total_entries: usize,
    pub evictions: u64,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_requests as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    stats: CacheStats,
}

/// 翻译缓存
pub struct TranslationCache {
    inner: Mutex<CacheInner>,
    ttl: Option<Duration>,
    enabled: bool,
}

// ============================================================================
// 实现
// ============================================================================

impl TranslationCache {
    /// 创建指定容量的缓存
    pub fn new(capacity: usize) -> Self {
        Self::with_ttl(capacity, None)
    }

    pub fn with_ttl(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
            ttl,
            enabled: true,
        }
    }

    /// 根据配置创建；关闭时所有读取都未命中，写入被忽略
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(config.capacity);
        cache.enabled = config.enabled;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// 生成缓存键
    pub fn generate_key(target_lang: &str, kind: &str, text: &str) -> String {
        let mut hasher = Hasher::new();
        hasher.update(target_lang.as_bytes());
        hasher.update(b"|");
        hasher.update(kind.as_bytes());
        hasher.update(b"|");
        hasher.update(text.as_bytes());
        format!("trans:{}", hasher.finalize().to_hex())
    }

    /// 获取缓存条目
    pub fn get(&self, key: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let ttl = self.ttl;
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.stats.total_requests += 1;

        let expired = match inner.entries.get_mut(key) {
            Some(entry) if !entry.is_expired(ttl) => {
                entry.access_count += 1;
                let text = entry.translated_text.clone();
                inner.stats.cache_hits += 1;
                return Some(text);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(key);
            inner.stats.evictions += 1;
        }
        inner.stats.cache_misses += 1;
        None
    }

    /// 插入缓存条目
    pub fn insert(&self, key: String, translated: String) {
        if !self.enabled {
            return;
        }

        let mut inner = self.lock();
        let inserted_key = key.clone();
        // push 在键已存在时返回旧值，这不算驱逐
        if let Some((old_key, _)) = inner.entries.push(key, CacheEntry::new(translated)) {
            if old_key != inserted_key {
                inner.stats.evictions += 1;
            }
        }
        inner.stats.total_entries = inner.entries.len();
    }

    /// 删除单个条目，返回是否存在
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.lock();
        let removed = inner.entries.pop(key).is_some();
        inner.stats.total_entries = inner.entries.len();
        removed
    }

    /// 清空缓存
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.stats.total_entries = 0;
    }

    /// 清理过期条目
    pub fn cleanup_expired(&self) -> usize {
        let ttl = self.ttl;
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(ttl))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.entries.pop(key);
        }
        inner.stats.evictions += expired.len() as u64;
        inner.stats.total_entries = inner.entries.len();
        expired.len()
    }

    /// 获取统计信息
    pub fn get_stats(&self) -> CacheStats {
        let inner = self.lock();
        let mut stats = inner.stats.clone();
        stats.total_entries = inner.entries.len();
        stats
    }

    pub fn reset_stats(&self) {
        self.lock().stats = CacheStats::default();
    }

    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        let ttl = self.ttl;
        self.lock()
            .entries
            .peek(key)
            .map(|entry| !entry.is_expired(ttl))
            .unwrap_or(false)
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(constants::DEFAULT_CACHE_CAPACITY)
    }
}
