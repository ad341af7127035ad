//! 存储模块
//!
//! 提供翻译结果缓存。设置的持久化见 [`crate::translation::config::store`]。

pub mod cache;

pub use cache::{CacheEntry, CacheStats, TranslationCache};
