//! 翻译服务
//!
//! 把缓存、请求队列和统计组合成统一入口。页面编排器和选区翻译都经由这里发出请求：
//!
//! 1. 按 `blake3(目标语言 | 任务类型 | 原文)` 查询缓存
//! 2. 未命中时提交到 [`RequestQueue`]，由队列控制并发
//! 3. 成功结果写回缓存并更新统计
//!
//! `translate` 同步完成缓存查询和入队，返回一个不借用服务本身的 future，
//! 调用方可以把多个请求放进同一个 `FuturesUnordered` 里并发等待。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{self, BoxFuture};

use super::client::ModelClient;
use super::prompt::TaskKind;
use super::queue::{QueueStatsSnapshot, RequestQueue, TextTranslator, TranslationRequest};
use crate::translation::config::{CacheConfig, ConfigManager, RetryPolicy};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{clean_model_output, TargetLanguage};
use crate::translation::storage::{CacheStats, TranslationCache};

/// 统一的翻译服务
pub struct TranslationService {
    queue: RequestQueue,
    cache: Arc<TranslationCache>,
    max_chunk_size: AtomicUsize,
    stats: Arc<ServiceStats>,
}

impl TranslationService {
    /// 根据配置管理器中的当前设置创建服务（需要在 tokio 运行时中调用）
    pub fn new(client: Arc<dyn ModelClient>, config: &ConfigManager) -> Self {
        let settings = config.config();
        let translator = TextTranslator::new(client, config.retry_policy().clone());
        Self::with_parts(
            translator,
            config.cache_config(),
            settings.concurrent_limit,
            settings.max_chunk_size,
        )
    }

    /// 使用默认设置创建服务
    pub fn with_defaults(client: Arc<dyn ModelClient>) -> Self {
        Self::with_parts(
            TextTranslator::new(client, RetryPolicy::default()),
            &CacheConfig::default(),
            crate::translation::config::constants::DEFAULT_CONCURRENT_LIMIT,
            crate::translation::config::constants::DEFAULT_MAX_CHUNK_SIZE,
        )
    }

    pub fn with_parts(
        translator: TextTranslator,
        cache_config: &CacheConfig,
        concurrent_limit: usize,
        max_chunk_size: usize,
    ) -> Self {
        Self {
            queue: RequestQueue::new(Arc::new(translator), concurrent_limit),
            cache: Arc::new(TranslationCache::from_config(cache_config)),
            max_chunk_size: AtomicUsize::new(max_chunk_size),
            stats: Arc::new(ServiceStats::default()),
        }
    }

    /// 翻译一段文本
    pub fn translate(
        &self,
        text: &str,
        target: &TargetLanguage,
        kind: TaskKind,
    ) -> BoxFuture<'static, TranslationResult<String>> {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);

        let key = TranslationCache::generate_key(target.code(), kind.as_str(), text);
        if let Some(hit) = self.cache.get(&key) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("缓存命中 ({} 字符)", text.chars().count());
            return Box::pin(future::ready(Ok(hit)));
        }

        let handle = self.queue.enqueue(TranslationRequest::new(
            text,
            target.clone(),
            kind,
            self.max_chunk_size.load(Ordering::Relaxed),
        ));

        let cache = Arc::clone(&self.cache);
        let stats = Arc::clone(&self.stats);
        let chars = text.chars().count();
        let started = Instant::now();

        Box::pin(async move {
            let result = handle.await;
            stats.add_processing_time(started);

            match &result {
                Ok(translated) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    stats.chars_processed.fetch_add(chars, Ordering::Relaxed);
                    if !translated.is_empty() {
                        cache.insert(key, translated.clone());
                    }
                }
                Err(_) => {
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            result
        })
    }

    /// 删除某段文本的缓存结果，用于语言校验失败后的重试
    pub fn forget(&self, text: &str, target: &TargetLanguage, kind: TaskKind) {
        let key = TranslationCache::generate_key(target.code(), kind.as_str(), text);
        self.cache.remove(&key);
    }

    /// 批量翻译：一次请求携带 JSON 数组
    ///
    /// 返回的数组形状不对时逐条回退翻译；网络类错误直接返回。
    pub async fn translate_batch(
        &self,
        texts: &[String],
        target: &TargetLanguage,
    ) -> TranslationResult<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let payload = serde_json::to_string(texts)?;
        let attempt = match self.translate(&payload, target, TaskKind::BatchArray).await {
            Ok(output) => parse_batch_output(&output, texts.len()),
            Err(err) => Err(err),
        };

        match attempt {
            Ok(items) => Ok(items),
            Err(err @ (TranslationError::BatchMismatch { .. }
            | TranslationError::InvalidResponse
            | TranslationError::ParseError(_))) => {
                tracing::warn!("批量翻译结果不可用，逐条回退: {}", err);
                self.forget(&payload, target, TaskKind::BatchArray);
                let pending: Vec<_> = texts
                    .iter()
                    .map(|text| self.translate(text, target, TaskKind::Plain))
                    .collect();
                future::join_all(pending).await.into_iter().collect()
            }
            Err(err) => Err(err),
        }
    }

    pub fn set_concurrent_limit(&self, limit: usize) {
        self.queue.set_concurrent_limit(limit);
    }

    pub fn set_max_chunk_size(&self, size: usize) {
        self.max_chunk_size.store(size, Ordering::Relaxed);
    }

    pub fn queue_stats(&self) -> QueueStatsSnapshot {
        self.queue.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.get_stats()
    }

    pub fn get_stats(&self) -> &ServiceStats {
        &self.stats
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// 解析模型返回的 JSON 数组，允许前后有多余文字
fn parse_batch_output(output: &str, expected: usize) -> TranslationResult<Vec<String>> {
    let cleaned = clean_model_output(output);
    let start = cleaned.find('[').ok_or(TranslationError::InvalidResponse)?;
    let end = cleaned.rfind(']').ok_or(TranslationError::InvalidResponse)?;
    if end < start {
        return Err(TranslationError::InvalidResponse);
    }

    let items: Vec<String> = serde_json::from_str(&cleaned[start..=end])
        .map_err(|e| TranslationError::ParseError(format!("批量结果不是字符串数组: {}", e)))?;

    if items.len() != expected {
        return Err(TranslationError::BatchMismatch {
            expected,
            actual: items.len(),
        });
    }
    Ok(items)
}

/// 翻译服务统计信息（线程安全版本）
#[derive(Debug, Default)]
pub struct ServiceStats {
    /// 收到的翻译请求数
    pub requests: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub completed: AtomicUsize,
    pub errors: AtomicUsize,
    /// 实际送入队列的字符总数
    pub chars_processed: AtomicUsize,
    /// 总等待时间（微秒）
    pub processing_time: AtomicU64,
}

impl ServiceStats {
    fn add_processing_time(&self, started: Instant) {
        self.processing_time
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);
    }

    /// 获取统计快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            chars_processed: self.chars_processed.load(Ordering::Relaxed),
            processing_time_us: self.processing_time.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.requests.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.completed.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.chars_processed.store(0, Ordering::Relaxed);
        self.processing_time.store(0, Ordering::Relaxed);
    }
}

/// 统计快照
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceStatsSnapshot {
    pub requests: usize,
    pub cache_hits: usize,
    pub completed: usize,
    pub errors: usize,
    pub chars_processed: usize,
    pub processing_time_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::client::ChatMessage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 按请求内容给出固定回答的模拟模型
    struct ScriptedModel {
        prompts: Mutex<Vec<String>>,
        batch_reply: String,
    }

    impl ScriptedModel {
        fn new(batch_reply: &str) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                batch_reply: batch_reply.to_string(),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn call_model(&self, messages: Vec<ChatMessage>, _: Option<&str>) -> TranslationResult<String> {
            let user = messages[1].content.clone();
            self.prompts.lock().unwrap().push(user.clone());
            let text = user.trim_start_matches("<text>").trim_end_matches("</text>");
            if text.starts_with('[') {
                Ok(self.batch_reply.clone())
            } else {
                Ok(format!("<text>译:{}</text>", text))
            }
        }
    }

    #[tokio::test]
    async fn test_cache_short_circuits_queue() {
        let model = ScriptedModel::new("[]");
        let service = TranslationService::with_defaults(model.clone());
        let zh = TargetLanguage::chinese();

        assert_eq!(service.translate("Hello", &zh, TaskKind::Plain).await.unwrap(), "译:Hello");
        assert_eq!(service.translate("Hello", &zh, TaskKind::Plain).await.unwrap(), "译:Hello");
        assert_eq!(model.calls(), 1);

        let stats = service.get_stats().snapshot();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.cache_hits, 1);

        // 任务类型不同，缓存不共享
        service.translate("Hello", &zh, TaskKind::InlineHtml).await.unwrap();
        assert_eq!(model.calls(), 2);

        service.forget("Hello", &zh, TaskKind::Plain);
        service.translate("Hello", &zh, TaskKind::Plain).await.unwrap();
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_batch_array() {
        let model = ScriptedModel::new(r#"Here you go: ["一", "二"]"#);
        let service = TranslationService::with_defaults(model.clone());

        let result = service
            .translate_batch(&["one".to_string(), "two".to_string()], &TargetLanguage::chinese())
            .await
            .unwrap();
        assert_eq!(result, vec!["一", "二"]);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_batch_mismatch_falls_back_per_item() {
        let model = ScriptedModel::new(r#"["只有一条"]"#);
        let service = TranslationService::with_defaults(model.clone());

        let result = service
            .translate_batch(&["one".to_string(), "two".to_string()], &TargetLanguage::chinese())
            .await
            .unwrap();
        assert_eq!(result, vec!["译:one", "译:two"]);
        assert_eq!(model.calls(), 3);
    }

    #[test]
    fn test_parse_batch_output() {
        assert_eq!(parse_batch_output("```json\n[\"a\"]\n```", 1).unwrap(), vec!["a"]);
        assert!(matches!(
            parse_batch_output("[\"a\"]", 2),
            Err(TranslationError::BatchMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(parse_batch_output("no array", 1), Err(TranslationError::InvalidResponse)));
        assert!(matches!(parse_batch_output("[1, 2]", 2), Err(TranslationError::ParseError(_))));
    }
}
