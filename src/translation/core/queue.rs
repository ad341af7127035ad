//! 翻译请求队列
//!
//! 请求先进入 FIFO 通道，由调度任务按顺序取出；每个请求在拿到信号量许可后
//! 才会被派发到独立的 tokio 任务中执行，因此同时在途的请求数永远不超过
//! `concurrent_limit`。完成顺序不保证。

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;

use super::client::ModelClient;
use super::prompt::{build_messages, TaskKind};
use crate::translation::config::RetryPolicy;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::{clean_model_output, join_chunks, split_into_chunks, TargetLanguage};

/// 一次翻译请求
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// 已编码的待译文本
    pub text: String,
    pub target: TargetLanguage,
    pub kind: TaskKind,
    pub max_chunk_size: usize,
}

impl TranslationRequest {
    pub fn new(text: impl Into<String>, target: TargetLanguage, kind: TaskKind, max_chunk_size: usize) -> Self {
        Self {
            text: text.into(),
            target,
            kind,
            max_chunk_size,
        }
    }
}

struct QueuedTask {
    id: u64,
    request: TranslationRequest,
    respond_to: oneshot::Sender<TranslationResult<String>>,
}

/// 任务完成句柄
#[derive(Debug)]
pub struct TaskHandle {
    id: u64,
    receiver: oneshot::Receiver<TranslationResult<String>>,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for TaskHandle {
    type Output = TranslationResult<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(TranslationError::QueueClosed)))
    }
}

// ============================================================================
// 统计
// ============================================================================

/// 队列运行统计
#[derive(Debug, Default)]
pub struct QueueStats {
    pub active: AtomicUsize,
    pub peak_active: AtomicUsize,
    pub pending: AtomicUsize,
    pub completed: AtomicUsize,
    pub failed: AtomicUsize,
}

impl QueueStats {
    pub fn snapshot(&self) -> QueueStatsSnapshot {
        QueueStatsSnapshot {
            active: self.active.load(Ordering::SeqCst),
            peak_active: self.peak_active.load(Ordering::SeqCst),
            pending: self.pending.load(Ordering::SeqCst),
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    fn admit(&self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);
    }
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStatsSnapshot {
    pub active: usize,
    pub peak_active: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
}

// ============================================================================
// 文本翻译执行器
// ============================================================================

/// 单个请求的执行逻辑：分块、调用模型、清理、拼接
pub struct TextTranslator {
    client: Arc<dyn ModelClient>,
    model: Option<String>,
    retry: RetryPolicy,
}

impl TextTranslator {
    pub fn new(client: Arc<dyn ModelClient>, retry: RetryPolicy) -> Self {
        Self {
            client,
            model: None,
            retry,
        }
    }

    /// 指定模型名，覆盖客户端默认值
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub async fn translate_text_request(&self, request: &TranslationRequest) -> TranslationResult<String> {
        // 结构化载荷不分块，避免在元素或数组中间切断
        let limit = match request.kind {
            TaskKind::Plain | TaskKind::InlineHtml => request.max_chunk_size,
            TaskKind::ReplacePayload | TaskKind::BatchArray => 0,
        };

        let chunks = split_into_chunks(&request.text, limit);
        if chunks.is_empty() {
            return Ok(String::new());
        }

        let mut translated = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let messages = build_messages(chunk, &request.target, request.kind);
            let output = self.call_with_retry(messages).await?;
            translated.push(clean_model_output(&output));
        }

        Ok(join_chunks(&translated))
    }

    async fn call_with_retry(
        &self,
        messages: Vec<super::client::ChatMessage>,
    ) -> TranslationResult<String> {
        let mut attempt = 0;
        loop {
            match self.client.call_model(messages.clone(), self.model.as_deref()).await {
                Ok(output) => return Ok(output),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!("模型调用失败，{:?} 后第 {} 次重试: {}", delay, attempt + 1, err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

// ============================================================================
// 队列
// ============================================================================

/// 有界并发的请求队列
pub struct RequestQueue {
    sender: mpsc::UnboundedSender<QueuedTask>,
    semaphore: Arc<Semaphore>,
    limit: AtomicUsize,
    stats: Arc<QueueStats>,
    next_id: AtomicU64,
    dispatcher: JoinHandle<()>,
}

impl RequestQueue {
    /// 创建队列并启动调度任务（需要在 tokio 运行时中调用）
    pub fn new(translator: Arc<TextTranslator>, concurrent_limit: usize) -> Self {
        let limit = concurrent_limit.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(limit));
        let stats = Arc::new(QueueStats::default());

        let dispatcher = tokio::spawn(dispatch(
            receiver,
            Arc::clone(&semaphore),
            translator,
            Arc::clone(&stats),
        ));

        tracing::debug!("请求队列已启动，并发上限 {}", limit);

        Self {
            sender,
            semaphore,
            limit: AtomicUsize::new(limit),
            stats,
            next_id: AtomicU64::new(1),
            dispatcher,
        }
    }

    /// 提交请求；返回的句柄在请求完成时给出结果
    pub fn enqueue(&self, request: TranslationRequest) -> TaskHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (respond_to, receiver) = oneshot::channel();

        self.stats.pending.fetch_add(1, Ordering::SeqCst);
        let task = QueuedTask {
            id,
            request,
            respond_to,
        };
        if let Err(mpsc::error::SendError(task)) = self.sender.send(task) {
            self.stats.pending.fetch_sub(1, Ordering::SeqCst);
            let _ = task.respond_to.send(Err(TranslationError::QueueClosed));
        }

        TaskHandle { id, receiver }
    }

    pub fn concurrent_limit(&self) -> usize {
        self.limit.load(Ordering::SeqCst)
    }

    /// 动态调整并发上限
    ///
    /// 降低上限时，多余的许可在被归还后回收，已在途的请求不受影响。
    pub fn set_concurrent_limit(&self, limit: usize) {
        let limit = limit.max(1);
        let previous = self.limit.swap(limit, Ordering::SeqCst);

        if limit > previous {
            self.semaphore.add_permits(limit - previous);
        } else if limit < previous {
            let surplus = (previous - limit) as u32;
            let semaphore = Arc::clone(&self.semaphore);
            tokio::spawn(async move {
                if let Ok(permits) = semaphore.acquire_many_owned(surplus).await {
                    permits.forget();
                }
            });
        }

        tracing::info!("并发上限调整: {} -> {}", previous, limit);
    }

    pub fn stats(&self) -> QueueStatsSnapshot {
        self.stats.snapshot()
    }

    /// 停止调度；尚未派发的请求以 `QueueClosed` 结束
    pub fn shutdown(&self) {
        self.dispatcher.abort();
    }
}

impl Drop for RequestQueue {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<QueuedTask>,
    semaphore: Arc<Semaphore>,
    translator: Arc<TextTranslator>,
    stats: Arc<QueueStats>,
) {
    while let Some(task) = receiver.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        stats.admit();

        let translator = Arc::clone(&translator);
        let stats = Arc::clone(&stats);
        tokio::spawn(async move {
            let QueuedTask {
                id,
                request,
                respond_to,
            } = task;
            tracing::debug!("任务 {} 开始 ({} 字符)", id, request.text.chars().count());

            let result = translator.translate_text_request(&request).await;

            stats.active.fetch_sub(1, Ordering::SeqCst);
            match &result {
                Ok(_) => {
                    stats.completed.fetch_add(1, Ordering::SeqCst);
                }
                Err(err) => {
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::error!("任务 {} 失败: {}", id, err);
                }
            }
            drop(permit);

            // 调用方可能已经放弃等待
            let _ = respond_to.send(result);
        });
    }
}
