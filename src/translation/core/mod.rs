//! 翻译系统核心模块
//!
//! 把管道产出的文本送到模型、把结果写回 DOM，并管理每个元素的翻译状态。
//!
//! ## 架构设计
//!
//! - **客户端层** (`client.rs`, `prompt.rs`): 模型接口与提示词
//! - **队列层** (`queue.rs`): 有界并发的请求队列，负责分块、重试和输出清理
//! - **服务层** (`service.rs`): 缓存 + 队列的统一入口，支持批量数组翻译
//! - **编排层** (`engine.rs`, `state.rs`): 页面会话、元素状态机、变更与视口驱动
//! - **写回层** (`patcher.rs`): 双语块插入、原地替换与撤销
//!
//! ## 模块依赖关系
//!
//! ```text
//! PageTranslator (engine.rs)
//!     ├── DomSelector / PlaceholderCodec (pipeline)
//!     ├── ElementRegistry (state.rs)
//!     ├── DomPatcher (patcher.rs)
//!     └── TranslationService (service.rs)
//!             ├── TranslationCache (storage/cache.rs)
//!             └── RequestQueue (queue.rs)
//!                     └── ModelClient (client.rs)
//! ```

pub mod client;
pub mod engine;
pub mod patcher;
pub mod prompt;
pub mod queue;
pub mod service;
pub mod state;

/// 页面翻译编排器及其事件类型
pub use engine::{MutationRecord, Outcome, PageEvent, PageReport, PageTranslator};

/// 模型客户端
pub use client::{ChatMessage, HttpModelClient, ModelClient};

pub use patcher::DomPatcher;
pub use prompt::{build_messages, TaskKind};
pub use queue::{QueueStatsSnapshot, RequestQueue, TaskHandle, TextTranslator, TranslationRequest};

/// 统一翻译服务
pub use service::{ServiceStats, ServiceStatsSnapshot, TranslationService};

pub use state::{ElementRegistry, Registration, StatusCounts};
