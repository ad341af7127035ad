//! 翻译管道模块
//!
//! 提供页面文本处理管道，包括元素收集、过滤、占位符编解码和分块

pub mod chunker;
pub mod collector;
pub mod filters;
pub mod language;
pub mod placeholder;

// 重新导出主要类型
pub use chunker::{clean_model_output, join_chunks, split_into_chunks};
pub use collector::{
    find_translation_root, is_skippable_element, CollectionStats, DomSelector, ElementStatus,
    TextCache, TextItem, TranslatableElement,
};
pub use filters::{normalize_whitespace, FilterReason, FilterStats, TextClassifier};
pub use language::{ScriptFamily, TargetLanguage};
pub use placeholder::{
    build_placeholder_text, build_replace_payload, extract_replace_segments, restore_placeholders,
    Placeholder, ReplacePayload, ReplaceSegment,
};
