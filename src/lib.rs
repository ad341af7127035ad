//! # nws-translator
//!
//! 网页沉浸式翻译库：在 DOM 中找出可翻译的块级元素，经由大模型翻译后以双语块
//! 或原地替换的方式写回页面。
//!
//! ## 模块组织
//!
//! - `env` - 环境变量访问
//! - `parsers` - HTML 与 CSS 解析
//! - `translation` - 翻译管道、请求队列、页面编排与写回

pub mod env;
pub mod parsers;
pub mod translation;

// Re-export commonly used items for convenience
pub use parsers::*;
pub use translation::{PageTranslator, TranslationError, TranslationResult, TranslationService};
