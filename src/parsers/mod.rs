//! # 解析器模块
//!
//! 翻译流程用到的 HTML 与 CSS 处理：
//!
//! - `html` - HTML 文档解析、DOM 操作与序列化
//! - `css` - 内联样式解析与声明格式化

pub mod css;
pub mod html;

// Re-export commonly used items for convenience
pub use css::{get_style_property, parse_inline_style};
pub use html::{html_to_dom, parse_html, serialize_document};
