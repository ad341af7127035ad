//! 翻译配置管理模块
//!
//! 提供配置管理，支持设置存储、环境变量、配置文件和默认值

pub mod manager;
pub mod store;

// 重新导出主要类型
pub use manager::{
    AppConfig, CacheConfig, ConfigManager, ModelConfig, RetryPolicy, TranslationConfig,
    TranslationMode,
};
pub use store::{JsonFileStore, MemoryStore, SettingsStore};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 默认翻译设置
    pub const DEFAULT_TARGET_LANGUAGE: &str = "中文";
    pub const DEFAULT_CONCURRENT_LIMIT: usize = 3;
    pub const DEFAULT_VIEWPORT_MARGIN: f64 = 200.0;
    pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2000;

    // 文本过滤相关
    pub const MIN_TEXT_LENGTH: usize = 2;
    pub const CJK_RATIO_THRESHOLD: f64 = 0.5;
    pub const EXCESSIVE_LINK_RATIO: f64 = 0.8;
    pub const EXCESSIVE_LINK_MIN_COUNT: usize = 10;
    pub const DOMINANT_LINK_RATIO: f64 = 0.95;

    // 默认模型接口设置
    pub const DEFAULT_API_URL: &str = "http://localhost:11434/v1/chat/completions";
    pub const DEFAULT_MODEL: &str = "qwen2.5:7b";
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    // 重试设置（默认不自动重试）
    pub const DEFAULT_MAX_RETRIES: usize = 0;
    pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
    pub const MAX_RETRY_DELAY_MS: u64 = 8000;

    // 缓存设置
    pub const DEFAULT_CACHE_CAPACITY: usize = 2000;

    // 页面事件节奏
    pub const MUTATION_DEBOUNCE: Duration = Duration::from_secs(1);
    pub const URL_POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const NAVIGATION_SETTLE_DELAY: Duration = Duration::from_millis(500);

    // 注入节点标记
    pub const UI_CLASS_PREFIX: &str = "nws-";
    pub const TRANSLATION_BLOCK_CLASS: &str = "nws-translation-block";
    pub const TRANSLATION_PARAGRAPH_CLASS: &str = "nws-translation-paragraph";
    pub const SELECTION_TOOLTIP_CLASS: &str = "nws-selection-tooltip";
    pub const PARAGRAPH_SEPARATOR: &str = "%%";

    // 设置存储中的模块名
    pub const SETTINGS_MODULE: &str = "translation";

    // 候选块级元素
    pub const BLOCK_TAGS: &[&str] = &[
        "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "td", "th", "dd", "dt",
        "blockquote", "figcaption", "caption", "summary", "div", "article", "section",
        "main", "aside",
    ];

    // 跳过的元素
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "noscript", "template", "head", "title", "meta", "link",
        "nav", "footer", "header", "code", "pre", "kbd", "samp", "svg", "math", "canvas",
        "img", "picture", "video", "audio", "iframe", "object", "embed",
        "input", "textarea", "select", "option", "button",
    ];

    // 占位符保护的行内元素
    pub const INLINE_TAGS: &[&str] = &[
        "a", "span", "b", "strong", "i", "em", "u", "s", "small", "mark", "sub", "sup",
        "abbr", "cite", "q", "font", "del", "ins", "time", "label",
    ];

    // 常见的隐藏类名
    pub const HIDDEN_CLASSES: &[&str] = &[
        "hidden", "sr-only", "visually-hidden", "screen-reader-text", "d-none", "is-hidden",
        "invisible",
    ];

    // 显式拒绝翻译的类名
    pub const OPT_OUT_CLASSES: &[&str] = &["notranslate", "no-translate"];

    // 作为翻译根的 display 值
    pub const BLOCK_DISPLAYS: &[&str] = &[
        "block", "list-item", "table", "table-cell", "flex", "grid", "flow-root",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "nws-translator.toml",
        ".nws-translator.toml",
        "~/.config/nws-translator/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS
        .iter()
        .any(|path| std::path::Path::new(shellexpand::tilde(path).as_ref()).exists())
}
