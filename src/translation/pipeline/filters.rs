//! 文本分类器模块
//!
//! 判断一段文本或一个 DOM 元素是否值得翻译：语言启发式、长度下限、
//! 可见性和链接密度。

use std::collections::HashMap;
use std::sync::OnceLock;

use markup5ever_rcdom::Handle;
use regex::Regex;

use super::language::{cjk_ratio, TargetLanguage};
use crate::parsers::html::dom::{find_elements, get_node_attr, has_class, has_node_attr, text_content};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::host::PageHost;

/// 文本被拒绝的原因
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum FilterReason {
    Empty,
    TooShort,
    DigitsOrPunctuation,
    Url,
    Email,
    AlreadyTargetLanguage,
}

/// 分类统计
#[derive(Debug, Clone, Default)]
pub struct FilterStats {
    pub total_texts: usize,
    pub translatable_texts: usize,
    pub by_reason: HashMap<FilterReason, usize>,
}

impl FilterStats {
    /// 记录一次分类结果
    pub fn record(&mut self, result: Result<(), FilterReason>) {
        self.total_texts += 1;
        match result {
            Ok(()) => self.translatable_texts += 1,
            Err(reason) => *self.by_reason.entry(reason).or_insert(0) += 1,
        }
    }
}

/// 正则表达式缓存
#[derive(Default)]
struct RegexCache {
    symbols_regex: OnceLock<Regex>,
    email_regex: OnceLock<Regex>,
    www_regex: OnceLock<Regex>,
}

fn cached<'a>(cell: &'a OnceLock<Regex>, pattern: &str) -> &'a Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("constant filter pattern must compile"))
}

/// 文本分类器
#[derive(Default)]
pub struct TextClassifier {
    regex_cache: RegexCache,
}

impl TextClassifier {
    /// 创建新的分类器
    pub fn new() -> Self {
        Self::default()
    }

    /// 判断文本是否需要翻译
    pub fn should_translate(&self, text: &str, config: &TranslationConfig) -> bool {
        let target = TargetLanguage::parse(&config.target_language);
        self.classify(text, config.min_text_length, &target).is_ok()
    }

    /// 分类并给出拒绝原因
    pub fn classify(
        &self,
        text: &str,
        min_text_length: usize,
        target: &TargetLanguage,
    ) -> Result<(), FilterReason> {
        let normalized = normalize_whitespace(text);

        if normalized.is_empty() {
            return Err(FilterReason::Empty);
        }

        if normalized.chars().count() < min_text_length {
            return Err(FilterReason::TooShort);
        }

        self.classify_content(&normalized, target)
    }

    /// 片段级判断（没有长度下限），用于替换模式中逐个文本节点的追踪
    pub fn is_translatable_fragment(&self, text: &str, target: &TargetLanguage) -> bool {
        let normalized = normalize_whitespace(text);
        !normalized.is_empty() && self.classify_content(&normalized, target).is_ok()
    }

    fn classify_content(&self, normalized: &str, target: &TargetLanguage) -> Result<(), FilterReason> {
        if self.is_digits_or_punctuation(normalized) {
            return Err(FilterReason::DigitsOrPunctuation);
        }

        if self.is_url(normalized) {
            return Err(FilterReason::Url);
        }

        if self.is_email(normalized) {
            return Err(FilterReason::Email);
        }

        // 已经是目标语言
        if target.is_chinese_family() && cjk_ratio(normalized) > constants::CJK_RATIO_THRESHOLD {
            return Err(FilterReason::AlreadyTargetLanguage);
        }

        Ok(())
    }

    /// 仅由数字、标点、符号组成
    fn is_digits_or_punctuation(&self, text: &str) -> bool {
        cached(&self.regex_cache.symbols_regex, r"^[\d\W_]+$").is_match(text)
    }

    /// 检查是否为URL
    fn is_url(&self, text: &str) -> bool {
        if text.chars().any(char::is_whitespace) {
            return false;
        }

        if let Ok(url) = url::Url::parse(text) {
            return match url.scheme() {
                "http" | "https" | "ftp" | "ftps" | "ws" | "wss" => url.host().is_some(),
                "file" => true,
                _ => false,
            };
        }

        cached(&self.regex_cache.www_regex, r"^www\.[^\s/]+\.[A-Za-z]{2,}(/\S*)?$").is_match(text)
    }

    /// 检查是否为邮箱
    fn is_email(&self, text: &str) -> bool {
        if text.len() > 254 || !text.contains('@') {
            return false;
        }

        cached(
            &self.regex_cache.email_regex,
            r"^(mailto:)?[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$",
        )
        .is_match(text)
    }

    /// 判断元素是否可见
    pub fn is_visible(&self, element: &Handle, host: &dyn PageHost) -> bool {
        if get_node_attr(element, "aria-hidden").as_deref() == Some("true")
            || has_node_attr(element, "hidden")
            || has_node_attr(element, "inert")
        {
            return false;
        }

        if constants::HIDDEN_CLASSES.iter().any(|class| has_class(element, class)) {
            return false;
        }

        let style = host.computed_style(element);
        if style.display == "none"
            || style.visibility == "hidden"
            || style.visibility == "collapse"
            || style.opacity <= 0.0
        {
            return false;
        }

        // 几何回退
        if !host.bounding_rect(element).is_empty() {
            return true;
        }

        if host.client_rects(element).iter().any(|rect| !rect.is_empty()) {
            return true;
        }

        if style.display == "contents" {
            return !host.text_range_rect(element).is_empty();
        }

        false
    }

    /// 链接文本占比过高（导航、页脚等模板区域）
    pub fn has_excessive_links(&self, element: &Handle) -> bool {
        let total = normalize_whitespace(&text_content(element)).chars().count();
        if total == 0 {
            return false;
        }

        let anchors = find_elements(element, "a");
        if anchors.is_empty() {
            return false;
        }

        let link_chars: usize = anchors
            .iter()
            .map(|a| normalize_whitespace(&text_content(a)).chars().count())
            .sum();
        let ratio = link_chars as f64 / total as f64;

        (ratio > constants::EXCESSIVE_LINK_RATIO && anchors.len() >= constants::EXCESSIVE_LINK_MIN_COUNT)
            || ratio > constants::DOMINANT_LINK_RATIO
    }
}

/// 折叠连续空白并去掉首尾空白
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
