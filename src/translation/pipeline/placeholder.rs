//! 占位符编解码
//!
//! 双语模式：把元素子树压平成纯文本，行内标签替换成 `[[nws-tag-<id>-open]]` /
//! `[[nws-tag-<id>-close]]` 令牌，译文回来后再把令牌换回原始标签。
//!
//! 替换模式：每个可追踪的文本节点包成 `<nws-text id="N">…</nws-text>`，
//! 行内标签保持为真实标记，译文按 id 逐段写回。

use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use std::sync::OnceLock;

use markup5ever_rcdom::{Handle, Node, NodeData};
use regex::{Captures, Regex};

use super::collector::{is_skippable_element, TextCache};
use super::filters::{normalize_whitespace, TextClassifier};
use super::language::TargetLanguage;
use crate::parsers::html::dom::get_node_name;
use crate::parsers::html::serializer::{close_tag, escape_text, open_tag, unescape_html};
use crate::translation::config::constants;

/// 在压平文本中视为段落边界的结构元素（块级白名单之外）
const STRUCTURAL_TAGS: &[&str] = &[
    "ul", "ol", "dl", "table", "thead", "tbody", "tfoot", "tr", "figure", "details", "hr",
    "address", "fieldset", "form", "center",
];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("constant placeholder pattern must compile"))
}

// ============================================================================
// 双语模式
// ============================================================================

/// 被保护的行内标签
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub id: usize,
    pub open_token: String,
    pub close_token: String,
    pub open_tag: String,
    pub close_tag: String,
}

impl Placeholder {
    fn for_element(id: usize, element: &Handle) -> Self {
        Self {
            id,
            open_token: format!("[[nws-tag-{}-open]]", id),
            close_token: format!("[[nws-tag-{}-close]]", id),
            open_tag: open_tag(element),
            close_tag: close_tag(element),
        }
    }
}

/// 压平元素内容，返回 (带令牌的文本, 占位符表)
pub fn build_placeholder_text(element: &Handle) -> (String, Vec<Placeholder>) {
    let mut text = String::new();
    let mut placeholders = Vec::new();
    encode_children(element, &mut text, &mut placeholders);

    (finish_paragraphs(&text), placeholders)
}

fn encode_children(node: &Handle, out: &mut String, placeholders: &mut Vec<Placeholder>) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { contents } => push_collapsed(out, &contents.borrow()),
            NodeData::Element { .. } => {
                if is_skippable_element(child) {
                    continue;
                }

                let tag = get_node_name(child).unwrap_or("");
                if tag == "br" {
                    trim_trailing_space(out);
                    out.push('\n');
                } else if constants::INLINE_TAGS.contains(&tag) {
                    let placeholder = Placeholder::for_element(placeholders.len(), child);
                    out.push_str(&placeholder.open_token);
                    let close_token = placeholder.close_token.clone();
                    placeholders.push(placeholder);
                    encode_children(child, out, placeholders);
                    out.push_str(&close_token);
                } else if constants::BLOCK_TAGS.contains(&tag) || STRUCTURAL_TAGS.contains(&tag) {
                    push_separator(out);
                    encode_children(child, out, placeholders);
                    push_separator(out);
                } else {
                    encode_children(child, out, placeholders);
                }
            }
            _ => {}
        }
    }
}

/// 追加文本，连续空白折叠为单个空格
fn push_collapsed(out: &mut String, text: &str) {
    for c in text.chars() {
        if c.is_whitespace() && c != '\u{a0}' {
            if !out.is_empty() && !out.ends_with(' ') && !out.ends_with('\n') {
                out.push(' ');
            }
        } else {
            out.push(c);
        }
    }
}

fn trim_trailing_space(out: &mut String) {
    while out.ends_with(' ') {
        out.pop();
    }
}

fn push_separator(out: &mut String) {
    trim_trailing_space(out);
    if out.trim().is_empty() || out.ends_with(constants::PARAGRAPH_SEPARATOR) {
        return;
    }
    out.push_str(constants::PARAGRAPH_SEPARATOR);
}

/// 去掉首尾和空段落
fn finish_paragraphs(text: &str) -> String {
    text.split(constants::PARAGRAPH_SEPARATOR)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join(constants::PARAGRAPH_SEPARATOR)
}

/// 把译文中的令牌换回原始标签，结果为 HTML
pub fn restore_placeholders(text: &str, placeholders: &[Placeholder]) -> String {
    // 先转义模型输出，再插入可信的原始标记
    let escaped = escape_text(text);

    let mut html = escaped.clone();
    for placeholder in placeholders {
        html = html.replace(&placeholder.open_token, &placeholder.open_tag);
        html = html.replace(&placeholder.close_token, &placeholder.close_tag);
    }

    if html.to_lowercase().contains("nws-tag") {
        // 精确替换不干净时，从转义后的译文重新做宽松匹配
        static LENIENT: OnceLock<Regex> = OnceLock::new();
        let lenient = regex(
            &LENIENT,
            r"(?i)[\[【［]{2,3}\s*nws-tag-(\d+)-(open|close)\s*[\]】］]{2,3}",
        );
        html = lenient
            .replace_all(&escaped, |caps: &Captures| {
                let id: Option<usize> = caps[1].parse().ok();
                let open = caps[2].eq_ignore_ascii_case("open");
                id.and_then(|id| placeholders.iter().find(|p| p.id == id))
                    .map(|p| if open { p.open_tag.clone() } else { p.close_tag.clone() })
                    .unwrap_or_default()
            })
            .into_owned();

        static LEFTOVER: OnceLock<Regex> = OnceLock::new();
        let leftover = regex(
            &LEFTOVER,
            r"(?i)[\[【［]*\s*nws-tag-\d*-?(?:open|close)?\s*[\]】］]*",
        );
        let before = html.len();
        html = leftover.replace_all(&html, "").into_owned();
        if html.len() != before {
            tracing::warn!("译文中残留无法还原的占位符，已删除");
        }
    }

    html.replace('\n', "<br>")
}

// ============================================================================
// 替换模式
// ============================================================================

/// 被追踪的文本节点
#[derive(Debug, Clone)]
pub struct ReplaceSegment {
    pub id: usize,
    node: Weak<Node>,
    /// 节点原始文本
    pub original: String,
}

impl ReplaceSegment {
    pub fn node(&self) -> Option<Handle> {
        self.node.upgrade()
    }
}

/// 替换模式的请求载荷
#[derive(Debug, Clone, Default)]
pub struct ReplacePayload {
    pub html: String,
    pub segments: Vec<ReplaceSegment>,
}

impl ReplacePayload {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// 构建替换模式载荷
pub fn build_replace_payload(
    element: &Handle,
    classifier: &TextClassifier,
    target: &TargetLanguage,
    cache: &TextCache,
) -> ReplacePayload {
    let mut payload = ReplacePayload::default();
    encode_replace(element, classifier, target, cache, &mut payload);
    payload.html = payload.html.trim().to_string();
    payload
}

fn encode_replace(
    node: &Handle,
    classifier: &TextClassifier,
    target: &TargetLanguage,
    cache: &TextCache,
    payload: &mut ReplacePayload,
) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { .. } => {
                let item = match cache.get_or_capture(child) {
                    Some(item) => item,
                    None => continue,
                };

                if classifier.is_translatable_fragment(&item.original, target) {
                    let id = payload.segments.len();
                    if item.original.starts_with(char::is_whitespace) {
                        push_collapsed(&mut payload.html, " ");
                    }
                    payload.html.push_str(&format!(
                        r#"<nws-text id="{}">{}</nws-text>"#,
                        id,
                        escape_text(&item.normalized)
                    ));
                    if item.original.ends_with(char::is_whitespace) {
                        payload.html.push(' ');
                    }
                    payload.segments.push(ReplaceSegment {
                        id,
                        node: Rc::downgrade(child),
                        original: item.original,
                    });
                } else {
                    push_collapsed(&mut payload.html, &escape_text(&item.original));
                }
            }
            NodeData::Element { .. } => {
                if is_skippable_element(child) {
                    continue;
                }

                let tag = get_node_name(child).unwrap_or("");
                if tag == "br" {
                    payload.html.push_str("<br>");
                } else if constants::INLINE_TAGS.contains(&tag) {
                    payload.html.push_str(&open_tag(child));
                    encode_replace(child, classifier, target, cache, payload);
                    payload.html.push_str(&close_tag(child));
                } else {
                    encode_replace(child, classifier, target, cache, payload);
                }
            }
            _ => {}
        }
    }
}

/// 从译文中按 id 取出各段文本（纯文本，已反转义并规范化空白）
pub fn extract_replace_segments(translated: &str) -> BTreeMap<usize, String> {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let segment = regex(
        &SEGMENT,
        r#"(?i)<nws-text\s+id\s*=\s*["']?(\d+)["']?\s*>([\s\S]*?)</nws-text\s*>"#,
    );
    let tag = regex(&TAG, r"<[^>]*>");

    let mut segments = BTreeMap::new();
    for caps in segment.captures_iter(translated) {
        let id: usize = match caps[1].parse() {
            Ok(id) => id,
            Err(_) => continue,
        };
        let stripped = tag.replace_all(&caps[2], "");
        let text = normalize_whitespace(&unescape_html(&stripped));
        segments.entry(id).or_insert(text);
    }
    segments
}

/// 保留原文首尾空白，避免写回后和相邻行内元素粘连
pub fn preserve_edge_whitespace(original: &str, translated: &str) -> String {
    let mut result = String::with_capacity(translated.len() + 2);
    if original.starts_with(char::is_whitespace) {
        result.push(' ');
    }
    result.push_str(translated.trim());
    if original.ends_with(char::is_whitespace) && !translated.trim().is_empty() {
        result.push(' ');
    }
    result
}
