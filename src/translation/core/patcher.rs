//! DOM 写回
//!
//! 双语模式在原文之后插入译文块；替换模式直接改写原文本节点。所有注入都登记在
//! 弱引用侧表里，以便撤销。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node};

use crate::parsers::css::format_declarations;
use crate::parsers::html::dom::{
    append_child, class_list, detach, has_class, insert_after, new_element, new_text, node_key,
    next_element_sibling, parse_html_fragment, set_text, text_of,
};
use crate::translation::config::constants;
use crate::translation::error::{helpers::dom_error, TranslationResult};
use crate::translation::host::{PageHost, Rect};
use crate::translation::pipeline::placeholder::preserve_edge_whitespace;
use crate::translation::pipeline::{extract_replace_segments, restore_placeholders, Placeholder, ReplacePayload};

/// 选区提示框的初始文本
pub const TOOLTIP_PENDING_TEXT: &str = "翻译中…";

/// 被替换的文本节点及其原文
struct ReplacedText {
    node: Weak<Node>,
    original: String,
}

/// 登记的译文块
struct InjectedBlock {
    source: Weak<Node>,
    block: Weak<Node>,
}

impl InjectedBlock {
    /// 只有登记时的同一个源元素才能取回译文块
    fn block_of(&self, source: &Handle) -> Option<Handle> {
        let owner = self.source.upgrade()?;
        if !Rc::ptr_eq(&owner, source) {
            return None;
        }
        self.block.upgrade()
    }
}

/// DOM 写回器
#[derive(Default)]
pub struct DomPatcher {
    /// 源元素 → 译文块
    blocks: RefCell<HashMap<usize, InjectedBlock>>,
    /// 源元素 → 被替换的文本节点
    replaced: RefCell<HashMap<usize, Vec<ReplacedText>>>,
    /// 文本节点 → 写入的内容，用于识别自身触发的字符数据变更
    written: RefCell<HashMap<usize, String>>,
    tooltips: RefCell<Vec<Weak<Node>>>,
}

impl DomPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // 双语模式
    // ========================================================================

    /// 在源元素之后插入译文块，重复调用只保留最新的一块
    pub fn apply_bilingual(
        &self,
        source: &Handle,
        translated: &str,
        placeholders: &[Placeholder],
        host: &dyn PageHost,
    ) -> TranslationResult<Handle> {
        self.remove_bilingual(source);

        let mut attributes = vec![("class", constants::TRANSLATION_BLOCK_CLASS)];
        let style = format_declarations(&host.computed_style(source).typography());
        if !style.is_empty() {
            attributes.push(("style", style.as_str()));
        }
        let block = new_element("div", &attributes);

        for paragraph in translated.split(constants::PARAGRAPH_SEPARATOR) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }

            let html = restore_placeholders(paragraph, placeholders);
            let container = new_element("div", &[("class", constants::TRANSLATION_PARAGRAPH_CLASS)]);
            for node in parse_html_fragment(&html) {
                append_child(&container, node);
            }
            append_child(&block, container);
        }

        if !insert_after(source, block.clone()) {
            return Err(dom_error("源元素已脱离文档，无法插入译文"));
        }

        self.blocks.borrow_mut().insert(
            node_key(source),
            InjectedBlock {
                source: Rc::downgrade(source),
                block: Rc::downgrade(&block),
            },
        );
        Ok(block)
    }

    /// 删除登记的译文块，以及紧随其后带标记类名的兄弟节点
    pub fn remove_bilingual(&self, source: &Handle) -> bool {
        let mut removed = false;

        let entry = self.blocks.borrow_mut().remove(&node_key(source));
        if let Some(block) = entry.and_then(|entry| entry.block_of(source)) {
            detach(&block);
            removed = true;
        }

        while let Some(sibling) = next_element_sibling(source) {
            if !has_class(&sibling, constants::TRANSLATION_BLOCK_CLASS) {
                break;
            }
            detach(&sibling);
            removed = true;
        }

        removed
    }

    /// 源元素当前的译文块
    pub fn block_for(&self, source: &Handle) -> Option<Handle> {
        self.blocks
            .borrow()
            .get(&node_key(source))
            .and_then(|entry| entry.block_of(source))
    }

    // ========================================================================
    // 替换模式
    // ========================================================================

    /// 把译文逐段写回文本节点，返回写入的段数
    ///
    /// 缺失的段落回退为原文。
    pub fn apply_replace(&self, source: &Handle, payload: &ReplacePayload, translated: &str) -> usize {
        let segments = extract_replace_segments(translated);
        let key = node_key(source);
        let mut applied = 0;

        let mut replaced = self.replaced.borrow_mut();
        let tracked = replaced.entry(key).or_default();
        let mut written = self.written.borrow_mut();

        for segment in &payload.segments {
            let node = match segment.node() {
                Some(node) => node,
                None => continue,
            };

            let text = match segments.get(&segment.id) {
                Some(text) if !text.is_empty() => {
                    applied += 1;
                    preserve_edge_whitespace(&segment.original, text)
                }
                _ => {
                    tracing::warn!("替换译文缺少第 {} 段，保留原文", segment.id);
                    segment.original.clone()
                }
            };

            // 重复写入时保留最早的原文
            let node_id = node_key(&node);
            if !tracked
                .iter()
                .any(|entry| entry.node.upgrade().map(|n| node_key(&n)) == Some(node_id))
            {
                tracked.push(ReplacedText {
                    node: Rc::downgrade(&node),
                    original: segment.original.clone(),
                });
            }

            set_text(&node, &text);
            written.insert(node_id, text);
        }

        applied
    }

    /// 还原被替换的文本节点
    pub fn revert_replace(&self, source: &Handle) -> bool {
        let tracked = match self.replaced.borrow_mut().remove(&node_key(source)) {
            Some(tracked) => tracked,
            None => return false,
        };

        for entry in tracked {
            self.restore_text(&entry);
        }
        true
    }

    /// 还原单个文本节点；页面之后自行改写过的内容保持不变
    fn restore_text(&self, entry: &ReplacedText) {
        if let Some(node) = entry.node.upgrade() {
            if self.is_own_text_write(&node) {
                set_text(&node, &entry.original);
            }
            self.written.borrow_mut().remove(&node_key(&node));
        }
    }

    /// 是否为自身写入的文本（内容与写入时一致）
    pub fn is_own_text_write(&self, node: &Handle) -> bool {
        match (self.written.borrow().get(&node_key(node)), text_of(node)) {
            (Some(written), Some(current)) => *written == current,
            _ => false,
        }
    }

    // ========================================================================
    // 撤销
    // ========================================================================

    /// 撤销元素上的全部注入
    pub fn remove(&self, source: &Handle) {
        self.remove_bilingual(source);
        self.revert_replace(source);
    }

    /// 撤销全部注入，并清理 `root` 下残留的标记节点
    pub fn remove_all(&self, root: &Handle) -> usize {
        let mut removed = 0;

        for (_, entry) in self.blocks.borrow_mut().drain() {
            if let Some(block) = entry.block.upgrade() {
                detach(&block);
                removed += 1;
            }
        }

        let replaced: Vec<Vec<ReplacedText>> =
            self.replaced.borrow_mut().drain().map(|(_, tracked)| tracked).collect();
        for tracked in &replaced {
            for entry in tracked {
                self.restore_text(entry);
            }
        }
        removed += replaced.len();
        self.written.borrow_mut().clear();

        removed += self.remove_tooltips();

        let mut leftovers = Vec::new();
        collect_injected(root, &mut leftovers);
        for node in &leftovers {
            detach(node);
        }
        removed + leftovers.len()
    }

    // ========================================================================
    // 选区提示框
    // ========================================================================

    /// 在 `container` 中插入提示框
    pub fn show_tooltip(&self, container: &Handle, anchor: Rect) -> Handle {
        let style = format!(
            "position: absolute; left: {}px; top: {}px; z-index: 2147483647",
            anchor.x.round(),
            (anchor.bottom() + 4.0).round()
        );
        let tooltip = new_element(
            "div",
            &[("class", constants::SELECTION_TOOLTIP_CLASS), ("style", style.as_str())],
        );
        append_child(&tooltip, new_text(TOOLTIP_PENDING_TEXT));
        append_child(container, tooltip.clone());

        self.tooltips.borrow_mut().push(Rc::downgrade(&tooltip));
        tooltip
    }

    /// 替换提示框内容
    pub fn update_tooltip(&self, tooltip: &Handle, text: &str) {
        let children: Vec<Handle> = tooltip.children.borrow().iter().cloned().collect();
        for child in &children {
            detach(child);
        }
        append_child(tooltip, new_text(text));
    }

    pub fn remove_tooltips(&self) -> usize {
        let mut removed = 0;
        for tooltip in self.tooltips.borrow_mut().drain(..) {
            if let Some(tooltip) = tooltip.upgrade() {
                detach(&tooltip);
                removed += 1;
            }
        }
        removed
    }
}

/// 是否为注入的节点
pub fn is_injected(node: &Handle) -> bool {
    class_list(node)
        .iter()
        .any(|class| class.starts_with(constants::UI_CLASS_PREFIX))
}

fn collect_injected(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if has_class(child, constants::TRANSLATION_BLOCK_CLASS)
            || has_class(child, constants::SELECTION_TOOLTIP_CLASS)
        {
            out.push(child.clone());
        } else {
            collect_injected(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::html::dom::{find_body, find_elements, parse_html, text_content};
    use crate::parsers::html::serializer::serialize_children;
    use crate::translation::host::StaticPageHost;
    use crate::translation::error::TranslationError;
    use crate::translation::pipeline::{build_placeholder_text, build_replace_payload, TargetLanguage, TextCache, TextClassifier};

    fn blocks_after(source: &Handle) -> usize {
        let parent = source.parent.take();
        let parent_node = parent.as_ref().and_then(Weak::upgrade);
        source.parent.set(parent);
        parent_node
            .map(|p| {
                p.children
                    .borrow()
                    .iter()
                    .filter(|c| has_class(c, constants::TRANSLATION_BLOCK_CLASS))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_bilingual_apply_is_idempotent() {
        let dom = parse_html(r#"<p style="color: red">Hello <b>world</b></p>"#).unwrap();
        let body = find_body(&dom.document).unwrap();
        let p = find_elements(&body, "p").remove(0);
        let host = StaticPageHost::new("about:blank");
        let patcher = DomPatcher::new();

        let (_, placeholders) = build_placeholder_text(&p);
        let translated = "你好[[nws-tag-0-open]]世界[[nws-tag-0-close]]";

        patcher.apply_bilingual(&p, translated, &placeholders, &host).unwrap();
        let block = patcher.apply_bilingual(&p, translated, &placeholders, &host).unwrap();

        assert_eq!(blocks_after(&p), 1);
        let html = serialize_children(&block);
        assert_eq!(
            html,
            r#"<div class="nws-translation-paragraph">你好<b>世界</b></div>"#
        );
        assert!(patcher.block_for(&p).is_some());
        println!("✅ 双语写回幂等");
    }

    #[test]
    fn test_block_entry_belongs_to_its_source() {
        let dom = parse_html("<p>One</p><p>Two</p>").unwrap();
        let body = find_body(&dom.document).unwrap();
        let first = find_elements(&body, "p").remove(0);
        let second = find_elements(&body, "p").remove(1);
        let host = StaticPageHost::new("about:blank");
        let patcher = DomPatcher::new();

        patcher.apply_bilingual(&first, "一", &[], &host).unwrap();

        // 另一个元素落在同一个键上
        let entry = patcher.blocks.borrow_mut().remove(&node_key(&first)).unwrap();
        patcher.blocks.borrow_mut().insert(node_key(&second), entry);

        assert!(patcher.block_for(&second).is_none());
        assert!(!patcher.remove_bilingual(&second));
        assert_eq!(blocks_after(&first), 1, "first block stays in place");
        assert_eq!(
            next_element_sibling(&first).map(|n| has_class(&n, constants::TRANSLATION_BLOCK_CLASS)),
            Some(true)
        );
    }

    #[test]
    fn test_bilingual_paragraphs_and_style() {
        let dom = parse_html(r#"<div style="font-size: 18px">One<p>Two</p></div>"#).unwrap();
        let body = find_body(&dom.document).unwrap();
        let div = find_elements(&body, "div").remove(0);
        let host = StaticPageHost::new("about:blank");
        let patcher = DomPatcher::new();

        let block = patcher.apply_bilingual(&div, "一%%二", &[], &host).unwrap();
        assert_eq!(block.children.borrow().len(), 2);
        assert!(crate::parsers::html::dom::get_node_attr(&block, "style")
            .unwrap()
            .contains("font-size: 18px"));
    }

    #[test]
    fn test_detached_source_is_dom_error() {
        let host = StaticPageHost::new("about:blank");
        let orphan = new_element("p", &[]);
        let err = DomPatcher::new()
            .apply_bilingual(&orphan, "你好", &[], &host)
            .unwrap_err();
        assert!(matches!(err, TranslationError::DomError(_)));
    }

    #[test]
    fn test_remove_sweeps_marker_siblings() {
        let dom = parse_html(
            r#"<p>Hello world</p><div class="nws-translation-block">旧</div><div class="nws-translation-block">更旧</div><p>Next</p>"#,
        )
        .unwrap();
        let body = find_body(&dom.document).unwrap();
        let p = find_elements(&body, "p").remove(0);

        assert!(DomPatcher::new().remove_bilingual(&p));
        assert_eq!(find_elements(&body, "div").len(), 0);
        assert_eq!(find_elements(&body, "p").len(), 2);
    }

    #[test]
    fn test_replace_and_revert() {
        let dom = parse_html("<p>Hello <b>bold</b> world</p>").unwrap();
        let body = find_body(&dom.document).unwrap();
        let p = find_elements(&body, "p").remove(0);
        let cache = TextCache::new();
        let payload = build_replace_payload(&p, &TextClassifier::new(), &TargetLanguage::chinese(), &cache);
        let patcher = DomPatcher::new();

        // 第 2 段缺失，回退为原文
        let applied = patcher.apply_replace(
            &p,
            &payload,
            r#"<nws-text id="0">你好</nws-text> <b><NWS-TEXT id="1">粗体</NWS-TEXT></b>"#,
        );
        assert_eq!(applied, 2);
        assert_eq!(text_content(&p), "你好 粗体 world");

        let bold_text = find_elements(&p, "b").remove(0).children.borrow()[0].clone();
        assert!(patcher.is_own_text_write(&bold_text));
        set_text(&bold_text, "edited by page");
        assert!(!patcher.is_own_text_write(&bold_text));

        // 页面改写过的节点不会被还原
        assert!(patcher.revert_replace(&p));
        assert_eq!(text_content(&p), "Hello edited by page world");
        assert!(!patcher.revert_replace(&p));
    }

    #[test]
    fn test_remove_all_and_tooltips() {
        let dom = parse_html("<p>Hello world</p><p>Second paragraph</p>").unwrap();
        let body = find_body(&dom.document).unwrap();
        let paragraphs = find_elements(&body, "p");
        let host = StaticPageHost::new("about:blank");
        let patcher = DomPatcher::new();

        for p in &paragraphs {
            patcher.apply_bilingual(p, "译文", &[], &host).unwrap();
        }
        let tooltip = patcher.show_tooltip(&body, Rect::new(10.0, 20.0, 50.0, 10.0));
        assert_eq!(text_content(&tooltip), TOOLTIP_PENDING_TEXT);
        patcher.update_tooltip(&tooltip, "你好");
        assert_eq!(text_content(&tooltip), "你好");
        assert!(is_injected(&tooltip));

        patcher.remove_all(&dom.document);
        assert_eq!(find_elements(&body, "div").len(), 0);
        assert_eq!(text_content(&body), "Hello worldSecond paragraph");
    }
}
