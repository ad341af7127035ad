//! DOM 选择器模块
//!
//! 遍历 DOM，产出按文档顺序排列的"叶子"可翻译块元素：
//! 1. 在块级标签白名单上做过滤遍历，跳过不可翻译的子树
//! 2. 逐个检查可见性、链接密度和聚合文本
//! 3. 叶子化：去掉包含其他候选的祖先候选
//! 4. 若一个候选都没有，退回到扫描文本节点并向上寻找最近的块级祖先

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use markup5ever_rcdom::{Handle, Node, NodeData};

use super::filters::{normalize_whitespace, TextClassifier};
use super::language::TargetLanguage;
use crate::parsers::html::dom::{
    class_list, get_node_attr, get_node_name, get_parent_node, has_class, has_node_attr,
    is_ancestor_of, is_element, node_key,
};
use crate::translation::config::{constants, TranslationConfig, TranslationMode};
use crate::translation::host::PageHost;

// ============================================================================
// 元素与文本快照
// ============================================================================

/// 元素翻译状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementStatus {
    #[default]
    Untranslated,
    Translating,
    Translated,
    Error,
}

/// 可翻译元素（对 DOM 节点只持有弱引用）
#[derive(Debug, Clone)]
pub struct TranslatableElement {
    node: Weak<Node>,
    key: usize,
    pub status: ElementStatus,
    /// 最近一次应用的模式
    pub mode: Option<TranslationMode>,
    /// 扫描时的聚合文本（已规范化）
    pub source_text: String,
    pub error: Option<String>,
}

impl TranslatableElement {
    pub fn new(element: &Handle, source_text: String) -> Self {
        Self {
            node: Rc::downgrade(element),
            key: node_key(element),
            status: ElementStatus::Untranslated,
            mode: None,
            source_text,
            error: None,
        }
    }

    /// 取回仍然存活的节点
    pub fn element(&self) -> Option<Handle> {
        self.node
            .upgrade()
            .filter(|node| node_key(node) == self.key)
    }

    pub fn key(&self) -> usize {
        self.key
    }
}

/// 文本节点快照
#[derive(Debug, Clone)]
pub struct TextItem {
    node: Weak<Node>,
    /// 扫描时的原始文本
    pub original: String,
    /// 折叠空白后的文本，用于分类
    pub normalized: String,
}

impl TextItem {
    pub fn capture(node: &Handle) -> Option<Self> {
        match &node.data {
            NodeData::Text { contents } => {
                let original = contents.borrow().to_string();
                let normalized = normalize_whitespace(&original);
                Some(Self {
                    node: Rc::downgrade(node),
                    original,
                    normalized,
                })
            }
            _ => None,
        }
    }

    pub fn node(&self) -> Option<Handle> {
        self.node.upgrade()
    }

    fn is_alive_for(&self, node: &Handle) -> bool {
        self.node
            .upgrade()
            .map(|alive| Rc::ptr_eq(&alive, node))
            .unwrap_or(false)
    }
}

/// 按节点身份缓存的原始文本
///
/// 变更通知到达时必须调用 [`TextCache::evict`]，否则缓存会一直返回旧快照。
#[derive(Debug, Default)]
pub struct TextCache {
    entries: RefCell<HashMap<usize, TextItem>>,
    hits: Cell<usize>,
    misses: Cell<usize>,
}

impl TextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取快照；首次访问时捕获
    pub fn get_or_capture(&self, node: &Handle) -> Option<TextItem> {
        let key = node_key(node);
        if let Some(item) = self.entries.borrow().get(&key) {
            if item.is_alive_for(node) {
                self.hits.set(self.hits.get() + 1);
                return Some(item.clone());
            }
        }

        let item = TextItem::capture(node)?;
        self.misses.set(self.misses.get() + 1);
        self.entries.borrow_mut().insert(key, item.clone());
        Some(item)
    }

    /// 驱逐单个节点
    pub fn evict(&self, node: &Handle) {
        self.entries.borrow_mut().remove(&node_key(node));
    }

    /// 驱逐节点及其全部后代
    pub fn evict_subtree(&self, node: &Handle) {
        self.evict(node);
        for child in node.children.borrow().iter() {
            self.evict_subtree(child);
        }
    }

    /// 清理已经被回收的节点
    pub fn purge_stale(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, item| item.node().is_some());
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// (命中, 未命中)
    pub fn hit_stats(&self) -> (usize, usize) {
        (self.hits.get(), self.misses.get())
    }
}

// ============================================================================
// 跳过规则
// ============================================================================

/// 是否整棵子树都不参与翻译
pub fn is_skippable_element(element: &Handle) -> bool {
    let tag = match get_node_name(element) {
        Some(tag) => tag,
        None => return false,
    };

    if constants::SKIP_ELEMENTS.contains(&tag) {
        return true;
    }

    // 自身注入的界面
    if class_list(element)
        .iter()
        .any(|class| class.starts_with(constants::UI_CLASS_PREFIX))
    {
        return true;
    }

    if get_node_attr(element, "aria-hidden").as_deref() == Some("true")
        || has_node_attr(element, "inert")
        || has_node_attr(element, "hidden")
    {
        return true;
    }

    if let Some(editable) = get_node_attr(element, "contenteditable") {
        if !editable.eq_ignore_ascii_case("false") {
            return true;
        }
    }

    if get_node_attr(element, "translate").as_deref() == Some("no") {
        return true;
    }

    constants::OPT_OUT_CLASSES
        .iter()
        .any(|class| has_class(element, class))
}

/// 节点本身或任一祖先是否可跳过
pub fn is_within_skippable(node: &Handle) -> bool {
    let mut current = Some(node.clone());
    while let Some(n) = current {
        if is_element(&n) && is_skippable_element(&n) {
            return true;
        }
        current = get_parent_node(&n);
    }
    false
}

/// 向上寻找最近的块级祖先作为翻译根
pub fn find_translation_root(node: &Handle, host: &dyn PageHost) -> Option<Handle> {
    let mut current = if is_element(node) {
        Some(node.clone())
    } else {
        get_parent_node(node)
    };

    while let Some(element) = current {
        if !is_element(&element) {
            return None;
        }

        let tag = get_node_name(&element).unwrap_or("");
        if tag == "body" || tag == "html" {
            return Some(element);
        }

        let display = host.computed_style(&element).display;
        if constants::BLOCK_DISPLAYS.contains(&display.as_str()) {
            return Some(element);
        }

        current = get_parent_node(&element);
    }

    None
}

// ============================================================================
// 选择器
// ============================================================================

/// 收集统计
#[derive(Debug, Clone, Default)]
pub struct CollectionStats {
    pub scanned_elements: usize,
    pub rejected_invisible: usize,
    pub rejected_links: usize,
    pub rejected_text: usize,
    pub reduced_ancestors: usize,
    pub fallback_roots: usize,
    pub accepted: usize,
}

/// 扫描上下文
struct ScanContext<'a> {
    host: &'a dyn PageHost,
    config: &'a TranslationConfig,
    target: TargetLanguage,
}

/// DOM 选择器
pub struct DomSelector {
    classifier: TextClassifier,
    cache: Rc<TextCache>,
    stats: RefCell<CollectionStats>,
}

impl DomSelector {
    pub fn new(cache: Rc<TextCache>) -> Self {
        Self {
            classifier: TextClassifier::new(),
            cache,
            stats: RefCell::new(CollectionStats::default()),
        }
    }

    pub fn classifier(&self) -> &TextClassifier {
        &self.classifier
    }

    pub fn cache(&self) -> &Rc<TextCache> {
        &self.cache
    }

    pub fn stats(&self) -> CollectionStats {
        self.stats.borrow().clone()
    }

    /// 收集 `root` 之下的叶子可翻译元素（文档顺序）
    pub fn collect(
        &self,
        root: &Handle,
        host: &dyn PageHost,
        config: &TranslationConfig,
    ) -> Vec<TranslatableElement> {
        if is_within_skippable(root) {
            return Vec::new();
        }

        let ctx = ScanContext {
            host,
            config,
            target: TargetLanguage::parse(&config.target_language),
        };

        let mut candidates: Vec<(Handle, String)> = Vec::new();
        if is_element(root) {
            self.consider(root, &ctx, &mut candidates);
        }
        self.walk(root, &ctx, &mut candidates);

        let mut elements = self.reduce_to_leaves(candidates);

        if elements.is_empty() {
            elements = self.collect_fallback(root, &ctx);
        }

        self.stats.borrow_mut().accepted += elements.len();
        tracing::debug!("收集到 {} 个可翻译元素", elements.len());

        elements
            .into_iter()
            .map(|(element, text)| TranslatableElement::new(&element, text))
            .collect()
    }

    fn walk(&self, node: &Handle, ctx: &ScanContext<'_>, candidates: &mut Vec<(Handle, String)>) {
        for child in node.children.borrow().iter() {
            if !is_element(child) || is_skippable_element(child) {
                continue;
            }

            self.consider(child, ctx, candidates);
            self.walk(child, ctx, candidates);
        }
    }

    fn consider(&self, element: &Handle, ctx: &ScanContext<'_>, candidates: &mut Vec<(Handle, String)>) {
        let tag = get_node_name(element).unwrap_or("");
        if !constants::BLOCK_TAGS.contains(&tag) {
            return;
        }

        self.stats.borrow_mut().scanned_elements += 1;

        if let Some(text) = self.accept(element, ctx) {
            candidates.push((element.clone(), text));
        }
    }

    /// 候选元素的完整检查，通过时返回聚合文本
    fn accept(&self, element: &Handle, ctx: &ScanContext<'_>) -> Option<String> {
        if is_skippable_element(element) {
            return None;
        }

        if !self.classifier.is_visible(element, ctx.host) {
            self.stats.borrow_mut().rejected_invisible += 1;
            return None;
        }

        if self.classifier.has_excessive_links(element) {
            self.stats.borrow_mut().rejected_links += 1;
            return None;
        }

        let text = self.aggregate_text(element);
        if self
            .classifier
            .classify(&text, ctx.config.min_text_length, &ctx.target)
            .is_err()
        {
            self.stats.borrow_mut().rejected_text += 1;
            return None;
        }

        Some(text)
    }

    /// 子树中所有可翻译文本（跳过不可翻译子树），已规范化
    pub fn aggregate_text(&self, element: &Handle) -> String {
        let mut raw = String::new();
        self.push_text(element, &mut raw);
        normalize_whitespace(&raw)
    }

    fn push_text(&self, node: &Handle, out: &mut String) {
        for child in node.children.borrow().iter() {
            match &child.data {
                NodeData::Text { .. } => {
                    if let Some(item) = self.cache.get_or_capture(child) {
                        out.push_str(&item.original);
                    }
                }
                NodeData::Element { .. } => {
                    if is_skippable_element(child) {
                        continue;
                    }
                    if get_node_name(child) == Some("br") {
                        out.push(' ');
                        continue;
                    }
                    self.push_text(child, out);
                }
                _ => {}
            }
        }
    }

    /// 去掉包含其他候选的祖先候选
    ///
    /// 候选按先序排列，某个候选的后代候选如果存在，必然紧跟在它后面。
    fn reduce_to_leaves(&self, candidates: Vec<(Handle, String)>) -> Vec<(Handle, String)> {
        let total = candidates.len();
        let mut leaves = Vec::with_capacity(total);

        for i in 0..total {
            let has_descendant = candidates
                .get(i + 1)
                .map(|(next, _)| is_ancestor_of(&candidates[i].0, next))
                .unwrap_or(false);
            if !has_descendant {
                leaves.push(candidates[i].clone());
            }
        }

        self.stats.borrow_mut().reduced_ancestors += total - leaves.len();
        leaves
    }

    /// 退回路径：从文本节点出发寻找翻译根
    fn collect_fallback(&self, root: &Handle, ctx: &ScanContext<'_>) -> Vec<(Handle, String)> {
        let mut text_nodes = Vec::new();
        collect_text_nodes(root, &mut text_nodes);

        let mut seen = HashSet::new();
        let mut roots = Vec::new();

        for text_node in text_nodes {
            let item = match self.cache.get_or_capture(&text_node) {
                Some(item) => item,
                None => continue,
            };
            if self
                .classifier
                .classify(&item.normalized, ctx.config.min_text_length, &ctx.target)
                .is_err()
            {
                continue;
            }

            let translation_root = match find_translation_root(&text_node, ctx.host) {
                Some(found) => found,
                None => continue,
            };
            if !seen.insert(node_key(&translation_root)) {
                continue;
            }
            if is_within_skippable(&translation_root)
                || !self.classifier.is_visible(&translation_root, ctx.host)
                || self.classifier.has_excessive_links(&translation_root)
            {
                continue;
            }

            let text = self.aggregate_text(&translation_root);
            roots.push((translation_root, text));
        }

        if !roots.is_empty() {
            tracing::debug!("白名单遍历无结果，退回路径找到 {} 个翻译根", roots.len());
        }
        self.stats.borrow_mut().fallback_roots += roots.len();
        roots
    }
}

/// 收集不在可跳过子树中的文本节点
fn collect_text_nodes(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text { .. } => out.push(child.clone()),
            NodeData::Element { .. } if !is_skippable_element(child) => {
                collect_text_nodes(child, out)
            }
            _ => {}
        }
    }
}
