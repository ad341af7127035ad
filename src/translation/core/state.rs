//! 元素状态表
//!
//! 翻译状态只保存在这里，按节点身份索引，对节点只持有弱引用，DOM 属性从不用作状态。

use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use crate::parsers::html::dom::{is_connected, node_key};
use crate::translation::config::TranslationMode;
use crate::translation::pipeline::{ElementStatus, TranslatableElement};

/// 注册结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// 首次出现
    New,
    /// 已登记且文本未变
    Unchanged,
    /// 已登记但文本发生变化
    Changed,
}

/// 各状态的元素数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub untranslated: usize,
    pub translating: usize,
    pub translated: usize,
    pub error: usize,
}

/// 元素状态表
#[derive(Debug, Default)]
pub struct ElementRegistry {
    elements: HashMap<usize, TranslatableElement>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记扫描结果
    ///
    /// 同一地址上的旧节点已被回收时整条记录被替换；文本变化时只更新文本，状态交给调用方处理。
    pub fn register(&mut self, candidate: TranslatableElement) -> Registration {
        let key = candidate.key();
        match self.elements.get_mut(&key) {
            Some(existing) if existing.element().is_some() => {
                if existing.source_text == candidate.source_text {
                    Registration::Unchanged
                } else {
                    existing.source_text = candidate.source_text;
                    Registration::Changed
                }
            }
            _ => {
                self.elements.insert(key, candidate);
                Registration::New
            }
        }
    }

    pub fn get(&self, element: &Handle) -> Option<&TranslatableElement> {
        self.elements
            .get(&node_key(element))
            .filter(|entry| entry.element().is_some())
    }

    pub fn status(&self, element: &Handle) -> ElementStatus {
        self.get(element)
            .map(|entry| entry.status)
            .unwrap_or_default()
    }

    /// 进入 translating 状态
    ///
    /// 正在翻译时返回 false；已按相同模式翻译过时也返回 false。
    pub fn begin(&mut self, element: &Handle, mode: TranslationMode) -> bool {
        let key = node_key(element);
        let entry = self
            .elements
            .entry(key)
            .or_insert_with(|| TranslatableElement::new(element, String::new()));

        match entry.status {
            ElementStatus::Translating => false,
            ElementStatus::Translated if entry.mode == Some(mode) => false,
            _ => {
                entry.status = ElementStatus::Translating;
                entry.mode = Some(mode);
                entry.error = None;
                true
            }
        }
    }

    pub fn finish(&mut self, element: &Handle) {
        if let Some(entry) = self.elements.get_mut(&node_key(element)) {
            entry.status = ElementStatus::Translated;
        }
    }

    pub fn fail(&mut self, element: &Handle, message: String) {
        if let Some(entry) = self.elements.get_mut(&node_key(element)) {
            entry.status = ElementStatus::Error;
            entry.error = Some(message);
        }
    }

    /// 回到 untranslated（保留登记）
    pub fn reset(&mut self, element: &Handle) {
        if let Some(entry) = self.elements.get_mut(&node_key(element)) {
            entry.status = ElementStatus::Untranslated;
            entry.mode = None;
            entry.error = None;
        }
    }

    pub fn reset_all(&mut self) {
        for entry in self.elements.values_mut() {
            entry.status = ElementStatus::Untranslated;
            entry.mode = None;
            entry.error = None;
        }
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// 清除已回收或已离开文档的元素，返回清除数量
    pub fn purge_stale(&mut self, document: &Handle) -> usize {
        let before = self.elements.len();
        self.elements.retain(|_, entry| {
            entry
                .element()
                .map(|node| is_connected(document, &node))
                .unwrap_or(false)
        });
        before - self.elements.len()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in self.elements.values() {
            match entry.status {
                ElementStatus::Untranslated => counts.untranslated += 1,
                ElementStatus::Translating => counts.translating += 1,
                ElementStatus::Translated => counts.translated += 1,
                ElementStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}
