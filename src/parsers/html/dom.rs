use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use encoding_rs::Encoding;
use html5ever::interface::{Attribute, QualName};
use html5ever::parse_document;
use html5ever::tendril::{format_tendril, StrTendril, TendrilSink};
use html5ever::tree_builder::create_element;
use html5ever::{namespace_url, ns, LocalName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: &str) -> io::Result<RcDom> {
    let s: String = match Encoding::for_label(document_encoding.as_bytes()) {
        Some(encoding) => encoding.decode(data).0.into_owned(),
        None => String::from_utf8_lossy(data).into_owned(),
    };

    parse_html(&s)
}

/// 解析 HTML 字符串
pub fn parse_html(html: &str) -> io::Result<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
}

/// 将 HTML 片段解析为一组游离节点（已脱离临时文档）
pub fn parse_html_fragment(html: &str) -> Vec<Handle> {
    let wrapped = format!("<html><head></head><body>{}</body></html>", html);
    let dom = match parse_html(&wrapped) {
        Ok(dom) => dom,
        Err(_) => return vec![new_text(html)],
    };

    let body = match find_body(&dom.document) {
        Some(body) => body,
        None => return vec![new_text(html)],
    };

    let children: Vec<Handle> = body.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(None);
    }
    children
}

/// 节点身份标识（基于 Rc 指针地址，仅在节点存活期间有效）
pub fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

/// 创建 HTML 元素
pub fn new_element(tag: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(name, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(*name)),
            value: format_tendril!("{}", value),
        })
        .collect();

    create_element(
        &RcDom::default(),
        QualName::new(None, ns!(html), LocalName::from(tag)),
        attrs,
    )
}

/// 创建文本节点
pub fn new_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

/// 查找 body 元素
pub fn find_body(document: &Handle) -> Option<Handle> {
    let html = get_child_node_by_name(document, "html")?;
    get_child_node_by_name(&html, "body")
}

/// 按标签名递归查找所有元素（文档顺序）
pub fn find_elements(node: &Handle, tag: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    collect_elements(node, tag, &mut found);
    found
}

fn collect_elements(node: &Handle, tag: &str, found: &mut Vec<Handle>) {
    if get_node_name(node) == Some(tag) {
        found.push(node.clone());
    }
    for child in node.children.borrow().iter() {
        collect_elements(child, tag, found);
    }
}

/// 根据名称获取子节点
pub fn get_child_node_by_name(parent: &Handle, node_name: &str) -> Option<Handle> {
    let children = parent.children.borrow();
    let matching_children = children.iter().find(|child| match child.data {
        NodeData::Element { ref name, .. } => &*name.local == node_name,
        _ => false,
    });
    matching_children.cloned()
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 判断元素是否带有某个属性
pub fn has_node_attr(node: &Handle, attr_name: &str) -> bool {
    get_node_attr(node, attr_name).is_some()
}

/// 获取节点名称
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取元素的 class 列表
pub fn class_list(node: &Handle) -> Vec<String> {
    get_node_attr(node, "class")
        .map(|classes| classes.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

/// 判断元素是否包含指定 class
pub fn has_class(node: &Handle, class_name: &str) -> bool {
    get_node_attr(node, "class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// 获取父节点
pub fn get_parent_node(child: &Handle) -> Option<Handle> {
    let weak = child.parent.take();
    let parent = weak.as_ref().and_then(|node| node.upgrade());
    child.parent.set(weak);
    parent
}

/// 最近的元素祖先（文本节点返回其父元素）
pub fn parent_element(node: &Handle) -> Option<Handle> {
    let parent = get_parent_node(node)?;
    if is_element(&parent) {
        Some(parent)
    } else {
        None
    }
}

/// `ancestor` 是否为 `node` 的严格祖先
pub fn is_ancestor_of(ancestor: &Handle, node: &Handle) -> bool {
    let mut current = get_parent_node(node);
    while let Some(parent) = current {
        if Rc::ptr_eq(&parent, ancestor) {
            return true;
        }
        current = get_parent_node(&parent);
    }
    false
}

/// 节点是否仍挂在 `root` 之下（或就是 `root`）
pub fn is_connected(root: &Handle, node: &Handle) -> bool {
    Rc::ptr_eq(root, node) || is_ancestor_of(root, node)
}

/// 获取文本节点内容
pub fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 写入文本节点内容
pub fn set_text(node: &Handle, text: &str) {
    if let NodeData::Text { contents } = &node.data {
        *contents.borrow_mut() = StrTendril::from(text);
    }
}

/// 子树的全部文本
pub fn text_content(node: &Handle) -> String {
    let mut text = String::new();
    push_text(node, &mut text);
    text
}

fn push_text(node: &Handle, text: &mut String) {
    match &node.data {
        NodeData::Text { contents } => text.push_str(&contents.borrow()),
        NodeData::Element { .. } | NodeData::Document => {
            for child in node.children.borrow().iter() {
                push_text(child, text);
            }
        }
        _ => {}
    }
}

/// 将节点从父节点中移除
pub fn detach(node: &Handle) {
    let weak = node.parent.take();
    if let Some(parent) = weak.as_ref().and_then(|p| p.upgrade()) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

/// 追加子节点
pub fn append_child(parent: &Handle, child: Handle) {
    detach(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// 在 `reference` 之后插入兄弟节点
pub fn insert_after(reference: &Handle, new_node: Handle) -> bool {
    let parent = match get_parent_node(reference) {
        Some(parent) => parent,
        None => return false,
    };

    detach(&new_node);
    new_node.parent.set(Some(Rc::downgrade(&parent)));

    let mut children = parent.children.borrow_mut();
    let index = children
        .iter()
        .position(|child| Rc::ptr_eq(child, reference))
        .map(|i| i + 1)
        .unwrap_or(children.len());
    children.insert(index, new_node);
    true
}

/// 紧随其后的元素兄弟节点（跳过空白文本和注释）
pub fn next_element_sibling(node: &Handle) -> Option<Handle> {
    let parent = get_parent_node(node)?;
    let children = parent.children.borrow();
    let index = children.iter().position(|child| Rc::ptr_eq(child, node))?;
    children[index + 1..]
        .iter()
        .find(|sibling| match &sibling.data {
            NodeData::Element { .. } => true,
            NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
            _ => false,
        })
        .filter(|sibling| is_element(sibling))
        .cloned()
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    attrs_mut[i].value.clear();
                    attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // 未提供值时删除属性
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value {
                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}
